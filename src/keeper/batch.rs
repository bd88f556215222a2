use crate::error::LedgerError;
use crate::ledger::{EntityId, EntityRecord, LedgerClient};
use alloy_primitives::Address;

/// One enumeration-plus-fetch pass over the target owner.
///
/// `all_ids` is what gets acted upon; `fetched` is only what we happen to
/// know about it. The two are deliberately decoupled: detail reads are
/// unreliable, the id set from enumeration is not.
#[derive(Debug, Clone)]
pub struct EntityBatch {
    /// Every enumerated id, in source order.
    pub all_ids: Vec<EntityId>,
    /// Successfully read, claimed records.
    pub fetched: Vec<EntityRecord>,
    /// Activity time of the first claimed record in enumeration order,
    /// applied uniformly to the whole batch for scheduling.
    pub shared_activity_time: Option<u64>,
}

/// Enumerate `owner`'s entities and read as much detail as the source allows.
///
/// A failed detail read drops the record, never the id. Enumeration failure
/// itself propagates; without the id set there is nothing to act on.
pub async fn collect(
    ledger: &dyn LedgerClient,
    owner: Address,
) -> Result<EntityBatch, LedgerError> {
    let all_ids = ledger.enumerate_ids(owner).await?;

    let mut fetched = Vec::new();
    let mut shared_activity_time = None;
    for id in &all_ids {
        let record = match ledger.fetch_detail(*id).await {
            Ok(record) => record,
            Err(error) => {
                tracing::debug!(%id, %error, "detail fetch failed, keeping id for action");
                continue;
            }
        };

        if !record.claimed {
            tracing::debug!(%id, "entity not claimed, excluded from timing");
            continue;
        }

        if shared_activity_time.is_none() {
            shared_activity_time = Some(record.last_activity_time);
        }
        fetched.push(record);
    }

    Ok(EntityBatch {
        all_ids,
        fetched,
        shared_activity_time,
    })
}
