use super::unix_now;
use crate::ledger::{EntityId, LedgerClient};

/// Without a prior timestamp to compare against, an activity time inside this
/// window counts as freshly updated.
const RECENT_WINDOW_SECS: u64 = 3600;

/// Result of checking whether an interact observably changed entity state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub success: bool,
    /// Ids whose activity time moved.
    pub updated: Vec<EntityId>,
    /// True when verification infrastructure failed and success was assumed.
    pub optimistic: bool,
}

/// Re-read each entity and decide whether the interact took effect.
///
/// Per-id fetch failures are expected and skipped. A failure of the
/// verification process itself settles as success with an empty updated set:
/// a transient read problem must not raise a false alarm about an interact
/// that most likely landed.
pub async fn verify(
    ledger: &dyn LedgerClient,
    ids: &[EntityId],
    before: Option<u64>,
) -> Verification {
    settle(confirm_updates(ledger, ids, before).await)
}

async fn confirm_updates(
    ledger: &dyn LedgerClient,
    ids: &[EntityId],
    before: Option<u64>,
) -> anyhow::Result<Verification> {
    let now = unix_now()?;

    let mut updated = Vec::new();
    for id in ids {
        let record = match ledger.fetch_detail(*id).await {
            Ok(record) => record,
            Err(error) => {
                tracing::debug!(%id, %error, "verification re-read failed, skipping id");
                continue;
            }
        };

        let is_updated = match before {
            Some(before) => record.last_activity_time > before,
            None => now.saturating_sub(record.last_activity_time) < RECENT_WINDOW_SECS,
        };
        if is_updated {
            updated.push(*id);
        }
    }

    Ok(Verification {
        success: !updated.is_empty(),
        updated,
        optimistic: false,
    })
}

pub(crate) fn settle(result: anyhow::Result<Verification>) -> Verification {
    match result {
        Ok(verification) => verification,
        Err(error) => {
            tracing::warn!(%error, "verification could not complete, assuming the interact landed");
            Verification {
                success: true,
                updated: Vec::new(),
                optimistic: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keeper::testutil::MockLedger;

    #[tokio::test]
    async fn equal_timestamp_is_not_an_update() {
        let ledger = MockLedger::new(vec![1]);
        ledger.set_record(1, 1000, true);

        let verification = verify(&ledger, &[EntityId(1)], Some(1000)).await;
        assert!(!verification.success);
        assert!(verification.updated.is_empty());
    }

    #[tokio::test]
    async fn strictly_newer_timestamp_is_an_update() {
        let ledger = MockLedger::new(vec![1]);
        ledger.set_record(1, 1001, true);

        let verification = verify(&ledger, &[EntityId(1)], Some(1000)).await;
        assert!(verification.success);
        assert_eq!(verification.updated, vec![EntityId(1)]);
        assert!(!verification.optimistic);
    }

    #[tokio::test]
    async fn recency_window_is_exclusive_at_one_hour() {
        let now = unix_now().unwrap();
        let ledger = MockLedger::new(vec![1, 2]);
        ledger.set_record(1, now - 3601, true);
        ledger.set_record(2, now - 3599, true);

        let stale = verify(&ledger, &[EntityId(1)], None).await;
        assert!(!stale.success);

        let fresh = verify(&ledger, &[EntityId(2)], None).await;
        assert!(fresh.success);
        assert_eq!(fresh.updated, vec![EntityId(2)]);
    }

    #[tokio::test]
    async fn unreadable_ids_are_skipped_not_fatal() {
        let ledger = MockLedger::new(vec![1, 2]);
        ledger.set_record(1, 2000, true);
        ledger.fail_fetch(2);

        let verification = verify(&ledger, &[EntityId(1), EntityId(2)], Some(1000)).await;
        assert!(verification.success);
        assert_eq!(verification.updated, vec![EntityId(1)]);
    }

    #[tokio::test]
    async fn no_readable_ids_means_no_observed_update() {
        let ledger = MockLedger::new(vec![1]);
        ledger.fail_fetch_all();

        let verification = verify(&ledger, &[EntityId(1)], Some(1000)).await;
        assert!(!verification.success);
        assert!(!verification.optimistic);
    }

    #[test]
    fn infrastructure_failure_settles_optimistically() {
        let verification = settle(Err(anyhow::anyhow!("clock went sideways")));
        assert!(verification.success);
        assert!(verification.updated.is_empty());
        assert!(verification.optimistic);
    }
}
