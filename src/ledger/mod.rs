pub mod evm;

pub use evm::EvmLedger;

use crate::error::LedgerError;
use alloy_primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque on-chain identifier of one owned entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of one entity's on-chain attributes at fetch time.
///
/// Recreated on every fetch, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    pub id: EntityId,
    /// Seconds since epoch of the last interact that took effect.
    pub last_activity_time: u64,
    /// Nonzero claim status on chain; only claimed entities drive timing.
    pub claimed: bool,
}

/// Reference to a submitted interact transaction (transaction hash).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReference(pub String);

impl fmt::Display for ActionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read and write access to the chain, behind one seam.
///
/// Implementations own all transport concerns (timeouts, endpoints); the
/// keeper only relies on this contract.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Every entity id owned by `owner`. Authoritative: the returned set is
    /// acted upon even when detail reads fail.
    async fn enumerate_ids(&self, owner: Address) -> Result<Vec<EntityId>, LedgerError>;

    /// Detail read for a single entity. Expected to fail intermittently.
    async fn fetch_detail(&self, id: EntityId) -> Result<EntityRecord, LedgerError>;

    /// Submit one interact transaction covering all `ids`, waiting for
    /// confirmation.
    async fn submit_action(&self, ids: &[EntityId]) -> Result<ActionReference, LedgerError>;

    /// Gas estimate for an interact covering all `ids`.
    async fn estimate_action_cost(&self, ids: &[EntityId]) -> Result<u64, LedgerError>;

    /// Current chain height.
    async fn chain_height(&self) -> Result<u64, LedgerError>;

    /// Cheap liveness probe of the endpoint.
    async fn check_connectivity(&self) -> bool;
}
