//! The caretaker engine: decides when to interact, acts once per cycle,
//! double-confirms with a delayed control submission, and verifies effect.

pub mod batch;
pub mod executor;
pub mod scheduler;
pub mod state;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testutil;

pub use batch::EntityBatch;
pub use executor::ActionOutcome;
pub use state::BotState;
pub use verifier::Verification;

use crate::config::Config;
use crate::error::ConfigError;
use crate::ledger::LedgerClient;
use crate::notify::Notifier;
use alloy_primitives::Address;
use anyhow::Context;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Tunables of one keeper instance, derived from [`Config`].
#[derive(Debug, Clone)]
pub struct KeeperSettings {
    /// Address whose entities are cared for.
    pub owner: Address,
    /// Minimum seconds between effective interacts.
    pub cooldown_secs: u64,
    /// Scheduler tick period.
    pub tick: Duration,
    /// Connectivity check period.
    pub health_check: Duration,
    /// Settle delay before the control interact.
    pub control_delay: Duration,
    /// Where state snapshots are mirrored for the `status` command.
    pub state_file: Option<PathBuf>,
}

impl KeeperSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let owner = Address::from_str(&config.owner_address).map_err(|e| {
            ConfigError::Validation(format!("owner_address {:?}: {e}", config.owner_address))
        })?;

        Ok(Self {
            owner,
            cooldown_secs: config.cooldown_secs,
            tick: Duration::from_secs(config.tick_secs),
            health_check: Duration::from_secs(config.health_check_secs),
            control_delay: Duration::from_secs(config.control_delay_secs),
            state_file: Some(config.state_file_path()),
        })
    }
}

/// Long-running caretaker for one owner's entities.
///
/// Owns the scheduling loops and all mutable state; collaborators are reached
/// only through the [`LedgerClient`] and [`Notifier`] seams.
pub struct Keeper {
    ledger: Arc<dyn LedgerClient>,
    notifier: Arc<dyn Notifier>,
    settings: KeeperSettings,
    state: Arc<Mutex<BotState>>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Keeper {
    pub fn new(
        settings: KeeperSettings,
        ledger: Arc<dyn LedgerClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let state = Arc::new(Mutex::new(BotState::new(settings.owner.to_string())));

        Self {
            ledger,
            notifier,
            settings,
            state,
            shutdown,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Read-only snapshot of the keeper's counters and schedule.
    ///
    /// Always a copy; callers cannot reach the live state through it.
    pub fn status(&self) -> BotState {
        self.lock_state().clone()
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, BotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn shared_state(&self) -> Arc<Mutex<BotState>> {
        Arc::clone(&self.state)
    }
}

/// Seconds since the UNIX epoch.
///
/// Fallible so a broken system clock degrades into the caller's error path
/// instead of a panic.
pub(crate) fn unix_now() -> anyhow::Result<u64> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the unix epoch")?;
    Ok(now.as_secs())
}
