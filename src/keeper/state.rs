use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Duration;

const STATUS_FLUSH_SECONDS: u64 = 30;

/// Process-wide keeper state, mutated only from the scheduling loops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotState {
    pub running: bool,
    /// Owner address the keeper cares for.
    pub target: String,
    /// Interacts that were submitted and verified.
    pub total_actions: u64,
    /// Tick and submission failures since start.
    pub error_count: u64,
    /// Verifications settled optimistically after an infrastructure failure.
    pub optimistic_verifications: u64,
    /// Unix seconds of the last verified interact.
    pub last_action_at: Option<u64>,
    /// Unix seconds of the next scheduled interact.
    pub next_action_at: Option<u64>,
}

impl BotState {
    pub fn new(target: String) -> Self {
        Self {
            running: false,
            target,
            total_actions: 0,
            error_count: 0,
            optimistic_verifications: 0,
            last_action_at: None,
            next_action_at: None,
        }
    }
}

/// On-disk form of a state snapshot, as read by the `status` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(flatten)]
    pub state: BotState,
    pub written_at: String,
}

pub async fn write_state_file(path: &Path, state: BotState) {
    if let Some(parent) = path.parent()
        && let Err(error) = tokio::fs::create_dir_all(parent).await
    {
        tracing::warn!(%error, "failed to create state file directory");
        return;
    }

    let snapshot = StateSnapshot {
        state,
        written_at: Utc::now().to_rfc3339(),
    };
    let data = serde_json::to_vec_pretty(&snapshot).unwrap_or_else(|_| b"{}".to_vec());
    if let Err(error) = tokio::fs::write(path, data).await {
        tracing::warn!(%error, "failed to write state file");
    }
}

pub fn read_state_file(path: &Path) -> anyhow::Result<StateSnapshot> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Periodically mirrors the keeper state to disk so a second process can
/// answer `status` queries. Flushes once more on shutdown so the final
/// snapshot records the stopped state.
pub(crate) fn spawn_state_writer(
    state: Arc<Mutex<BotState>>,
    path: PathBuf,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let snapshot =
            move || state.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let mut interval = tokio::time::interval(Duration::from_secs(STATUS_FLUSH_SECONDS));

        loop {
            tokio::select! {
                _ = interval.tick() => write_state_file(&path, snapshot()).await,
                _ = shutdown.changed() => {
                    write_state_file(&path, snapshot()).await;
                    break;
                }
            }
        }
    })
}
