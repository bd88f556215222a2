use super::{Keeper, batch, state, unix_now};
use crate::error::StartupError;
use crate::notify::NoticeKind;
use std::sync::{Arc, PoisonError};
use tokio::sync::watch;
use tokio::time;

impl Keeper {
    /// Run startup checks, then spawn the recurring loops.
    ///
    /// Fails fast when the ledger is unreachable or the target owns no
    /// claimed entities; a keeper with nothing to care for must not sit in a
    /// loop pretending otherwise.
    pub async fn start(self: &Arc<Self>) -> Result<(), StartupError> {
        if !self.ledger.check_connectivity().await {
            return Err(StartupError::Unreachable);
        }

        let batch = batch::collect(self.ledger.as_ref(), self.settings.owner).await?;
        if batch.fetched.is_empty() {
            return Err(StartupError::NoEligibleEntities {
                owner: self.settings.owner.to_string(),
            });
        }

        self.lock_state().running = true;
        tracing::info!(
            owner = %self.settings.owner,
            entities = batch.all_ids.len(),
            claimed = batch.fetched.len(),
            "keeper started"
        );

        let mut tasks = self.lock_tasks();
        tasks.push(tokio::spawn(run_loop(
            Arc::clone(self),
            self.shutdown.subscribe(),
        )));
        tasks.push(tokio::spawn(health_loop(
            Arc::clone(self),
            self.shutdown.subscribe(),
        )));
        if let Some(path) = self.settings.state_file.clone() {
            tasks.push(state::spawn_state_writer(
                self.shared_state(),
                path,
                self.shutdown.subscribe(),
            ));
        }

        Ok(())
    }

    /// Signal both recurring loops to end.
    ///
    /// The loop that is mid-tick finishes its in-flight work first; an
    /// already scheduled control interact is left to run.
    pub fn stop(&self) {
        self.lock_state().running = false;
        self.shutdown.send_replace(true);
        tracing::info!("keeper stopping, in-flight work completes");
    }

    /// Wait for the loops spawned by `start` to wind down.
    pub async fn join(&self) {
        let tasks = std::mem::take(&mut *self.lock_tasks());
        for task in tasks {
            let _ = task.await;
        }
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<tokio::task::JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One scheduling decision: gather timing data, act if the cooldown has
    /// elapsed, otherwise record when it will have.
    pub(crate) async fn tick(&self) -> anyhow::Result<()> {
        let batch = batch::collect(self.ledger.as_ref(), self.settings.owner).await?;
        if batch.all_ids.is_empty() {
            tracing::info!(owner = %self.settings.owner, "no entities owned, skipping tick");
            return Ok(());
        }

        let now = unix_now()?;
        let next = next_action_time(batch.shared_activity_time, now, self.settings.cooldown_secs);

        if now >= next {
            tracing::info!(targets = batch.all_ids.len(), "cooldown elapsed, interacting");
            self.execute_action(&batch.all_ids, batch.shared_activity_time, now)
                .await;
        } else {
            tracing::debug!(next_action_at = next, "cooldown still running");
            self.lock_state().next_action_at = Some(next);
        }

        Ok(())
    }
}

/// When the next interact is due. Without any timing data the full cooldown
/// is waited out from now; better one late interact than a wasted one.
fn next_action_time(shared_activity_time: Option<u64>, now: u64, cooldown_secs: u64) -> u64 {
    shared_activity_time.unwrap_or(now) + cooldown_secs
}

async fn run_loop(keeper: Arc<Keeper>, mut shutdown: watch::Receiver<bool>) {
    if *shutdown.borrow_and_update() {
        return;
    }
    let mut interval = time::interval(keeper.settings.tick);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(error) = keeper.tick().await {
                    keeper.lock_state().error_count += 1;
                    tracing::warn!(%error, "tick failed");
                    keeper
                        .notifier
                        .notify(
                            NoticeKind::Error,
                            &format!("Scheduler tick failed: {error:#}"),
                            None,
                        )
                        .await;
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

/// Reports lost connectivity; recovery is left to the scheduling tick, which
/// keeps re-attempting on its own cadence.
async fn health_loop(keeper: Arc<Keeper>, mut shutdown: watch::Receiver<bool>) {
    if *shutdown.borrow_and_update() {
        return;
    }
    let mut interval = time::interval(keeper.settings.health_check);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if !keeper.ledger.check_connectivity().await {
                    tracing::warn!("ledger connectivity lost");
                    keeper
                        .notifier
                        .notify(
                            NoticeKind::Info,
                            "Ledger connectivity lost; interacts continue on schedule once it returns",
                            None,
                        )
                        .await;
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keeper::testutil::{keeper_with, owner_records};
    use crate::ledger::EntityId;
    use std::time::Duration;

    #[test]
    fn next_action_time_uses_shared_activity_time() {
        assert_eq!(next_action_time(Some(1000), 44_300, 43_200), 44_200);
    }

    #[test]
    fn next_action_time_falls_back_to_now() {
        assert_eq!(next_action_time(None, 44_300, 43_200), 87_500);
    }

    #[tokio::test]
    async fn start_fails_without_connectivity() {
        let (keeper, ledger, _notes) = keeper_with(vec![1]);
        owner_records(&ledger, &[1], 1000);
        ledger.set_connectivity(false);

        let err = keeper.start().await.unwrap_err();
        assert!(matches!(err, StartupError::Unreachable));
        assert!(!keeper.status().running);
    }

    #[tokio::test]
    async fn start_fails_without_claimed_entities() {
        let (keeper, ledger, _notes) = keeper_with(vec![1, 2]);
        ledger.fail_fetch_all();

        let err = keeper.start().await.unwrap_err();
        assert!(matches!(err, StartupError::NoEligibleEntities { .. }));
    }

    #[tokio::test]
    async fn due_tick_targets_every_enumerated_id() {
        let (keeper, ledger, _notes) = keeper_with(vec![1, 2, 3]);
        // Only id 2 is readable; its activity time is one cooldown in the past.
        let stale = crate::keeper::unix_now().unwrap() - 50_000;
        ledger.set_record(2, stale, true);
        ledger.fail_fetch(1);
        ledger.fail_fetch(3);
        ledger.bump_on_submit();

        keeper.tick().await.unwrap();

        let submissions = ledger.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(
            submissions[0],
            vec![EntityId(1), EntityId(2), EntityId(3)]
        );

        let status = keeper.status();
        assert_eq!(status.total_actions, 1);
        assert!(status.last_action_at.is_some());
    }

    #[tokio::test]
    async fn quiet_tick_records_the_next_action_time() {
        let (keeper, ledger, _notes) = keeper_with(vec![1]);
        let fresh = crate::keeper::unix_now().unwrap() - 10;
        ledger.set_record(1, fresh, true);

        keeper.tick().await.unwrap();

        assert_eq!(ledger.submission_count(), 0);
        let status = keeper.status();
        assert_eq!(status.next_action_at, Some(fresh + 43_200));
        assert_eq!(status.total_actions, 0);
    }

    #[tokio::test]
    async fn empty_enumeration_skips_the_tick() {
        let (keeper, ledger, _notes) = keeper_with(vec![]);

        keeper.tick().await.unwrap();
        assert_eq!(ledger.submission_count(), 0);
    }

    #[tokio::test]
    async fn started_keeper_acts_and_stops_cleanly() {
        let (keeper, ledger, _notes) = keeper_with(vec![1, 2]);
        let stale = crate::keeper::unix_now().unwrap() - 50_000;
        owner_records(&ledger, &[1, 2], stale);
        ledger.bump_on_submit();

        keeper.start().await.unwrap();
        assert!(keeper.status().running);

        // First interval tick fires immediately.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(ledger.submission_count() >= 1);

        keeper.stop();
        keeper.join().await;
        assert!(!keeper.status().running);

        let settled = ledger.submission_count();
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(ledger.submission_count(), settled);
    }

    #[tokio::test]
    async fn tick_failures_are_counted_and_survived() {
        let (keeper, ledger, notes) = keeper_with(vec![1]);
        let fresh = crate::keeper::unix_now().unwrap() - 10;
        ledger.set_record(1, fresh, true);

        keeper.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        ledger.fail_enumeration();
        tokio::time::sleep(Duration::from_millis(1200)).await;

        let status = keeper.status();
        assert!(status.running, "loop must survive tick failures");
        assert!(status.error_count >= 1);
        assert!(notes.count_of(crate::notify::NoticeKind::Error) >= 1);

        keeper.stop();
        keeper.join().await;
    }
}
