use super::{Keeper, verifier};
use crate::ledger::{ActionReference, EntityId};
use crate::notify::NoticeKind;
use std::sync::Arc;

/// Result of one interact submission cycle.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub success: bool,
    pub reference: Option<ActionReference>,
    pub error: Option<String>,
    /// Entities the submission targeted; zero when submission itself failed.
    pub action_count: usize,
}

impl Keeper {
    /// Submit one interact covering all `ids`, schedule the control interact,
    /// and verify effect against `before`.
    ///
    /// A verified no-change is an expected outcome (the on-chain cooldown may
    /// not have elapsed) and is not counted as an error.
    pub(crate) async fn execute_action(
        &self,
        ids: &[EntityId],
        before: Option<u64>,
        now: u64,
    ) -> ActionOutcome {
        let reference = match self.ledger.submit_action(ids).await {
            Ok(reference) => reference,
            Err(error) => {
                self.lock_state().error_count += 1;
                tracing::error!(%error, targets = ids.len(), "interact submission failed");
                self.notifier
                    .notify(
                        NoticeKind::Error,
                        &format!("Interact submission failed: {error}"),
                        None,
                    )
                    .await;
                return ActionOutcome {
                    success: false,
                    reference: None,
                    error: Some(error.to_string()),
                    action_count: 0,
                };
            }
        };

        tracing::info!(%reference, targets = ids.len(), "interact submitted");
        self.spawn_control_action(ids.to_vec());

        let verification = verifier::verify(self.ledger.as_ref(), ids, before).await;
        if verification.optimistic {
            self.lock_state().optimistic_verifications += 1;
        }

        if verification.success {
            {
                let mut state = self.lock_state();
                state.total_actions += 1;
                state.last_action_at = Some(now);
                state.next_action_at = Some(now + self.settings.cooldown_secs);
            }
            self.notifier
                .notify(
                    NoticeKind::Success,
                    &format!(
                        "Interacted with {} entities ({} confirmed on re-read)",
                        ids.len(),
                        verification.updated.len()
                    ),
                    Some(&reference),
                )
                .await;
            ActionOutcome {
                success: true,
                reference: Some(reference),
                error: None,
                action_count: ids.len(),
            }
        } else {
            tracing::info!(%reference, "interact confirmed but no entity shows newer activity");
            ActionOutcome {
                success: false,
                reference: Some(reference),
                error: Some("no observable state change".into()),
                action_count: ids.len(),
            }
        }
    }

    /// Fire-and-forget re-submission of the same interact after a settle
    /// delay. Purely a confidence check: its failure is reported on its own
    /// and never feeds back into the primary outcome. Deliberately not
    /// tracked, so `stop()` leaves an already scheduled control interact
    /// alone.
    fn spawn_control_action(&self, ids: Vec<EntityId>) {
        let ledger = Arc::clone(&self.ledger);
        let notifier = Arc::clone(&self.notifier);
        let delay = self.settings.control_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match ledger.submit_action(&ids).await {
                Ok(reference) => {
                    tracing::debug!(%reference, targets = ids.len(), "control interact submitted");
                }
                Err(error) => {
                    tracing::warn!(%error, "control interact failed");
                    notifier
                        .notify(
                            NoticeKind::Error,
                            &format!("Control interact failed: {error}"),
                            None,
                        )
                        .await;
                }
            }
        });
    }
}
