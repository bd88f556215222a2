//! Shared in-memory collaborators for keeper unit tests.

use super::{Keeper, KeeperSettings, unix_now};
use crate::error::LedgerError;
use crate::ledger::{ActionReference, EntityId, EntityRecord, LedgerClient};
use crate::notify::{NoticeKind, Notifier};
use alloy_primitives::Address;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

pub(crate) fn owner() -> Address {
    Address::repeat_byte(0x11)
}

pub(crate) fn test_settings() -> KeeperSettings {
    KeeperSettings {
        owner: owner(),
        cooldown_secs: 43_200,
        tick: Duration::from_secs(1),
        health_check: Duration::from_secs(3600),
        control_delay: Duration::from_millis(50),
        state_file: None,
    }
}

#[derive(Default)]
struct MockInner {
    records: HashMap<u64, EntityRecord>,
    failed_fetches: HashSet<u64>,
    fail_all_fetches: bool,
    fail_enumeration: bool,
    submissions: Vec<Vec<EntityId>>,
    fail_submissions_after: Option<usize>,
    bump_on_submit: bool,
}

/// Scriptable ledger double. All knobs take effect on the next call.
pub(crate) struct MockLedger {
    ids: Vec<EntityId>,
    connectivity: AtomicBool,
    inner: Mutex<MockInner>,
}

impl MockLedger {
    pub(crate) fn new(ids: Vec<u64>) -> Self {
        Self {
            ids: ids.into_iter().map(EntityId).collect(),
            connectivity: AtomicBool::new(true),
            inner: Mutex::new(MockInner::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_record(&self, id: u64, last_activity_time: u64, claimed: bool) {
        self.lock().records.insert(
            id,
            EntityRecord {
                id: EntityId(id),
                last_activity_time,
                claimed,
            },
        );
    }

    pub(crate) fn fail_fetch(&self, id: u64) {
        self.lock().failed_fetches.insert(id);
    }

    pub(crate) fn fail_fetch_all(&self) {
        self.lock().fail_all_fetches = true;
    }

    pub(crate) fn fail_enumeration(&self) {
        self.lock().fail_enumeration = true;
    }

    pub(crate) fn fail_submissions(&self) {
        self.lock().fail_submissions_after = Some(0);
    }

    /// Let the first `count` submissions succeed, fail the rest.
    pub(crate) fn fail_submissions_after(&self, count: usize) {
        self.lock().fail_submissions_after = Some(count);
    }

    /// Simulate an effective interact: every known id's activity time moves
    /// to "now" once a submission lands.
    pub(crate) fn bump_on_submit(&self) {
        self.lock().bump_on_submit = true;
    }

    pub(crate) fn set_connectivity(&self, up: bool) {
        self.connectivity.store(up, Ordering::SeqCst);
    }

    pub(crate) fn submissions(&self) -> Vec<Vec<EntityId>> {
        self.lock().submissions.clone()
    }

    pub(crate) fn submission_count(&self) -> usize {
        self.lock().submissions.len()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn enumerate_ids(&self, _owner: Address) -> Result<Vec<EntityId>, LedgerError> {
        if self.lock().fail_enumeration {
            return Err(LedgerError::Transport("enumeration refused".into()));
        }
        Ok(self.ids.clone())
    }

    async fn fetch_detail(&self, id: EntityId) -> Result<EntityRecord, LedgerError> {
        let inner = self.lock();
        if inner.fail_all_fetches || inner.failed_fetches.contains(&id.0) {
            return Err(LedgerError::Transport(format!("fetch of {id} refused")));
        }
        inner
            .records
            .get(&id.0)
            .cloned()
            .ok_or_else(|| LedgerError::Transport(format!("no record for {id}")))
    }

    async fn submit_action(&self, ids: &[EntityId]) -> Result<ActionReference, LedgerError> {
        let mut inner = self.lock();
        if let Some(after) = inner.fail_submissions_after
            && inner.submissions.len() >= after
        {
            return Err(LedgerError::Submission("node rejected transaction".into()));
        }

        inner.submissions.push(ids.to_vec());
        if inner.bump_on_submit {
            let now = unix_now().unwrap_or(0);
            for id in ids {
                inner.records.insert(
                    id.0,
                    EntityRecord {
                        id: *id,
                        last_activity_time: now,
                        claimed: true,
                    },
                );
            }
            inner.fail_all_fetches = false;
            inner.failed_fetches.clear();
        }

        let count = inner.submissions.len();
        Ok(ActionReference(format!("0xmock{count:04x}")))
    }

    async fn estimate_action_cost(&self, ids: &[EntityId]) -> Result<u64, LedgerError> {
        Ok(21_000 + 5_000 * ids.len() as u64)
    }

    async fn chain_height(&self) -> Result<u64, LedgerError> {
        if self.connectivity.load(Ordering::SeqCst) {
            Ok(1_000_000)
        } else {
            Err(LedgerError::Transport("connection refused".into()))
        }
    }

    async fn check_connectivity(&self) -> bool {
        self.connectivity.load(Ordering::SeqCst)
    }
}

/// Notifier double that records every notice it was asked to deliver.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    notes: Mutex<Vec<(NoticeKind, String)>>,
}

impl RecordingNotifier {
    pub(crate) fn count_of(&self, kind: NoticeKind) -> usize {
        self.lock().iter().filter(|(k, _)| *k == kind).count()
    }

    pub(crate) fn last_text(&self) -> Option<String> {
        self.lock().last().map(|(_, text)| text.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(NoticeKind, String)>> {
        self.notes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, kind: NoticeKind, text: &str, _reference: Option<&ActionReference>) {
        self.lock().push((kind, text.to_string()));
    }
}

/// Keeper wired to a scripted ledger and a recording notifier.
pub(crate) fn keeper_with(
    ids: Vec<u64>,
) -> (Arc<Keeper>, Arc<MockLedger>, Arc<RecordingNotifier>) {
    let ledger = Arc::new(MockLedger::new(ids));
    let notifier = Arc::new(RecordingNotifier::default());
    let keeper = Arc::new(Keeper::new(
        test_settings(),
        Arc::clone(&ledger) as Arc<dyn LedgerClient>,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
    ));
    (keeper, ledger, notifier)
}

/// Give every listed id a claimed record with the same activity time.
pub(crate) fn owner_records(ledger: &MockLedger, ids: &[u64], last_activity_time: u64) {
    for id in ids {
        ledger.set_record(*id, last_activity_time, true);
    }
}
