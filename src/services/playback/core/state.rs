use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::{RwLock, broadcast};
use tracing::warn;

use crate::services::playback::error::PlaybackError;
use crate::services::playback::types::{
    ChangeReason, Lifecycle, StateChange, VideoDescriptor, VideoId,
};

/// Per-id record kept for the whole session.
#[derive(Debug, Clone)]
pub struct StateRecord {
    /// Descriptor the record was created from.
    pub descriptor: VideoDescriptor,

    /// Current lifecycle state.
    pub state: Lifecycle,

    /// Last time the item was focused or became ready.
    pub last_used: Instant,

    /// Failed initialization attempts. Monotonic; reset on `Ready`.
    pub retry_count: u32,

    /// When the last failure happened; gates the retry backoff.
    pub failed_at: Option<Instant>,

    /// Description of the last error, if any.
    pub last_error: Option<String>,
}

impl StateRecord {
    fn new(descriptor: VideoDescriptor) -> Self {
        Self {
            descriptor,
            state: Lifecycle::Unseen,
            last_used: Instant::now(),
            retry_count: 0,
            failed_at: None,
            last_error: None,
        }
    }
}

/// Concurrent keyed store of per-id lifecycle records.
///
/// Every mutation that changes the lifecycle state is validated against the
/// legal-transition matrix and published on the event channel while the
/// table lock is held, so subscribers observe transitions in causal order
/// per id.
pub(crate) struct StateTable {
    records: RwLock<HashMap<VideoId, StateRecord>>,
    events: broadcast::Sender<StateChange>,
}

impl StateTable {
    pub(crate) fn new(events: broadcast::Sender<StateChange>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Admit a descriptor in state `Unseen`. Returns false if the id is
    /// already known (re-ingestion is a no-op).
    pub(crate) async fn insert(&self, descriptor: VideoDescriptor) -> bool {
        let mut records = self.records.write().await;
        if records.contains_key(&descriptor.id) {
            return false;
        }
        records.insert(descriptor.id.clone(), StateRecord::new(descriptor));
        true
    }

    /// Snapshot of one record.
    pub(crate) async fn get(&self, id: &VideoId) -> Option<StateRecord> {
        self.records.read().await.get(id).cloned()
    }

    /// Current lifecycle state of one id.
    pub(crate) async fn state_of(&self, id: &VideoId) -> Option<Lifecycle> {
        self.records.read().await.get(id).map(|r| r.state)
    }

    /// Atomic read-modify-write of one record.
    ///
    /// The closure may change any field including the state; a state change
    /// outside the legal matrix is rejected as `IllegalTransition` and the
    /// record is left untouched. State changes are published on the event
    /// channel with the given reason.
    pub(crate) async fn update<R>(
        &self,
        id: &VideoId,
        reason: Option<ChangeReason>,
        f: impl FnOnce(&mut StateRecord) -> R,
    ) -> Result<R, PlaybackError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| PlaybackError::UnknownVideo(id.clone()))?;

        let mut updated = record.clone();
        let result = f(&mut updated);

        let old_state = record.state;
        let new_state = updated.state;
        if old_state != new_state {
            if !transition_allowed(old_state, new_state) {
                warn!(%id, from = %old_state, to = %new_state, "illegal lifecycle transition rejected");
                return Err(PlaybackError::IllegalTransition {
                    id: id.clone(),
                    from: old_state,
                    to: new_state,
                });
            }
            apply_bookkeeping(&mut updated);
        }
        *record = updated;

        if old_state != new_state {
            let _ = self.events.send(StateChange {
                id: id.clone(),
                old_state,
                new_state,
                reason,
            });
        }

        Ok(result)
    }

    /// Transition one id to a new state, recording an optional error
    /// description.
    ///
    /// Returns the previous state on success.
    pub(crate) async fn transition(
        &self,
        id: &VideoId,
        to: Lifecycle,
        reason: Option<ChangeReason>,
        error: Option<String>,
    ) -> Result<Lifecycle, PlaybackError> {
        self.update(id, reason, |record| {
            let old = record.state;
            record.state = to;
            if error.is_some() {
                record.last_error = error;
            }
            old
        })
        .await
    }

    /// Refresh the last-used timestamp of one id.
    pub(crate) async fn touch(&self, id: &VideoId) {
        if let Some(record) = self.records.write().await.get_mut(id) {
            record.last_used = Instant::now();
        }
    }

    /// Snapshot of the whole table, for debug and telemetry.
    pub(crate) async fn snapshot(&self) -> Vec<(VideoId, StateRecord)> {
        self.records
            .read()
            .await
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect()
    }

    /// Number of ids currently in the given state.
    pub(crate) async fn count_in(&self, state: Lifecycle) -> usize {
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.state == state)
            .count()
    }

    /// Number of ids in `Ready` or `Playing`; equals the ready queue size.
    pub(crate) async fn ready_like_count(&self) -> usize {
        self.records
            .read()
            .await
            .values()
            .filter(|r| matches!(r.state, Lifecycle::Ready | Lifecycle::Playing))
            .count()
    }
}

/// Bookkeeping tied to specific state entries.
fn apply_bookkeeping(record: &mut StateRecord) {
    let now = Instant::now();
    match record.state {
        Lifecycle::Failed => {
            record.retry_count += 1;
            record.failed_at = Some(now);
        }
        Lifecycle::Ready => {
            record.retry_count = 0;
            record.failed_at = None;
            record.last_error = None;
            record.last_used = now;
        }
        Lifecycle::Playing => {
            record.last_used = now;
        }
        _ => {}
    }
}

/// The legal-transition matrix.
///
/// Beyond the straight-line lifecycle, three entries cover admission
/// shortcuts and exceptional exits: `Unseen -> Ready` admits items that
/// need no decoder handle, `Unseen -> Failed` marks items without a
/// playable URL, and `Initializing -> Evicted` is cancellation of an
/// in-flight initialization. `Queued -> Evicted` rescinds an admission the
/// pool could not honor.
pub(crate) fn transition_allowed(from: Lifecycle, to: Lifecycle) -> bool {
    use Lifecycle::*;
    matches!(
        (from, to),
        (Unseen, Queued)
            | (Unseen, Ready)
            | (Unseen, Failed)
            | (Queued, Initializing)
            | (Queued, Evicted)
            | (Initializing, Ready)
            | (Initializing, Failed)
            | (Initializing, Evicted)
            | (Ready, Playing)
            | (Ready, Evicted)
            | (Ready, Failed)
            | (Playing, Ready)
            | (Playing, Evicted)
            | (Playing, Failed)
            | (Failed, Queued)
            | (Evicted, Queued)
    )
}
