//! Core shared state for the playback service.
//!
//! This contains only the essential shared data that subsystems need to
//! access. Business logic lives in the subsystems, not here.

/// Ordered, deduplicated ready queue.
pub(crate) mod ready_queue;
/// Per-id lifecycle records and the legal-transition matrix.
pub mod state;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

use tokio::sync::{Mutex, RwLock, Semaphore, broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::PlaybackConfig;
use crate::services::common::Property;

use super::handle::{PlayerFactory, PlayerHandle};
use super::registry::HandleRegistry;
use super::subsystems::monitoring::StatusSample;
use super::types::{NetworkClass, StateChange, VideoDescriptor, VideoId};
use ready_queue::ReadyQueue;
use state::StateTable;

/// Feed ingestion order with an id-to-index lookup.
///
/// The scheduler and the eviction scorer both work on raw feed indices,
/// which include items (animated images, URL-less descriptors) that never
/// take a decoder handle.
pub(crate) struct Feed {
    order: Vec<VideoId>,
    index: HashMap<VideoId, usize>,
}

impl Feed {
    pub(crate) fn new() -> Self {
        Self {
            order: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub(crate) fn push(&mut self, id: VideoId) {
        if self.index.contains_key(&id) {
            return;
        }
        self.index.insert(id.clone(), self.order.len());
        self.order.push(id);
    }

    pub(crate) fn id_at(&self, index: usize) -> Option<&VideoId> {
        self.order.get(index)
    }

    pub(crate) fn index_of(&self, id: &VideoId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }
}

/// Progressive cache target stepping through the configured sequence.
pub(crate) struct CacheTarget {
    position: usize,
}

impl CacheTarget {
    pub(crate) fn new() -> Self {
        Self { position: 0 }
    }

    /// Current target value.
    pub(crate) fn current(&self, config: &PlaybackConfig) -> usize {
        config.cache_target_at(self.position)
    }

    /// Step to the next sequence entry. Returns whether a step happened.
    pub(crate) fn advance(&mut self, config: &PlaybackConfig) -> bool {
        if self.position + 1 < config.cache_target_sequence.len() {
            self.position += 1;
            true
        } else {
            false
        }
    }
}

/// One live pool slot: the exclusively-owned handle plus its tasks.
///
/// Dropping the entry aborts both tasks; the handle itself is disposed by
/// whoever removed the entry from the pool.
pub(crate) struct PoolEntry {
    pub(crate) handle: Arc<dyn PlayerHandle>,
    pub(crate) init_task: Option<JoinHandle<()>>,
    pub(crate) monitor_task: Option<JoinHandle<()>>,
}

impl Drop for PoolEntry {
    fn drop(&mut self) {
        if let Some(task) = self.init_task.take() {
            task.abort();
        }
        if let Some(task) = self.monitor_task.take() {
            task.abort();
        }
    }
}

/// Core shared state for the playback service.
pub(crate) struct Core {
    /// Playback configuration, normalized at construction.
    pub(crate) config: PlaybackConfig,

    /// Host-supplied decoder factory.
    pub(crate) factory: Arc<dyn PlayerFactory>,

    /// Host-owned weak handle index.
    pub(crate) registry: Arc<HandleRegistry>,

    /// Per-id lifecycle records.
    pub(crate) table: StateTable,

    /// Feed ingestion order.
    pub(crate) feed: RwLock<Feed>,

    /// Descriptors proven playable, in proof order.
    pub(crate) ready: RwLock<ReadyQueue>,

    /// UI-facing view of the ready queue contents.
    pub(crate) ready_view: Property<Vec<VideoDescriptor>>,

    /// Live decoder handles keyed by id. Exclusively owned here.
    pub(crate) pool: RwLock<HashMap<VideoId, PoolEntry>>,

    /// Event broadcasting for reactive updates.
    pub(crate) events: broadcast::Sender<StateChange>,

    /// FIFO cap on simultaneous initializations.
    pub(crate) init_slots: Arc<Semaphore>,

    /// Serializes focus / pause transitions.
    pub(crate) playback_lock: Mutex<()>,

    /// Id currently in `Playing`, if any.
    pub(crate) active: Property<Option<VideoId>>,

    /// Most recently active id, for re-focus on app foreground.
    pub(crate) last_active: RwLock<Option<VideoId>>,

    /// Current network link class.
    pub(crate) network: Property<NetworkClass>,

    /// Feed index the user is currently viewing.
    pub(crate) focus_index: AtomicUsize,

    /// Progressive cache target state.
    pub(crate) cache_target: RwLock<CacheTarget>,

    /// Sink for handle status samples from watcher tasks.
    pub(crate) status_tx: mpsc::UnboundedSender<StatusSample>,
}

impl Core {
    pub(crate) fn new(
        config: PlaybackConfig,
        factory: Arc<dyn PlayerFactory>,
        registry: Arc<HandleRegistry>,
        status_tx: mpsc::UnboundedSender<StatusSample>,
    ) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(1024);
        let config = config.normalized();
        let init_slots = Arc::new(Semaphore::new(config.max_concurrent_inits));
        let cache_target = RwLock::new(CacheTarget::new());

        Arc::new(Self {
            factory,
            registry,
            table: StateTable::new(events_tx.clone()),
            feed: RwLock::new(Feed::new()),
            ready: RwLock::new(ReadyQueue::new()),
            ready_view: Property::new(Vec::new()),
            pool: RwLock::new(HashMap::new()),
            events: events_tx,
            init_slots,
            playback_lock: Mutex::new(()),
            active: Property::new(None),
            last_active: RwLock::new(None),
            network: Property::new(NetworkClass::Unknown),
            focus_index: AtomicUsize::new(0),
            cache_target,
            config,
            status_tx,
        })
    }

    /// Whether the id is the current active one.
    pub(crate) fn is_active(&self, id: &VideoId) -> bool {
        self.active.get().as_ref() == Some(id)
    }

    /// Push the current ready queue contents to the UI-facing view.
    pub(crate) async fn refresh_ready_view(&self) {
        let items = self.ready.read().await.to_vec();
        self.ready_view.set(items);
    }
}
