use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use futures::Stream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::config::PlaybackConfig;
use crate::services::common::Property;

use super::core::Core;
use super::core::state::StateRecord;
use super::error::PlaybackError;
use super::handle::{PlayerFactory, PlayerHandle};
use super::registry::HandleRegistry;
use super::subsystems::{coordinator, monitoring, pool, scheduler};
use super::types::{
    ChangeReason, Lifecycle, NetworkClass, StateChange, VideoDescriptor, VideoId, VideoKind,
};

/// Video playback controller manager.
///
/// Owns the bounded handle pool, the preload scheduler and the playback
/// coordinator for one feed session. The host ingests descriptors, reports
/// focus movement, and binds its UI to the ready queue and the state-change
/// event stream; the service keeps playback instant within the platform's
/// decoder budget.
pub struct PlaybackService {
    core: Arc<Core>,
    status_loop: JoinHandle<()>,
}

impl PlaybackService {
    /// Create a playback service.
    ///
    /// The factory supplies platform decoder handles; the registry is owned
    /// by the host so app-lifecycle code (and tests) can share or replace
    /// it.
    pub fn new(
        config: PlaybackConfig,
        factory: Arc<dyn PlayerFactory>,
        registry: Arc<HandleRegistry>,
    ) -> Self {
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let core = Core::new(config, factory, registry, status_tx);
        let status_loop = monitoring::spawn_status_loop(Arc::clone(&core), status_rx);

        Self { core, status_loop }
    }

    /// Append descriptors to the feed.
    ///
    /// Ids that already exist are a no-op. Animated images are proven
    /// playable immediately and join the ready queue without pool work;
    /// streamed videos wait for the scheduler.
    pub async fn ingest(&self, descriptors: Vec<VideoDescriptor>) {
        for descriptor in descriptors {
            if !self.core.table.insert(descriptor.clone()).await {
                continue;
            }
            self.core.feed.write().await.push(descriptor.id.clone());

            if descriptor.kind == VideoKind::AnimatedImage {
                if descriptor.url.is_none() {
                    let _ = self
                        .core
                        .table
                        .transition(
                            &descriptor.id,
                            Lifecycle::Failed,
                            Some(ChangeReason::UrlAbsent),
                            Some("no playable url".to_string()),
                        )
                        .await;
                    continue;
                }
                let _ = self
                    .core
                    .table
                    .transition(&descriptor.id, Lifecycle::Ready, None, None)
                    .await;
                if self.core.ready.write().await.push(descriptor) {
                    self.core.refresh_ready_view().await;
                }
            }
        }
    }

    /// Run one preload pass around the given raw feed index.
    ///
    /// Returns the ids newly handed to the pool, in priority order.
    pub async fn preload_around(&self, focus_index: usize) -> Vec<VideoId> {
        scheduler::preload_around(&self.core, focus_index).await
    }

    /// Demand-load one id toward `Ready`, outside the scheduler window.
    ///
    /// The preload window deliberately excludes the focus index itself, so
    /// hosts call this for the item the user is about to watch. Idempotent
    /// for items already on their way.
    ///
    /// # Errors
    /// Returns `UrlAbsent` for non-playable items, `Cancelled` when the
    /// retry budget is exhausted, or an admission error from the pool
    #[instrument(skip(self))]
    pub async fn prepare(&self, id: &VideoId) -> Result<(), PlaybackError> {
        let record = self
            .core
            .table
            .get(id)
            .await
            .ok_or_else(|| PlaybackError::UnknownVideo(id.clone()))?;

        if record.descriptor.kind == VideoKind::AnimatedImage {
            return Ok(());
        }
        match record.state {
            Lifecycle::Queued
            | Lifecycle::Initializing
            | Lifecycle::Ready
            | Lifecycle::Playing => return Ok(()),
            Lifecycle::Unseen | Lifecycle::Evicted | Lifecycle::Failed => {}
        }

        if record.descriptor.url.is_none() {
            if record.state == Lifecycle::Unseen {
                let _ = self
                    .core
                    .table
                    .transition(
                        id,
                        Lifecycle::Failed,
                        Some(ChangeReason::UrlAbsent),
                        Some("no playable url".to_string()),
                    )
                    .await;
            }
            return Err(PlaybackError::UrlAbsent(id.clone()));
        }

        if record.state == Lifecycle::Failed && record.retry_count >= self.core.config.retry_limit {
            debug!(%id, retries = record.retry_count, "retries exhausted for this session");
            return Err(PlaybackError::Cancelled(id.clone()));
        }

        let reason = (record.state == Lifecycle::Failed).then_some(ChangeReason::Retry);
        self.core
            .table
            .transition(id, Lifecycle::Queued, reason, None)
            .await?;
        pool::request(&self.core, id).await
    }

    /// Make `id` the active item. See the playback invariants: at most one
    /// item plays at any instant, and the pause of the previous item
    /// completes before the next starts.
    ///
    /// # Errors
    /// Returns `NotReady` while the item's handle is still initializing;
    /// wait for its ready event and retry
    pub async fn focus(&self, id: &VideoId) -> Result<(), PlaybackError> {
        coordinator::focus(&self.core, id).await
    }

    /// Pause the active item and clear the active id.
    pub async fn pause_active(&self) {
        coordinator::pause_active(&self.core).await;
    }

    /// Pause every live handle except the given one. Never disposes.
    pub async fn pause_all_except(&self, id: Option<&VideoId>) {
        coordinator::pause_all_except(&self.core, id).await;
    }

    /// Report that `id` finished playing.
    ///
    /// With looping disabled this advances focus to the next ready item
    /// after a short settle delay.
    ///
    /// # Errors
    /// Returns error if focusing the next item fails
    pub async fn on_completed(&self, id: &VideoId) -> Result<(), PlaybackError> {
        coordinator::on_completed(&self.core, id).await
    }

    /// Report a terminal playback error for `id`.
    ///
    /// The item is marked failed and its handle disposed; the feed
    /// continues with the remaining items.
    pub async fn on_error(&self, id: &VideoId, description: &str) {
        coordinator::on_error(&self.core, id, description).await;
    }

    /// The host app moved to the background: stop all playback.
    pub async fn on_app_background(&self) {
        coordinator::pause_active(&self.core).await;
        coordinator::pause_all_except(&self.core, None).await;
    }

    /// The host app returned to the foreground: resume the last active
    /// item when it is still ready.
    pub async fn on_app_foreground(&self) {
        let last = self.core.last_active.read().await.clone();
        let Some(id) = last else { return };
        if let Err(e) = coordinator::focus(&self.core, &id).await {
            debug!(%id, error = %e, "could not resume after foregrounding");
        }
    }

    /// The host signalled memory pressure: evict aggressively.
    ///
    /// The pool shrinks to roughly a quarter of its capacity. The active
    /// item is paused but its handle is protected and keeps its state, so
    /// the video on screen does not vanish.
    pub async fn on_memory_pressure(&self) {
        warn!("memory pressure signalled; shrinking handle pool");
        if let Some(id) = self.core.active.get() {
            if let Some(handle) = pool::get_handle(&self.core, &id).await {
                if let Err(e) = handle.pause().await {
                    warn!(%id, error = %e, "failed to pause active item");
                }
            }
        }
        let keep = (self.core.config.max_handles / 4).max(1);
        pool::evict_down_to(&self.core, keep, ChangeReason::MemoryPressure).await;
    }

    /// Update the network link classification used to size the preload
    /// window.
    pub fn set_network_class(&self, class: NetworkClass) {
        self.core.network.set(class);
    }

    /// Current network link classification.
    pub fn network_class(&self) -> NetworkClass {
        self.core.network.get()
    }

    /// Non-owning handle reference for binding a render surface.
    ///
    /// The pool remains the owner; callers must never dispose it.
    pub async fn get_handle(&self, id: &VideoId) -> Option<Arc<dyn PlayerHandle>> {
        pool::get_handle(&self.core, id).await
    }

    /// Reactive view of the ready queue contents, in proof order.
    pub fn ready_queue(&self) -> Property<Vec<VideoDescriptor>> {
        self.core.ready_view.clone()
    }

    /// Reactive view of the active id.
    pub fn active(&self) -> Property<Option<VideoId>> {
        self.core.active.clone()
    }

    /// Subscribe to state-change events from now on.
    ///
    /// Historical events are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.core.events.subscribe()
    }

    /// State-change events as a stream, from now on.
    pub fn events(&self) -> Pin<Box<dyn Stream<Item = StateChange> + Send>> {
        let mut rx = self.core.events.subscribe();

        Box::pin(stream! {
            loop {
                match rx.recv().await {
                    Ok(change) => yield change,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Current lifecycle state of one id.
    pub async fn state_of(&self, id: &VideoId) -> Option<Lifecycle> {
        self.core.table.state_of(id).await
    }

    /// Snapshot of all per-id records, for debug and telemetry.
    pub async fn snapshot(&self) -> Vec<(VideoId, StateRecord)> {
        self.core.table.snapshot().await
    }

    /// Number of live decoder handles.
    pub async fn live_handle_count(&self) -> usize {
        self.core.pool.read().await.len()
    }
}

impl Drop for PlaybackService {
    fn drop(&mut self) {
        self.status_loop.abort();
    }
}
