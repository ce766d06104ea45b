use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::services::playback::core::{Core, PoolEntry};
use crate::services::playback::error::PlaybackError;
use crate::services::playback::handle::PlayerHandle;
use crate::services::playback::types::{ChangeReason, Lifecycle, VideoId};

use super::monitoring;

/// Admit one id into the pool and start its initialization.
///
/// Idempotent: ids already initializing, ready or playing are a no-op.
/// Expects the caller to have transitioned the id to `Queued`. At capacity,
/// eviction frees room first; if nothing is evictable the admission is
/// rescinded and the id transitions to `Evicted`.
#[instrument(skip(core))]
pub(crate) async fn request(core: &Arc<Core>, id: &VideoId) -> Result<(), PlaybackError> {
    let record = core
        .table
        .get(id)
        .await
        .ok_or_else(|| PlaybackError::UnknownVideo(id.clone()))?;

    match record.state {
        Lifecycle::Initializing | Lifecycle::Ready | Lifecycle::Playing => return Ok(()),
        Lifecycle::Queued => {}
        from => {
            return Err(PlaybackError::IllegalTransition {
                id: id.clone(),
                from,
                to: Lifecycle::Initializing,
            });
        }
    }

    if record.descriptor.url.is_none() {
        let _ = core
            .table
            .transition(id, Lifecycle::Evicted, Some(ChangeReason::UrlAbsent), None)
            .await;
        return Err(PlaybackError::UrlAbsent(id.clone()));
    }

    while core.pool.read().await.len() >= core.config.max_handles {
        match select_victim(core).await {
            Some(victim) => evict(core, &victim, ChangeReason::CapacityPressure).await,
            None => {
                debug!(%id, "no evictable handle; rescinding admission");
                let _ = core
                    .table
                    .transition(
                        id,
                        Lifecycle::Evicted,
                        Some(ChangeReason::CapacityPressure),
                        None,
                    )
                    .await;
                return Err(PlaybackError::Cancelled(id.clone()));
            }
        }
    }

    // One handle per id, ever.
    if core.pool.read().await.contains_key(id) {
        return Ok(());
    }

    let handle = core.factory.create(&record.descriptor);
    core.registry.register(&handle).await;
    core.pool.write().await.insert(
        id.clone(),
        PoolEntry {
            handle: Arc::clone(&handle),
            init_task: None,
            monitor_task: None,
        },
    );

    if let Err(e) = core
        .table
        .transition(id, Lifecycle::Initializing, None, None)
        .await
    {
        core.pool.write().await.remove(id);
        core.registry.unregister(&handle).await;
        return Err(e);
    }

    let task = spawn_init_task(Arc::clone(core), id.clone(), handle);
    if let Some(entry) = core.pool.write().await.get_mut(id) {
        entry.init_task = Some(task);
    }

    Ok(())
}

/// Runs one bounded initialization under the FIFO concurrency cap.
fn spawn_init_task(
    core: Arc<Core>,
    id: VideoId,
    handle: Arc<dyn PlayerHandle>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let Ok(permit) = Arc::clone(&core.init_slots).acquire_owned().await else {
            return;
        };

        let outcome = timeout(core.config.init_timeout, handle.initialize()).await;
        drop(permit);

        match outcome {
            Ok(Ok(())) => on_init_success(&core, &id, handle).await,
            Ok(Err(e)) => {
                on_init_failure(
                    &core,
                    &id,
                    ChangeReason::InitializationFailed,
                    e.to_string(),
                )
                .await;
            }
            Err(_) => {
                on_init_failure(
                    &core,
                    &id,
                    ChangeReason::InitializationTimeout,
                    "initialization timed out".to_string(),
                )
                .await;
            }
        }
    })
}

async fn on_init_success(core: &Arc<Core>, id: &VideoId, handle: Arc<dyn PlayerHandle>) {
    let volume = if core.config.start_muted {
        0.0
    } else {
        core.config.default_volume
    };
    let configured = async {
        handle.set_looping(core.config.loop_playback).await?;
        handle.set_volume(volume).await
    };
    if let Err(e) = configured.await {
        on_init_failure(core, id, ChangeReason::InitializationFailed, e.to_string()).await;
        return;
    }

    if core
        .table
        .transition(id, Lifecycle::Ready, None, None)
        .await
        .is_err()
    {
        // Cancelled while initializing; the handle is already orphaned.
        remove_and_dispose(core, id, false, false).await;
        return;
    }

    let descriptor = match core.table.get(id).await {
        Some(record) => record.descriptor,
        None => return,
    };
    if core.ready.write().await.push(descriptor) {
        core.refresh_ready_view().await;
    }

    let watcher = monitoring::spawn_watcher(
        id.clone(),
        Arc::downgrade(&handle),
        core.config.status_poll_interval,
        core.status_tx.clone(),
    );
    if let Some(entry) = core.pool.write().await.get_mut(id) {
        entry.monitor_task = Some(watcher);
    }
}

async fn on_init_failure(core: &Arc<Core>, id: &VideoId, reason: ChangeReason, error: String) {
    debug!(%id, %error, "handle initialization failed");
    remove_and_dispose(core, id, false, false).await;
    if let Err(e) = core
        .table
        .transition(id, Lifecycle::Failed, Some(reason), Some(error))
        .await
    {
        debug!(%id, error = %e, "failure transition skipped");
    }
}

/// Cancel an in-flight initialization and evict the id.
///
/// The half-initialized handle is disposed immediately; the UI never saw it.
#[instrument(skip(core))]
pub(crate) async fn cancel(core: &Arc<Core>, id: &VideoId, reason: ChangeReason) {
    remove_and_dispose(core, id, false, true).await;
    if let Err(e) = core
        .table
        .transition(id, Lifecycle::Evicted, Some(reason), None)
        .await
    {
        debug!(%id, error = %e, "cancel transition skipped");
    }
}

/// Evict one ready handle. The active id is never evicted.
///
/// Disposal is deferred so a UI still holding the handle for one more
/// rendered frame does not glitch.
#[instrument(skip(core))]
pub(crate) async fn evict(core: &Arc<Core>, id: &VideoId, reason: ChangeReason) {
    if core.is_active(id) {
        return;
    }
    if !remove_and_dispose(core, id, true, true).await {
        return;
    }
    if let Err(e) = core
        .table
        .transition(id, Lifecycle::Evicted, Some(reason), None)
        .await
    {
        debug!(%id, error = %e, "evict transition skipped");
    }
}

/// Evict by score until at most `target` handles remain.
///
/// Stops early when only ineligible handles (the active id, in-flight
/// initializations) are left.
pub(crate) async fn evict_down_to(core: &Arc<Core>, target: usize, reason: ChangeReason) {
    while core.pool.read().await.len() > target {
        match select_victim(core).await {
            Some(victim) => evict(core, &victim, reason).await,
            None => break,
        }
    }
}

/// Non-owning handle lookup for the playback surface.
pub(crate) async fn get_handle(core: &Core, id: &VideoId) -> Option<Arc<dyn PlayerHandle>> {
    core.pool.read().await.get(id).map(|e| Arc::clone(&e.handle))
}

/// Remove the pool entry, the registry entry and the ready queue entry for
/// one id, then dispose the handle, deferred or immediately.
///
/// `abort_init` must be false when called from inside the init task itself,
/// which must not cancel its own failure handling.
///
/// Returns whether a pool entry existed.
pub(crate) async fn remove_and_dispose(
    core: &Arc<Core>,
    id: &VideoId,
    deferred: bool,
    abort_init: bool,
) -> bool {
    let entry = core.pool.write().await.remove(id);
    let Some(mut entry) = entry else {
        return false;
    };

    if let Some(task) = entry.monitor_task.take() {
        task.abort();
    }
    if let Some(task) = entry.init_task.take() {
        if abort_init {
            task.abort();
        }
    }

    let handle = Arc::clone(&entry.handle);
    drop(entry);

    core.registry.unregister(&handle).await;

    if core.ready.write().await.remove(id) {
        core.refresh_ready_view().await;
    }

    if deferred {
        let defer = core.config.disposal_defer;
        tokio::spawn(async move {
            tokio::time::sleep(defer).await;
            handle.dispose().await;
        });
    } else {
        handle.dispose().await;
    }

    true
}

/// Pick the eviction victim with the highest score.
///
/// Score is `distance_weight * distance_from_focus + age_weight * age`;
/// distance dominates and age breaks ties for far-but-never-shown items.
/// The active id and in-flight initializations are ineligible.
async fn select_victim(core: &Core) -> Option<VideoId> {
    let active = core.active.get();
    let focus = core.focus_index.load(Ordering::Relaxed);

    let candidates: Vec<VideoId> = core.pool.read().await.keys().cloned().collect();

    let mut best: Option<(VideoId, f64)> = None;
    for id in candidates {
        if active.as_ref() == Some(&id) {
            continue;
        }
        let Some(record) = core.table.get(&id).await else {
            continue;
        };
        if record.state != Lifecycle::Ready {
            continue;
        }

        let distance = match core.feed.read().await.index_of(&id) {
            Some(index) => (index as i64 - focus as i64).unsigned_abs() as f64,
            None => f64::from(u32::MAX),
        };
        let age = record.last_used.elapsed().as_secs_f64();
        let score =
            core.config.eviction_distance_weight * distance + core.config.eviction_age_weight * age;

        match &best {
            Some((_, best_score)) if *best_score >= score => {}
            _ => best = Some((id, score)),
        }
    }

    if best.is_none() {
        warn!("eviction requested but no eligible victim");
    }
    best.map(|(id, _)| id)
}
