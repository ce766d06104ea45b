use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::services::playback::core::Core;
use crate::services::playback::error::PlaybackError;
use crate::services::playback::types::{ChangeReason, Lifecycle, VideoId, VideoKind};

use super::pool;

/// Make `id` the active item.
///
/// Pauses the previously active handle first, configures the new one
/// (volume, looping, seek-to-zero when configured), then plays it. Fails
/// with `NotReady` when the id has no usable handle yet; callers wait for
/// the ready event and retry. Concurrent calls execute in submission order.
///
/// # Errors
/// Returns `NotReady` if the id is not ready, `UnknownVideo` if it was
/// never ingested, or a handle error if the decoder rejects an operation
#[instrument(skip(core))]
pub(crate) async fn focus(core: &Arc<Core>, id: &VideoId) -> Result<(), PlaybackError> {
    let _guard = core.playback_lock.lock().await;
    focus_locked(core, id).await
}

async fn focus_locked(core: &Arc<Core>, id: &VideoId) -> Result<(), PlaybackError> {
    let record = core
        .table
        .get(id)
        .await
        .ok_or_else(|| PlaybackError::UnknownVideo(id.clone()))?;

    // Animated images render without a decoder handle; focusing one just
    // relinquishes the current handle.
    if record.descriptor.kind == VideoKind::AnimatedImage {
        pause_active_locked(core).await;
        return Ok(());
    }

    if !matches!(record.state, Lifecycle::Ready | Lifecycle::Playing) {
        return Err(PlaybackError::NotReady(id.clone()));
    }
    let handle = pool::get_handle(core, id)
        .await
        .ok_or_else(|| PlaybackError::NotReady(id.clone()))?;

    let previous = core.active.get();
    if let Some(previous_id) = previous.filter(|p| p != id) {
        if let Some(previous_handle) = pool::get_handle(core, &previous_id).await {
            if let Err(e) = previous_handle.pause().await {
                warn!(id = %previous_id, error = %e, "failed to pause previous item");
            }
        }
        if core.table.state_of(&previous_id).await == Some(Lifecycle::Playing) {
            let _ = core
                .table
                .transition(
                    &previous_id,
                    Lifecycle::Ready,
                    Some(ChangeReason::FocusChange),
                    None,
                )
                .await;
        }
    }

    let volume = if core.config.start_muted {
        0.0
    } else {
        core.config.default_volume
    };
    let started = async {
        handle.set_looping(core.config.loop_playback).await?;
        handle.set_volume(volume).await?;
        if core.config.seek_on_refocus {
            handle.seek(Duration::ZERO).await?;
        }
        handle.play().await
    };
    if let Err(e) = started.await {
        fail_locked(core, id, &e.to_string()).await;
        return Err(PlaybackError::Handle(e));
    }

    match core.table.state_of(id).await {
        Some(Lifecycle::Ready) => {
            core.table
                .transition(id, Lifecycle::Playing, Some(ChangeReason::FocusChange), None)
                .await?;
        }
        Some(Lifecycle::Playing) => core.table.touch(id).await,
        other => {
            debug!(%id, state = ?other, "item changed state mid-focus");
            return Err(PlaybackError::NotReady(id.clone()));
        }
    }

    core.active.set(Some(id.clone()));
    *core.last_active.write().await = Some(id.clone());
    Ok(())
}

/// Pause the active item and clear the active id.
pub(crate) async fn pause_active(core: &Arc<Core>) {
    let _guard = core.playback_lock.lock().await;
    pause_active_locked(core).await;
}

async fn pause_active_locked(core: &Arc<Core>) {
    let Some(id) = core.active.get() else {
        return;
    };
    if let Some(handle) = pool::get_handle(core, &id).await {
        if let Err(e) = handle.pause().await {
            warn!(%id, error = %e, "failed to pause active item");
        }
    }
    if core.table.state_of(&id).await == Some(Lifecycle::Playing) {
        let _ = core
            .table
            .transition(&id, Lifecycle::Ready, Some(ChangeReason::FocusChange), None)
            .await;
    }
    *core.last_active.write().await = Some(id);
    core.active.set(None);
}

/// Pause every live handle except the given one. Never disposes.
///
/// Used on app backgrounding and on route changes; enumerates through the
/// registry so handles created outside the pool are covered too.
pub(crate) async fn pause_all_except(core: &Arc<Core>, except: Option<&VideoId>) {
    let except_handle = match except {
        Some(id) => pool::get_handle(core, id).await,
        None => None,
    };

    for handle in core.registry.live().await {
        if let Some(kept) = &except_handle {
            if Arc::ptr_eq(kept, &handle) {
                continue;
            }
        }
        if handle.status().playing {
            if let Err(e) = handle.pause().await {
                warn!(error = %e, "failed to pause handle");
            }
        }
    }
}

/// Advance to the next ready item after `id` finished playing.
///
/// Only meaningful when looping is disabled; the small settle delay lets
/// the UI finish its page transition first.
///
/// # Errors
/// Returns error if focusing the next item fails
pub(crate) async fn on_completed(core: &Arc<Core>, id: &VideoId) -> Result<(), PlaybackError> {
    if core.config.loop_playback {
        return Ok(());
    }
    let next = core.ready.read().await.next_after(id);
    let Some(next) = next else {
        return Ok(());
    };

    tokio::time::sleep(core.config.completion_advance_delay).await;
    focus(core, &next.id).await
}

/// Handle a terminal error reported for `id`.
///
/// Pauses it if active, disposes the handle and marks the item `Failed`.
/// The user-visible behavior is exactly "this item is skipped".
#[instrument(skip(core))]
pub(crate) async fn on_error(core: &Arc<Core>, id: &VideoId, description: &str) {
    let _guard = core.playback_lock.lock().await;
    fail_locked(core, id, description).await;
}

async fn fail_locked(core: &Arc<Core>, id: &VideoId, description: &str) {
    if !matches!(
        core.table.state_of(id).await,
        Some(Lifecycle::Ready | Lifecycle::Playing)
    ) {
        return;
    }

    if core.is_active(id) {
        if let Some(handle) = pool::get_handle(core, id).await {
            let _ = handle.pause().await;
        }
        core.active.set(None);
        let mut last_active = core.last_active.write().await;
        if last_active.as_ref() == Some(id) {
            *last_active = None;
        }
    }

    pool::remove_and_dispose(core, id, true, true).await;
    if let Err(e) = core
        .table
        .transition(
            id,
            Lifecycle::Failed,
            Some(ChangeReason::PlayerError),
            Some(description.to_string()),
        )
        .await
    {
        debug!(%id, error = %e, "error transition skipped");
    }
}
