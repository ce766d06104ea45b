use std::sync::Arc;
use std::sync::atomic::Ordering;

use tracing::{debug, instrument};

use crate::services::playback::core::Core;
use crate::services::playback::types::{ChangeReason, Lifecycle, VideoId, VideoKind};

use super::pool;

/// One preload pass around the given focus index.
///
/// Picks the window ids in priority order (forward items always outrank
/// backward items), advances as many as the concurrency cap and the cache
/// target allow toward `Ready`, then steps the cache target and cleans up
/// handles that fell out of the keep window.
///
/// Returns the ids newly handed to the pool, in priority order.
#[instrument(skip(core))]
pub(crate) async fn preload_around(core: &Arc<Core>, focus: usize) -> Vec<VideoId> {
    core.focus_index.store(focus, Ordering::Relaxed);

    let ahead = core.config.preload_ahead(core.network.get());
    let behind = core.config.preload_behind;

    let candidates: Vec<VideoId> = {
        let feed = core.feed.read().await;
        priority_window(focus, feed.len(), ahead, behind)
            .into_iter()
            .filter_map(|index| feed.id_at(index).cloned())
            .collect()
    };

    let in_flight = core.table.count_in(Lifecycle::Initializing).await;
    let ready_count = core.table.ready_like_count().await;
    let cache_target = {
        let target = core.cache_target.read().await;
        target.current(&core.config)
    };

    let mut budget = core
        .config
        .max_concurrent_inits
        .saturating_sub(in_flight)
        .min(cache_target.saturating_sub(ready_count + in_flight));

    let mut scheduled = Vec::new();
    for id in candidates {
        if budget == 0 {
            break;
        }
        let Some(record) = core.table.get(&id).await else {
            continue;
        };
        if record.descriptor.kind == VideoKind::AnimatedImage {
            continue;
        }

        let retrying = match record.state {
            Lifecycle::Unseen | Lifecycle::Evicted => {
                if record.descriptor.url.is_none() {
                    // Only Unseen items can be URL-less; they are marked
                    // once and never reconsidered.
                    let _ = core
                        .table
                        .transition(
                            &id,
                            Lifecycle::Failed,
                            Some(ChangeReason::UrlAbsent),
                            Some("no playable url".to_string()),
                        )
                        .await;
                    continue;
                }
                false
            }
            Lifecycle::Failed => {
                if record.descriptor.url.is_none() {
                    continue;
                }
                if record.retry_count >= core.config.retry_limit {
                    continue;
                }
                let backoff_elapsed = record
                    .failed_at
                    .is_none_or(|at| at.elapsed() >= core.config.retry_backoff);
                if !backoff_elapsed {
                    continue;
                }
                true
            }
            // Queued, Initializing, Ready and Playing need no work.
            _ => continue,
        };

        let reason = retrying.then_some(ChangeReason::Retry);
        if core
            .table
            .transition(&id, Lifecycle::Queued, reason, None)
            .await
            .is_err()
        {
            continue;
        }

        match pool::request(core, &id).await {
            Ok(()) => {
                scheduled.push(id);
                budget -= 1;
            }
            Err(e) => debug!(%id, error = %e, "preload admission declined"),
        }
    }

    advance_cache_target(core).await;
    cleanup_out_of_window(core, focus, ahead).await;

    debug!(
        scheduled = scheduled.len(),
        proven = core.ready.read().await.len(),
        "preload pass complete"
    );
    scheduled
}

/// Window indices in scheduling priority order.
///
/// Forward: `focus+1 ..= focus+ahead` (clamped to the feed), then
/// backward: `focus-1 ..= focus-behind`. The focus index itself is not
/// scheduled; the host demand-loads it when focusing.
pub(crate) fn priority_window(
    focus: usize,
    feed_len: usize,
    ahead: usize,
    behind: usize,
) -> Vec<usize> {
    if feed_len == 0 {
        return Vec::new();
    }
    let last = feed_len - 1;

    let mut order = Vec::with_capacity(ahead + behind);
    for offset in 1..=ahead {
        match focus.checked_add(offset) {
            Some(index) if index <= last => order.push(index),
            _ => break,
        }
    }
    for offset in 1..=behind {
        match focus.checked_sub(offset) {
            Some(index) => order.push(index),
            None => break,
        }
    }
    order
}

/// Step the progressive cache target when enough items are proven ready.
///
/// A no-op while pool occupancy is within 90% of capacity, so scale-up
/// cannot fight the out-of-window cleanup.
async fn advance_cache_target(core: &Arc<Core>) {
    let occupancy = core.pool.read().await.len();
    if occupancy * 10 >= core.config.max_handles * 9 {
        return;
    }

    let ready_count = core.table.ready_like_count().await;
    let mut target = core.cache_target.write().await;
    if ready_count >= target.current(&core.config) && target.advance(&core.config) {
        debug!(
            new_target = target.current(&core.config),
            "cache target advanced"
        );
    }
}

/// Evict or cancel every pooled handle outside the keep window.
///
/// The keep window is wider than the preload window (`ahead + 2` on both
/// sides) so recently-passed items survive direction changes. The active
/// id is always preserved.
async fn cleanup_out_of_window(core: &Arc<Core>, focus: usize, ahead: usize) {
    let keep = ahead + 2;
    let low = focus.saturating_sub(keep);
    let high = focus.saturating_add(keep);

    let pooled: Vec<VideoId> = core.pool.read().await.keys().cloned().collect();
    for id in pooled {
        if core.is_active(&id) {
            continue;
        }
        let index = core.feed.read().await.index_of(&id);
        let Some(index) = index else { continue };
        if index >= low && index <= high {
            continue;
        }

        match core.table.state_of(&id).await {
            Some(Lifecycle::Initializing) => {
                pool::cancel(core, &id, ChangeReason::OutOfWindow).await;
            }
            Some(Lifecycle::Ready) => {
                pool::evict(core, &id, ChangeReason::OutOfWindow).await;
            }
            _ => {}
        }
    }
}
