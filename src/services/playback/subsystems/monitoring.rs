use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::services::playback::core::Core;
use crate::services::playback::handle::PlayerHandle;
use crate::services::playback::types::{PlayerStatus, VideoId};

use super::coordinator;

/// One status observation from a watcher task.
pub(crate) struct StatusSample {
    pub(crate) id: VideoId,
    pub(crate) status: PlayerStatus,
}

/// Poll one handle's status until it errors or is disposed.
///
/// Watchers hold only a weak reference so the pool stays the exclusive
/// owner; a dead upgrade means the handle was disposed and the watcher
/// exits. Error samples are forwarded to the single status loop instead of
/// being handled inline, so state mutations never reenter from a callback.
pub(crate) fn spawn_watcher(
    id: VideoId,
    handle: Weak<dyn PlayerHandle>,
    poll_interval: Duration,
    tx: mpsc::UnboundedSender<StatusSample>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            ticker.tick().await;
            let Some(handle) = handle.upgrade() else {
                return;
            };
            let status = handle.status();
            if status.has_error {
                let _ = tx.send(StatusSample { id, status });
                return;
            }
        }
    })
}

/// Consume status samples and apply the resulting transitions.
///
/// A single consumer keeps all error handling on one logical execution
/// context, in arrival order.
pub(crate) fn spawn_status_loop(
    core: Arc<Core>,
    mut rx: mpsc::UnboundedReceiver<StatusSample>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(sample) = rx.recv().await {
            let description = sample
                .status
                .error_description
                .unwrap_or_else(|| "unspecified player error".to_string());
            warn!(id = %sample.id, %description, "player handle reported an error");
            coordinator::on_error(&core, &sample.id, &description).await;
        }
    })
}
