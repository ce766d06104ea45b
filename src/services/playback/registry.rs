use std::sync::{Arc, Weak};

use tokio::sync::RwLock;

use super::handle::PlayerHandle;

/// Weak index of all live decoder handles.
///
/// Used by the coordinator and the host (e.g. on app-lifecycle changes) to
/// enumerate handles and pause everything but one. The registry never owns
/// a handle: entries whose handle was disposed out from under it are
/// skipped and pruned on the next enumeration.
///
/// The registry is a value owned by the host and passed into the service at
/// construction, so tests can instantiate fresh ones.
pub struct HandleRegistry {
    entries: RwLock<Vec<Weak<dyn PlayerHandle>>>,
}

impl HandleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Add a handle to the registry.
    pub async fn register(&self, handle: &Arc<dyn PlayerHandle>) {
        let mut entries = self.entries.write().await;
        if entries
            .iter()
            .any(|w| w.upgrade().is_some_and(|a| Arc::ptr_eq(&a, handle)))
        {
            return;
        }
        entries.push(Arc::downgrade(handle));
    }

    /// Remove a handle from the registry.
    ///
    /// Dead entries encountered along the way are pruned as well.
    pub async fn unregister(&self, handle: &Arc<dyn PlayerHandle>) {
        let mut entries = self.entries.write().await;
        entries.retain(|w| w.upgrade().is_some_and(|a| !Arc::ptr_eq(&a, handle)));
    }

    /// Snapshot of all currently live handles, pruning dead entries.
    pub async fn live(&self) -> Vec<Arc<dyn PlayerHandle>> {
        let mut entries = self.entries.write().await;
        entries.retain(|w| w.strong_count() > 0);
        entries.iter().filter_map(Weak::upgrade).collect()
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        self.live().await.len()
    }

    /// Whether no live handle is registered.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
