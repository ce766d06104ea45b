use std::collections::HashSet;

use crate::services::playback::types::{VideoDescriptor, VideoId};

/// Ordered, deduplicated sequence of descriptors proven playable.
///
/// The UI iterates over this queue, not the raw feed: swiping index `k`
/// maps to the `k`-th proven-playable item. Order is insertion order
/// (first proved playable first) and survives removals.
pub(crate) struct ReadyQueue {
    items: Vec<VideoDescriptor>,
    seen: HashSet<VideoId>,
}

impl ReadyQueue {
    pub(crate) fn new() -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Append a descriptor unless its id is already present.
    /// Returns whether the queue changed.
    pub(crate) fn push(&mut self, descriptor: VideoDescriptor) -> bool {
        if !self.seen.insert(descriptor.id.clone()) {
            return false;
        }
        self.items.push(descriptor);
        true
    }

    /// Remove the descriptor with the given id, preserving the order of
    /// the survivors. Returns whether the queue changed.
    pub(crate) fn remove(&mut self, id: &VideoId) -> bool {
        if !self.seen.remove(id) {
            return false;
        }
        self.items.retain(|d| &d.id != id);
        true
    }

    /// The descriptor following the given id, if any.
    pub(crate) fn next_after(&self, id: &VideoId) -> Option<VideoDescriptor> {
        let position = self.items.iter().position(|d| &d.id == id)?;
        self.items.get(position + 1).cloned()
    }

    /// Current contents in order.
    pub(crate) fn to_vec(&self) -> Vec<VideoDescriptor> {
        self.items.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}
