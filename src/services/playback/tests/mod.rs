//! Unit tests for the playback service internals
//!
//! Covers the pure pieces: the legal-transition matrix, ready queue
//! ordering, scheduler window math, cache target stepping and registry
//! pruning. Behavior across subsystems is exercised by the integration
//! tests.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::PlaybackConfig;
use crate::services::playback::core::CacheTarget;
use crate::services::playback::core::ready_queue::ReadyQueue;
use crate::services::playback::core::state::transition_allowed;
use crate::services::playback::subsystems::scheduler::priority_window;
use crate::services::playback::{
    HandleError, HandleRegistry, PlayerHandle, PlayerStatus, VideoDescriptor, VideoId,
};

fn id(n: usize) -> VideoId {
    VideoId::new(format!("{n:064x}"))
}

fn descriptor(n: usize) -> VideoDescriptor {
    VideoDescriptor::streamed(id(n), format!("https://cdn.example/v/{n}.mp4"))
}

mod transition_matrix {
    use super::*;
    use crate::services::playback::Lifecycle::*;

    #[test]
    fn straight_line_lifecycle_is_legal() {
        assert!(transition_allowed(Unseen, Queued));
        assert!(transition_allowed(Queued, Initializing));
        assert!(transition_allowed(Initializing, Ready));
        assert!(transition_allowed(Ready, Playing));
        assert!(transition_allowed(Playing, Ready));
    }

    #[test]
    fn failure_and_eviction_paths_are_legal() {
        assert!(transition_allowed(Initializing, Failed));
        assert!(transition_allowed(Initializing, Evicted));
        assert!(transition_allowed(Ready, Evicted));
        assert!(transition_allowed(Ready, Failed));
        assert!(transition_allowed(Playing, Evicted));
        assert!(transition_allowed(Playing, Failed));
        assert!(transition_allowed(Failed, Queued));
        assert!(transition_allowed(Evicted, Queued));
    }

    #[test]
    fn admission_shortcuts_are_legal() {
        assert!(transition_allowed(Unseen, Ready));
        assert!(transition_allowed(Unseen, Failed));
        assert!(transition_allowed(Queued, Evicted));
    }

    #[test]
    fn skipping_states_is_illegal() {
        assert!(!transition_allowed(Unseen, Initializing));
        assert!(!transition_allowed(Unseen, Playing));
        assert!(!transition_allowed(Queued, Ready));
        assert!(!transition_allowed(Queued, Playing));
        assert!(!transition_allowed(Initializing, Playing));
        assert!(!transition_allowed(Failed, Ready));
        assert!(!transition_allowed(Evicted, Ready));
        assert!(!transition_allowed(Failed, Playing));
    }

    #[test]
    fn terminal_states_cannot_swap() {
        assert!(!transition_allowed(Failed, Evicted));
        assert!(!transition_allowed(Evicted, Failed));
    }
}

mod ready_queue {
    use super::*;

    #[test]
    fn preserves_insertion_order() {
        let mut queue = ReadyQueue::new();
        queue.push(descriptor(3));
        queue.push(descriptor(1));
        queue.push(descriptor(2));

        let ids: Vec<VideoId> = queue.to_vec().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![id(3), id(1), id(2)]);
    }

    #[test]
    fn deduplicates_by_id() {
        let mut queue = ReadyQueue::new();
        assert!(queue.push(descriptor(1)));
        assert!(!queue.push(descriptor(1)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn removal_preserves_survivor_order() {
        let mut queue = ReadyQueue::new();
        for n in [5, 9, 2, 7] {
            queue.push(descriptor(n));
        }
        assert!(queue.remove(&id(9)));
        assert!(!queue.remove(&id(9)));

        let ids: Vec<VideoId> = queue.to_vec().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![id(5), id(2), id(7)]);
    }

    #[test]
    fn next_after_walks_queue_order() {
        let mut queue = ReadyQueue::new();
        for n in [4, 8, 6] {
            queue.push(descriptor(n));
        }

        assert_eq!(queue.next_after(&id(4)).map(|d| d.id), Some(id(8)));
        assert_eq!(queue.next_after(&id(6)), None);
        assert_eq!(queue.next_after(&id(99)), None);
    }

    #[test]
    fn removed_id_can_rejoin_at_the_back() {
        let mut queue = ReadyQueue::new();
        queue.push(descriptor(1));
        queue.push(descriptor(2));
        queue.remove(&id(1));
        queue.push(descriptor(1));

        let ids: Vec<VideoId> = queue.to_vec().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![id(2), id(1)]);
    }
}

mod window_math {
    use super::*;

    #[test]
    fn forward_items_outrank_backward() {
        assert_eq!(priority_window(10, 100, 5, 1), vec![11, 12, 13, 14, 15, 9]);
    }

    #[test]
    fn clamps_at_feed_start() {
        assert_eq!(priority_window(0, 100, 5, 1), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn clamps_at_feed_end() {
        assert_eq!(priority_window(98, 100, 5, 1), vec![99, 97]);
    }

    #[test]
    fn narrow_network_window() {
        assert_eq!(priority_window(10, 100, 1, 1), vec![11, 9]);
    }

    #[test]
    fn empty_feed_yields_nothing() {
        assert!(priority_window(0, 0, 5, 1).is_empty());
    }

    #[test]
    fn focus_index_itself_is_never_scheduled() {
        for focus in 0..20 {
            assert!(!priority_window(focus, 100, 5, 1).contains(&focus));
        }
    }
}

mod cache_target {
    use super::*;

    #[test]
    fn steps_through_the_sequence() {
        let config = PlaybackConfig::default();
        let mut target = CacheTarget::new();

        assert_eq!(target.current(&config), 5);
        assert!(target.advance(&config));
        assert_eq!(target.current(&config), 7);
        for _ in 0..3 {
            assert!(target.advance(&config));
        }
        assert_eq!(target.current(&config), 23);
        assert!(!target.advance(&config));
        assert_eq!(target.current(&config), 23);
    }

    #[test]
    fn entries_are_capped_at_fifty() {
        let config = PlaybackConfig {
            cache_target_sequence: vec![5, 80],
            ..PlaybackConfig::default()
        };
        let mut target = CacheTarget::new();

        assert!(target.advance(&config));
        assert_eq!(target.current(&config), 50);
    }
}

struct NoopHandle;

#[async_trait]
impl PlayerHandle for NoopHandle {
    async fn initialize(&self) -> Result<(), HandleError> {
        Ok(())
    }
    async fn play(&self) -> Result<(), HandleError> {
        Ok(())
    }
    async fn pause(&self) -> Result<(), HandleError> {
        Ok(())
    }
    async fn set_looping(&self, _looping: bool) -> Result<(), HandleError> {
        Ok(())
    }
    async fn set_volume(&self, _volume: f64) -> Result<(), HandleError> {
        Ok(())
    }
    async fn seek(&self, _position: Duration) -> Result<(), HandleError> {
        Ok(())
    }
    async fn dispose(&self) {}
    fn status(&self) -> PlayerStatus {
        PlayerStatus::default()
    }
}

mod registry {
    use super::*;

    #[tokio::test]
    async fn registers_and_unregisters_by_identity() {
        let registry = HandleRegistry::new();
        let first: Arc<dyn PlayerHandle> = Arc::new(NoopHandle);
        let second: Arc<dyn PlayerHandle> = Arc::new(NoopHandle);

        registry.register(&first).await;
        registry.register(&second).await;
        registry.register(&first).await; // duplicate is a no-op
        assert_eq!(registry.len().await, 2);

        registry.unregister(&first).await;
        assert_eq!(registry.len().await, 1);
        assert!(
            registry
                .live()
                .await
                .iter()
                .all(|h| Arc::ptr_eq(h, &second))
        );
    }

    #[tokio::test]
    async fn forgets_handles_disposed_out_from_under_it() {
        let registry = HandleRegistry::new();
        let transient: Arc<dyn PlayerHandle> = Arc::new(NoopHandle);
        let durable: Arc<dyn PlayerHandle> = Arc::new(NoopHandle);

        registry.register(&transient).await;
        registry.register(&durable).await;
        drop(transient);

        let live = registry.live().await;
        assert_eq!(live.len(), 1);
        assert!(Arc::ptr_eq(&live[0], &durable));
        assert!(!registry.is_empty().await);
    }
}
