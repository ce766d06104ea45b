//! Shared test support: a scriptable fake decoder and its factory.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use reelfeed::PlaybackService;
use reelfeed::config::PlaybackConfig;
use reelfeed::services::playback::{
    HandleError, HandleRegistry, Lifecycle, PlayerFactory, PlayerHandle, PlayerStatus,
    VideoDescriptor, VideoId,
};

/// Scripted outcome of a fake handle's `initialize()`.
#[derive(Debug, Clone)]
pub enum InitBehavior {
    /// Complete immediately.
    Succeed,
    /// Complete after a delay.
    SucceedAfter(Duration),
    /// Report a backend failure.
    Fail(String),
    /// Never complete; only the bounded timeout ends it.
    Hang,
}

/// Counters shared across all handles of one factory.
#[derive(Default)]
pub struct Counters {
    pub created: AtomicUsize,
    pub disposed: AtomicUsize,
    pub inits_active: AtomicUsize,
    pub inits_peak: AtomicUsize,
}

/// In-memory decoder fake recording every call.
pub struct FakePlayer {
    pub id: VideoId,
    behavior: InitBehavior,
    counters: Arc<Counters>,
    initialized: AtomicBool,
    playing: AtomicBool,
    disposed: AtomicBool,
    looping: AtomicBool,
    volume: Mutex<f64>,
    position: Mutex<Duration>,
    error: Mutex<Option<String>>,
    pub seek_calls: AtomicUsize,
    pub play_calls: AtomicUsize,
    pub pause_calls: AtomicUsize,
}

impl FakePlayer {
    fn new(id: VideoId, behavior: InitBehavior, counters: Arc<Counters>) -> Self {
        Self {
            id,
            behavior,
            counters,
            initialized: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            looping: AtomicBool::new(false),
            volume: Mutex::new(1.0),
            position: Mutex::new(Duration::ZERO),
            error: Mutex::new(None),
            seek_calls: AtomicUsize::new(0),
            play_calls: AtomicUsize::new(0),
            pause_calls: AtomicUsize::new(0),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn is_looping(&self) -> bool {
        self.looping.load(Ordering::SeqCst)
    }

    pub fn position(&self) -> Duration {
        *self.position.lock().unwrap()
    }

    pub fn volume(&self) -> f64 {
        *self.volume.lock().unwrap()
    }

    /// Put the handle into a terminal error state, as a platform decoder
    /// would after e.g. a mid-stream network drop.
    pub fn inject_error(&self, description: &str) {
        *self.error.lock().unwrap() = Some(description.to_string());
    }

    fn guard_usable(&self) -> Result<(), HandleError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(HandleError::Backend("handle disposed".to_string()));
        }
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(HandleError::NotInitialized);
        }
        Ok(())
    }
}

#[async_trait]
impl PlayerHandle for FakePlayer {
    async fn initialize(&self) -> Result<(), HandleError> {
        self.counters.inits_active.fetch_add(1, Ordering::SeqCst);
        self.counters
            .inits_peak
            .fetch_max(self.counters.inits_active.load(Ordering::SeqCst), Ordering::SeqCst);

        let outcome = match &self.behavior {
            InitBehavior::Succeed => Ok(()),
            InitBehavior::SucceedAfter(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(())
            }
            InitBehavior::Fail(message) => Err(HandleError::Backend(message.clone())),
            InitBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        };

        self.counters.inits_active.fetch_sub(1, Ordering::SeqCst);
        if outcome.is_ok() && !self.disposed.load(Ordering::SeqCst) {
            self.initialized.store(true, Ordering::SeqCst);
        }
        outcome
    }

    async fn play(&self) -> Result<(), HandleError> {
        self.guard_usable()?;
        self.play_calls.fetch_add(1, Ordering::SeqCst);
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&self) -> Result<(), HandleError> {
        self.guard_usable()?;
        self.pause_calls.fetch_add(1, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn set_looping(&self, looping: bool) -> Result<(), HandleError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(HandleError::Backend("handle disposed".to_string()));
        }
        self.looping.store(looping, Ordering::SeqCst);
        Ok(())
    }

    async fn set_volume(&self, volume: f64) -> Result<(), HandleError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(HandleError::Backend("handle disposed".to_string()));
        }
        *self.volume.lock().unwrap() = volume;
        Ok(())
    }

    async fn seek(&self, position: Duration) -> Result<(), HandleError> {
        self.guard_usable()?;
        self.seek_calls.fetch_add(1, Ordering::SeqCst);
        *self.position.lock().unwrap() = position;
        Ok(())
    }

    async fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
        self.counters.disposed.fetch_add(1, Ordering::SeqCst);
    }

    fn status(&self) -> PlayerStatus {
        let error = self.error.lock().unwrap().clone();
        PlayerStatus {
            initialized: self.initialized.load(Ordering::SeqCst),
            playing: self.playing.load(Ordering::SeqCst),
            position: *self.position.lock().unwrap(),
            has_error: error.is_some(),
            error_description: error,
        }
    }
}

/// Factory producing [`FakePlayer`]s with per-id scripted behaviors.
pub struct FakeFactory {
    behaviors: Mutex<HashMap<VideoId, InitBehavior>>,
    created: Mutex<Vec<Arc<FakePlayer>>>,
    pub counters: Arc<Counters>,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            behaviors: Mutex::new(HashMap::new()),
            created: Mutex::new(Vec::new()),
            counters: Arc::new(Counters::default()),
        })
    }

    /// Script the init outcome for one id. Unscripted ids succeed
    /// immediately.
    pub fn script(&self, id: &VideoId, behavior: InitBehavior) {
        self.behaviors.lock().unwrap().insert(id.clone(), behavior);
    }

    /// Ids in handle creation order.
    pub fn created_order(&self) -> Vec<VideoId> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.id.clone())
            .collect()
    }

    /// Latest handle created for an id, if any.
    pub fn handle_for(&self, id: &VideoId) -> Option<Arc<FakePlayer>> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|p| &p.id == id)
            .cloned()
    }

    pub fn created_count(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    pub fn disposed_count(&self) -> usize {
        self.counters.disposed.load(Ordering::SeqCst)
    }

    pub fn peak_concurrent_inits(&self) -> usize {
        self.counters.inits_peak.load(Ordering::SeqCst)
    }
}

impl PlayerFactory for FakeFactory {
    fn create(&self, descriptor: &VideoDescriptor) -> Arc<dyn PlayerHandle> {
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&descriptor.id)
            .cloned()
            .unwrap_or(InitBehavior::Succeed);
        let player = Arc::new(FakePlayer::new(
            descriptor.id.clone(),
            behavior,
            Arc::clone(&self.counters),
        ));
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        self.created.lock().unwrap().push(Arc::clone(&player));
        player
    }
}

/// A playback service over a fake factory and a fresh registry, with
/// diagnostics installed so failing tests log what the core was doing.
pub fn service_with(config: PlaybackConfig, factory: &Arc<FakeFactory>) -> PlaybackService {
    reelfeed::tracing_config::init();
    let factory = Arc::clone(factory) as Arc<dyn PlayerFactory>;
    PlaybackService::new(config, factory, Arc::new(HandleRegistry::new()))
}

/// Stable 32-byte hex id for a feed position.
pub fn vid(n: usize) -> VideoId {
    VideoId::new(format!("{n:064x}"))
}

/// Streamed-video descriptor for a feed position.
pub fn streamed(n: usize) -> VideoDescriptor {
    VideoDescriptor::streamed(vid(n), format!("https://cdn.example/v/{n}.mp4"))
}

/// Animated-image descriptor for a feed position.
pub fn animated(n: usize) -> VideoDescriptor {
    VideoDescriptor::animated(vid(n), format!("https://cdn.example/v/{n}.gif"))
}

/// A feed of streamed descriptors for positions `0..n`.
pub fn feed(n: usize) -> Vec<VideoDescriptor> {
    (0..n).map(streamed).collect()
}

/// Ready queue size must equal the number of ids in `Ready` or `Playing`.
pub async fn assert_ready_queue_consistent(service: &PlaybackService) {
    let queue = service.ready_queue().get();
    let ready_like = service
        .snapshot()
        .await
        .into_iter()
        .filter(|(_, r)| matches!(r.state, Lifecycle::Ready | Lifecycle::Playing))
        .count();
    assert_eq!(queue.len(), ready_like);
}

/// Poll until the id reaches the state or the deadline passes.
pub async fn wait_for_state(
    service: &PlaybackService,
    id: &VideoId,
    state: Lifecycle,
    deadline: Duration,
) {
    let poll = Duration::from_millis(5);
    let mut waited = Duration::ZERO;
    loop {
        if service.state_of(id).await == Some(state) {
            return;
        }
        assert!(
            waited < deadline,
            "{id} did not reach {state} within {deadline:?}"
        );
        tokio::time::sleep(poll).await;
        waited += poll;
    }
}

/// Poll until every given id reaches the state.
pub async fn wait_for_all(
    service: &PlaybackService,
    ids: &[VideoId],
    state: Lifecycle,
    deadline: Duration,
) {
    for id in ids {
        wait_for_state(service, id, state, deadline).await;
    }
}
