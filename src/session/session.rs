use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::VoiceSessionConfig;
use super::devices::{DeviceProvider, SystemDevices};
use super::stats::SessionStats;
use super::transcript::{TranscriptAggregator, TranscriptTurn};
use crate::audio::{AmplitudeMeter, AudioBackend, CapturePipeline};
use crate::config::Config;
use crate::error::{VoiceError, VoiceResult};
use crate::live::{GeminiLiveConnector, InboundEvent, LiveConnector, LiveSender};
use crate::playback::{OutputDevice, PlaybackScheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Opening,
    Active,
}

/// Point-in-time view of the session for display
#[derive(Debug, Clone, Serialize)]
pub struct VoiceSessionState {
    pub status: SessionStatus,
    pub amplitude: f32,
    pub next_start_time: f64,
    pub outstanding_sources: usize,
    pub pending_user_text: String,
    pub pending_model_text: String,
}

/// Everything a running session holds. Released exactly once, either by
/// `release` or, for the synchronous parts, by `Drop`.
struct ActiveResources {
    sender: LiveSender,
    backend: Box<dyn AudioBackend>,
    output: Arc<dyn OutputDevice>,
    scheduler: Arc<PlaybackScheduler>,
    capture_task: Option<JoinHandle<()>>,
    dispatch_task: Option<JoinHandle<()>>,
}

impl ActiveResources {
    /// `from_dispatch` is set when the dispatch task itself tears down;
    /// its handle is then detached instead of aborted.
    async fn release(mut self, from_dispatch: bool) {
        self.sender.close();

        if let Some(task) = self.capture_task.take() {
            task.abort();
            let _ = task.await;
        }

        if let Err(e) = self.backend.stop().await {
            warn!("Failed to stop {}: {}", self.backend.name(), e);
        }

        self.scheduler.reset();
        self.output.close();

        if let Some(task) = self.dispatch_task.take() {
            if !from_dispatch {
                task.abort();
                let _ = task.await;
            }
        }

        debug!("Released input {} and output {}", self.backend.name(), self.output.name());
    }
}

impl Drop for ActiveResources {
    fn drop(&mut self) {
        self.sender.close();
        if let Some(task) = self.capture_task.take() {
            task.abort();
        }
        if let Some(task) = self.dispatch_task.take() {
            task.abort();
        }
        self.scheduler.reset();
        self.output.close();
    }
}

/// Rolls an unfinished `start` back to Idle when its future is dropped
/// before reaching Active.
struct StartGuard<'a> {
    inner: &'a Inner,
    epoch: u64,
    output: Option<Arc<dyn OutputDevice>>,
    sender: Option<LiveSender>,
    armed: bool,
}

impl<'a> StartGuard<'a> {
    fn new(inner: &'a Inner, epoch: u64) -> Self {
        Self {
            inner,
            epoch,
            output: None,
            sender: None,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(sender) = self.sender.take() {
            sender.close();
        }
        if let Some(output) = self.output.take() {
            output.close();
        }

        let mut control = self.inner.control.lock();
        if control.epoch == self.epoch && control.status == SessionStatus::Opening {
            control.status = SessionStatus::Idle;
            warn!("Voice session {} start abandoned while opening", self.inner.config.session_id);
        }
    }
}

struct Control {
    status: SessionStatus,
    /// Bumped on every start and teardown; stale tasks compare against it
    epoch: u64,
    resources: Option<ActiveResources>,
    started_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Counters {
    frames_sent: Arc<AtomicU64>,
    chunks_received: AtomicU64,
    chunks_dropped: AtomicU64,
    interruptions: AtomicU64,
    turns: AtomicU64,
}

impl Counters {
    fn reset(&self) {
        self.frames_sent.store(0, Ordering::Relaxed);
        self.chunks_received.store(0, Ordering::Relaxed);
        self.chunks_dropped.store(0, Ordering::Relaxed);
        self.interruptions.store(0, Ordering::Relaxed);
        self.turns.store(0, Ordering::Relaxed);
    }
}

struct Inner {
    config: VoiceSessionConfig,
    connector: Arc<dyn LiveConnector>,
    devices: Arc<dyn DeviceProvider>,
    control: Mutex<Control>,
    transcript: Mutex<TranscriptAggregator>,
    amplitude: AmplitudeMeter,
    counters: Counters,
    last_error: Mutex<Option<VoiceError>>,
}

impl Inner {
    /// Teardown triggered by the channel. Only acts if `epoch` is still the
    /// active session.
    async fn finish_from_remote(&self, epoch: u64, error: Option<VoiceError>) {
        let resources = {
            let mut control = self.control.lock();
            if control.epoch != epoch || control.status != SessionStatus::Active {
                return;
            }
            control.epoch += 1;
            control.status = SessionStatus::Idle;
            control.started_at = None;
            control.resources.take()
        };

        if let Some(error) = error {
            *self.last_error.lock() = Some(error);
        }

        if let Some(resources) = resources {
            resources.release(true).await;
        }

        self.amplitude.reset();
        self.transcript.lock().clear_pending();
        info!("Voice session {} ended by remote", self.config.session_id);
    }

    fn abort_start(&self, epoch: u64, error: VoiceError) -> VoiceResult<()> {
        {
            let mut control = self.control.lock();
            if control.epoch == epoch && control.status == SessionStatus::Opening {
                control.status = SessionStatus::Idle;
            }
        }
        error!("Failed to start voice session: {}", error);
        *self.last_error.lock() = Some(error.clone());
        Err(error)
    }
}

/// Live voice session controller: `Idle -> Opening -> Active -> Idle`.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct VoiceSession {
    inner: Arc<Inner>,
}

impl VoiceSession {
    pub fn new(
        config: VoiceSessionConfig,
        connector: Arc<dyn LiveConnector>,
        devices: Arc<dyn DeviceProvider>,
    ) -> Self {
        info!("Creating voice session: {}", config.session_id);

        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                devices,
                control: Mutex::new(Control {
                    status: SessionStatus::Idle,
                    epoch: 0,
                    resources: None,
                    started_at: None,
                }),
                transcript: Mutex::new(TranscriptAggregator::new()),
                amplitude: AmplitudeMeter::new(),
                counters: Counters::default(),
                last_error: Mutex::new(None),
            }),
        }
    }

    /// Session against the websocket service with the configured devices
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            VoiceSessionConfig::from_config(cfg),
            Arc::new(GeminiLiveConnector::from_config(cfg)),
            Arc::new(SystemDevices::from_config(cfg)),
        )
    }

    /// Start a session. A no-op unless Idle.
    ///
    /// Device failures leave the session Idle with `VoiceError::Device`;
    /// channel failures release the devices and return `VoiceError::Connection`.
    pub async fn start(&self) -> VoiceResult<()> {
        let inner = &self.inner;
        let config = &inner.config;

        let epoch = {
            let mut control = inner.control.lock();
            if control.status != SessionStatus::Idle {
                debug!("Voice session already {:?}; ignoring start", control.status);
                return Ok(());
            }
            control.status = SessionStatus::Opening;
            control.epoch += 1;
            control.epoch
        };
        let mut guard = StartGuard::new(inner, epoch);

        *inner.last_error.lock() = None;
        info!("Starting voice session: {}", config.session_id);

        let mut backend = match inner.devices.open_input(config) {
            Ok(backend) => backend,
            Err(e) => return inner.abort_start(epoch, e),
        };

        let output = match inner.devices.open_output(config).await {
            Ok(output) => output,
            Err(e) => return inner.abort_start(epoch, e),
        };
        guard.output = Some(Arc::clone(&output));

        let session = match inner.connector.open(&config.live).await {
            Ok(session) => session,
            Err(e) => {
                output.close();
                return inner.abort_start(epoch, e);
            }
        };
        let (sender, events) = session.into_parts();
        guard.sender = Some(sender.clone());

        let capture_rx = match backend.start().await {
            Ok(rx) => rx,
            Err(e) => {
                sender.close();
                output.close();
                return inner.abort_start(epoch, e);
            }
        };

        let scheduler = Arc::new(PlaybackScheduler::new(Arc::clone(&output)));
        let mut resources = ActiveResources {
            sender: sender.clone(),
            backend,
            output,
            scheduler: Arc::clone(&scheduler),
            capture_task: None,
            dispatch_task: None,
        };

        {
            let mut control = inner.control.lock();
            if control.epoch == epoch && control.status == SessionStatus::Opening {
                inner.counters.reset();

                let pipeline = CapturePipeline::new(
                    config.frame_size,
                    config.input_sample_rate,
                    inner.amplitude.clone(),
                    Arc::clone(&inner.counters.frames_sent),
                );
                resources.capture_task = Some(tokio::spawn(pipeline.run(capture_rx, sender)));
                resources.dispatch_task = Some(tokio::spawn(dispatch(
                    Arc::downgrade(&self.inner),
                    epoch,
                    events,
                    scheduler,
                )));

                control.resources = Some(resources);
                control.status = SessionStatus::Active;
                control.started_at = Some(Utc::now());

                info!(
                    "Voice session {} active via {}",
                    config.session_id,
                    inner.connector.name()
                );
                guard.disarm();
                return Ok(());
            }
        }

        // stop() arrived while we were opening
        info!("Voice session {} stopped while opening", config.session_id);
        resources.release(false).await;
        guard.disarm();
        Ok(())
    }

    /// Stop the session and release every device. Idempotent; does not wait
    /// for the remote to acknowledge the close.
    pub async fn stop(&self) {
        let inner = &self.inner;

        let resources = {
            let mut control = inner.control.lock();
            if control.status == SessionStatus::Idle {
                debug!("Voice session already idle");
                None
            } else {
                control.epoch += 1;
                control.status = SessionStatus::Idle;
                control.started_at = None;
                control.resources.take()
            }
        };

        let was_running = resources.is_some();
        if let Some(resources) = resources {
            resources.release(false).await;
        }

        inner.amplitude.reset();
        inner.transcript.lock().clear_pending();

        if was_running {
            info!("Voice session {} stopped", inner.config.session_id);
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.control.lock().status
    }

    pub fn amplitude(&self) -> f32 {
        self.inner.amplitude.get()
    }

    pub fn session_id(&self) -> &str {
        &self.inner.config.session_id
    }

    pub fn state(&self) -> VoiceSessionState {
        let (status, scheduler) = {
            let control = self.inner.control.lock();
            (
                control.status,
                control.resources.as_ref().map(|r| Arc::clone(&r.scheduler)),
            )
        };
        let transcript = self.inner.transcript.lock();

        VoiceSessionState {
            status,
            amplitude: self.amplitude(),
            next_start_time: scheduler.as_ref().map(|s| s.next_start_time()).unwrap_or(0.0),
            outstanding_sources: scheduler.as_ref().map(|s| s.outstanding_count()).unwrap_or(0),
            pending_user_text: transcript.pending_user().to_string(),
            pending_model_text: transcript.pending_model().to_string(),
        }
    }

    /// Committed turns, oldest first
    pub fn transcript(&self) -> Vec<TranscriptTurn> {
        self.inner.transcript.lock().log().to_vec()
    }

    pub fn clear_transcript(&self) {
        self.inner.transcript.lock().clear();
    }

    pub fn last_error(&self) -> Option<VoiceError> {
        self.inner.last_error.lock().clone()
    }

    pub fn stats(&self) -> SessionStats {
        let (status, started_at) = {
            let control = self.inner.control.lock();
            (control.status, control.started_at)
        };
        let counters = &self.inner.counters;

        SessionStats {
            session_id: self.inner.config.session_id.clone(),
            status,
            started_at,
            duration_secs: started_at
                .map(|t| (Utc::now() - t).num_milliseconds() as f64 / 1000.0)
                .unwrap_or(0.0),
            frames_sent: counters.frames_sent.load(Ordering::Relaxed),
            audio_chunks_received: counters.chunks_received.load(Ordering::Relaxed),
            chunks_dropped: counters.chunks_dropped.load(Ordering::Relaxed),
            interruptions: counters.interruptions.load(Ordering::Relaxed),
            turns: counters.turns.load(Ordering::Relaxed),
        }
    }
}

/// Applies inbound events in order until the channel terminates.
async fn dispatch(
    inner: Weak<Inner>,
    epoch: u64,
    mut events: mpsc::Receiver<InboundEvent>,
    scheduler: Arc<PlaybackScheduler>,
) {
    debug!("Dispatch task started");

    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };

        match event {
            InboundEvent::PartialUserTranscript(text) => inner.transcript.lock().append_user(&text),
            InboundEvent::PartialModelTranscript(text) => {
                inner.transcript.lock().append_model(&text)
            }
            InboundEvent::TurnComplete => {
                let [user, model] = inner.transcript.lock().complete_turn();
                inner.counters.turns.fetch_add(1, Ordering::Relaxed);
                info!(
                    "Turn complete ({} chars from user, {} from model)",
                    user.text.len(),
                    model.text.len()
                );
            }
            InboundEvent::AudioChunk(chunk) => {
                inner.counters.chunks_received.fetch_add(1, Ordering::Relaxed);
                if let Err(e) = scheduler.enqueue_chunk(&chunk) {
                    warn!("Dropping audio chunk: {}", e);
                    inner.counters.chunks_dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
            InboundEvent::Interrupted => {
                inner.counters.interruptions.fetch_add(1, Ordering::Relaxed);
                scheduler.interrupt();
            }
            InboundEvent::Error(message) => {
                error!("Live session error: {}", message);
                inner
                    .finish_from_remote(epoch, Some(VoiceError::remote(message)))
                    .await;
                return;
            }
            InboundEvent::Closed => {
                inner.finish_from_remote(epoch, None).await;
                return;
            }
        }
    }

    // Stream ended without a terminal event
    if let Some(inner) = inner.upgrade() {
        inner.finish_from_remote(epoch, None).await;
    }
}
