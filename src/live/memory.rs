//! In-process live transport for tests and embedders that script the remote
//! side: the "remote" end is a [`RemoteEnd`] handle that pushes events and
//! inspects what the session sent.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use super::channel::{EventEmitter, LiveConfig, LiveConnector, LiveSender, LiveSession, Outbound};
use super::events::{EncodedAudioPayload, InboundEvent};
use crate::error::{VoiceError, VoiceResult};

#[derive(Default)]
pub struct MemoryConnector {
    refuse: Option<String>,
    ack_close: bool,
    open_delay: Option<Duration>,
    opens: AtomicUsize,
    last: Mutex<Option<RemoteEnd>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `open` fails with a connection error carrying `message`
    pub fn refuse_with(mut self, message: impl Into<String>) -> Self {
        self.refuse = Some(message.into());
        self
    }

    /// Answer a client close with `Closed`, like a well-behaved server
    pub fn ack_close(mut self) -> Self {
        self.ack_close = true;
        self
    }

    /// Hold every `open` for `delay` before completing the handshake
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Remote end of the most recently opened session
    pub fn last_remote(&self) -> Option<RemoteEnd> {
        self.last.lock().clone()
    }
}

#[async_trait]
impl LiveConnector for MemoryConnector {
    async fn open(&self, config: &LiveConfig) -> VoiceResult<LiveSession> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.refuse {
            return Err(VoiceError::connection(message.clone()));
        }

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer);

        let remote = RemoteEnd {
            emitter: Arc::new(tokio::sync::Mutex::new(EventEmitter::new(event_tx))),
            sent: Arc::new(Mutex::new(Vec::new())),
            close_requested: Arc::new(AtomicBool::new(false)),
        };

        let pump = remote.clone();
        let ack_close = self.ack_close;
        tokio::spawn(async move {
            while let Some(outbound) = out_rx.recv().await {
                match outbound {
                    Outbound::Audio(payload) => pump.sent.lock().push(payload),
                    Outbound::Close => {
                        pump.close_requested.store(true, Ordering::SeqCst);
                        if ack_close {
                            pump.close().await;
                        }
                        break;
                    }
                }
            }
            debug!("Memory transport pump finished");
        });

        *self.last.lock() = Some(remote);

        Ok(LiveSession {
            sender: LiveSender::new(out_tx),
            events: event_rx,
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Test-side handle on an open in-memory session
#[derive(Clone)]
pub struct RemoteEnd {
    emitter: Arc<tokio::sync::Mutex<EventEmitter>>,
    sent: Arc<Mutex<Vec<EncodedAudioPayload>>>,
    close_requested: Arc<AtomicBool>,
}

impl RemoteEnd {
    /// Deliver an event to the session. Terminal events end the stream.
    pub async fn push(&self, event: InboundEvent) -> bool {
        self.emitter.lock().await.emit(event).await
    }

    pub async fn close(&self) {
        self.emitter.lock().await.finish(InboundEvent::Closed).await;
    }

    pub async fn fail(&self, message: impl Into<String>) {
        self.emitter
            .lock()
            .await
            .finish(InboundEvent::Error(message.into()))
            .await;
    }

    pub fn sent_payloads(&self) -> Vec<EncodedAudioPayload> {
        self.sent.lock().clone()
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested.load(Ordering::SeqCst)
    }

    /// Poll until at least `count` payloads arrived or `timeout` elapsed.
    pub async fn wait_for_payloads(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.sent.lock().len() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refused_open() {
        let connector = MemoryConnector::new().refuse_with("no route");
        let result = connector.open(&LiveConfig::default()).await;
        assert_eq!(result.err(), Some(VoiceError::connection("no route")));
        assert_eq!(connector.open_count(), 1);
    }

    #[tokio::test]
    async fn test_round_trip_through_remote() {
        let connector = MemoryConnector::new().ack_close();
        let (sender, mut events) = connector
            .open(&LiveConfig::default())
            .await
            .unwrap()
            .into_parts();
        let remote = connector.last_remote().unwrap();

        sender.send(EncodedAudioPayload {
            data: "AAA=".to_string(),
            mime_type: "audio/pcm;rate=16000".to_string(),
        });
        assert!(remote.wait_for_payloads(1, Duration::from_secs(1)).await);

        remote.push(InboundEvent::TurnComplete).await;
        sender.close();

        assert_eq!(events.recv().await, Some(InboundEvent::TurnComplete));
        assert_eq!(events.recv().await, Some(InboundEvent::Closed));
        assert_eq!(events.recv().await, None);
        assert!(remote.close_requested());
    }
}
