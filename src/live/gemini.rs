//! Live session over the `BidiGenerateContent` websocket.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use super::channel::{
    EventEmitter, LiveConfig, LiveConnector, LiveSender, LiveSession, Outbound,
};
use super::events::InboundEvent;
use super::messages::{ClientMessage, ServerMessage};
use crate::config::Config;
use crate::error::{VoiceError, VoiceResult};

const SETUP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct GeminiLiveConnector {
    url: String,
    api_key: Option<String>,
    setup_timeout: Duration,
}

impl GeminiLiveConnector {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            url: url.into(),
            api_key,
            setup_timeout: SETUP_TIMEOUT,
        }
    }

    /// How long `open` waits for `setupComplete`
    pub fn with_setup_timeout(mut self, timeout: Duration) -> Self {
        self.setup_timeout = timeout;
        self
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.api.live_url.clone(), cfg.api.resolve_key())
    }
}

/// Parse one websocket frame. `None` means the frame carries nothing for us.
fn parse_frame(msg: &WsMessage) -> Option<Result<ServerMessage, serde_json::Error>> {
    match msg {
        WsMessage::Text(text) => Some(serde_json::from_str(text)),
        WsMessage::Binary(bytes) => Some(serde_json::from_slice(bytes)),
        _ => None,
    }
}

fn encode(message: &ClientMessage) -> VoiceResult<WsMessage> {
    serde_json::to_string(message)
        .map(WsMessage::Text)
        .map_err(|e| VoiceError::connection(format!("Failed to encode message: {}", e)))
}

#[async_trait]
impl LiveConnector for GeminiLiveConnector {
    async fn open(&self, config: &LiveConfig) -> VoiceResult<LiveSession> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| VoiceError::config("No API key configured for the live session"))?;

        info!("Connecting live session ({})", config.model);
        let url = format!("{}?key={}", self.url, api_key);
        let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| VoiceError::connection(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        write
            .send(encode(&config.setup_message())?)
            .await
            .map_err(|e| VoiceError::connection(format!("Failed to send setup: {}", e)))?;

        let handshake = async {
            while let Some(frame) = read.next().await {
                let frame = frame.map_err(|e| VoiceError::connection(e.to_string()))?;
                if let WsMessage::Close(reason) = &frame {
                    return Err(VoiceError::connection(format!(
                        "Closed during setup: {:?}",
                        reason
                    )));
                }
                match parse_frame(&frame) {
                    Some(Ok(msg)) if msg.is_setup_complete() => return Ok(()),
                    Some(Ok(_)) => debug!("Ignoring message before setupComplete"),
                    Some(Err(e)) => {
                        return Err(VoiceError::connection(format!(
                            "Malformed setup reply: {}",
                            e
                        )))
                    }
                    None => {}
                }
            }
            Err(VoiceError::connection("Stream ended during setup"))
        };

        tokio::time::timeout(self.setup_timeout, handshake)
            .await
            .map_err(|_| VoiceError::connection("Timed out waiting for setupComplete"))??;

        info!("Live session established");

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer);
        // Ok(()) once we asked to close; dropped unsent if the writer failed
        let (closed_tx, mut closed_rx) = oneshot::channel::<()>();

        // Writer: outbound audio in FIFO order, then a close frame
        tokio::spawn(async move {
            let mut closed_tx = Some(closed_tx);
            while let Some(outbound) = out_rx.recv().await {
                let frame = match outbound {
                    Outbound::Audio(payload) => match encode(&ClientMessage::from(payload)) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("{}", e);
                            continue;
                        }
                    },
                    Outbound::Close => {
                        let _ = write.send(WsMessage::Close(None)).await;
                        break;
                    }
                };
                if let Err(e) = write.send(frame).await {
                    debug!("Live writer stopped: {}", e);
                    closed_tx = None;
                    break;
                }
            }
            if let Some(tx) = closed_tx {
                let _ = tx.send(());
            }
            debug!("Live writer task finished");
        });

        // Reader: server messages to ordered events, exactly one terminal event.
        // A local close ends it without waiting for the server's close reply.
        tokio::spawn(async move {
            let mut emitter = EventEmitter::new(event_tx);
            let mut writer_alive = true;

            loop {
                let frame = tokio::select! {
                    frame = read.next() => frame,
                    signal = &mut closed_rx, if writer_alive => match signal {
                        Ok(()) => {
                            info!("Live session closed locally");
                            break;
                        }
                        Err(_) => {
                            writer_alive = false;
                            continue;
                        }
                    },
                };

                let frame = match frame {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => {
                        error!("Live session error: {}", e);
                        emitter.finish(InboundEvent::Error(e.to_string())).await;
                        return;
                    }
                    None => break,
                };

                if let WsMessage::Close(reason) = &frame {
                    info!("Live session closed by remote: {:?}", reason);
                    break;
                }

                let message = match parse_frame(&frame) {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        warn!("Ignoring malformed live message: {}", e);
                        continue;
                    }
                    None => continue,
                };

                if let Some(go_away) = &message.go_away {
                    warn!("Live session ending soon: {:?}", go_away.time_left);
                }

                for event in message.into_events() {
                    if !emitter.emit(event).await {
                        return;
                    }
                }
            }

            emitter.finish(InboundEvent::Closed).await;
        });

        Ok(LiveSession {
            sender: LiveSender::new(out_tx),
            events: event_rx,
        })
    }

    fn name(&self) -> &str {
        "gemini-live"
    }
}
