use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::events::{EncodedAudioPayload, InboundEvent};
use super::messages::{
    ClientMessage, LiveGenerationConfig, PrebuiltVoice, SetupMessage, SpeechConfig,
    SystemInstruction, TextPart, VoiceSelection,
};
use crate::config::Config;
use crate::error::VoiceResult;
use crate::genai::types::Empty;

/// Fixed-at-open configuration of a live voice session
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// Model identifier without the `models/` prefix
    pub model: String,
    pub voice_name: String,
    pub system_instruction: String,
    pub transcribe_input: bool,
    pub transcribe_output: bool,
    /// Depth of the inbound event queue
    pub event_buffer: usize,
}

impl LiveConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            model: cfg.models.live.clone(),
            voice_name: cfg.voice.voice_name.clone(),
            system_instruction: cfg.voice.system_instruction.clone(),
            transcribe_input: cfg.voice.transcribe_input,
            transcribe_output: cfg.voice.transcribe_output,
            event_buffer: cfg.voice.event_buffer.max(1),
        }
    }

    /// First message on the wire: audio-only output, named voice, system
    /// instruction, transcription of both directions.
    pub fn setup_message(&self) -> ClientMessage {
        let model = if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        };

        ClientMessage::Setup(SetupMessage {
            model,
            generation_config: LiveGenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceSelection {
                        prebuilt_voice_config: PrebuiltVoice {
                            voice_name: self.voice_name.clone(),
                        },
                    },
                },
            },
            system_instruction: (!self.system_instruction.is_empty()).then(|| SystemInstruction {
                parts: vec![TextPart {
                    text: self.system_instruction.clone(),
                }],
            }),
            input_audio_transcription: self.transcribe_input.then_some(Empty {}),
            output_audio_transcription: self.transcribe_output.then_some(Empty {}),
        })
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Opens live sessions against some transport
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Establish the stream and finish the setup handshake.
    ///
    /// Fails with `VoiceError::Connection`, or `VoiceError::Config` when the
    /// transport lacks credentials; nothing is left running on failure.
    async fn open(&self, config: &LiveConfig) -> VoiceResult<LiveSession>;

    fn name(&self) -> &str;
}

/// What the writer half of a transport consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Audio(EncodedAudioPayload),
    Close,
}

/// Cloneable handle for sending audio and closing the session
#[derive(Debug, Clone)]
pub struct LiveSender {
    tx: mpsc::UnboundedSender<Outbound>,
    closed: Arc<AtomicBool>,
}

impl LiveSender {
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Enqueue audio (FIFO). Returns `false` when the session is closing or
    /// gone; that case is a silent no-op, not an error.
    pub fn send(&self, payload: EncodedAudioPayload) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        self.tx.send(Outbound::Audio(payload)).is_ok()
    }

    /// Request graceful termination. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.tx.send(Outbound::Close).is_err() {
            debug!("Live transport already gone at close");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.tx.is_closed()
    }
}

/// An open live session: a sender plus the ordered inbound event stream
pub struct LiveSession {
    pub sender: LiveSender,
    pub events: mpsc::Receiver<InboundEvent>,
}

impl LiveSession {
    pub fn into_parts(self) -> (LiveSender, mpsc::Receiver<InboundEvent>) {
        (self.sender, self.events)
    }
}

/// Delivers inbound events in order and guarantees exactly one terminal
/// event (`Closed` or `Error`). The sender is dropped with the terminal
/// event, so the stream ends right after it.
pub struct EventEmitter {
    tx: Option<mpsc::Sender<InboundEvent>>,
}

impl EventEmitter {
    pub fn new(tx: mpsc::Sender<InboundEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Returns `false` once finished or when nobody is listening anymore.
    pub async fn emit(&mut self, event: InboundEvent) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        if event.is_terminal() {
            self.finish(event).await;
            return false;
        }
        tx.send(event).await.is_ok()
    }

    /// Emit the terminal event unless one was already delivered.
    pub async fn finish(&mut self, event: InboundEvent) {
        debug_assert!(event.is_terminal());
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(event).await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.tx.is_none()
    }
}
