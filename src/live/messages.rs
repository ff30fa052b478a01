//! Wire messages of the live `BidiGenerateContent` websocket.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::events::{self, AudioChunk, EncodedAudioPayload, InboundEvent};
use crate::audio::codec;
use crate::genai::types::Empty;

/// Client → server envelope; serializes as `{"setup": ...}` or `{"realtimeInput": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(SetupMessage),
    RealtimeInput(RealtimeInput),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupMessage {
    /// `models/<id>`
    pub model: String,
    pub generation_config: LiveGenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<SystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<Empty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<Empty>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveGenerationConfig {
    pub response_modalities: Vec<String>,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceSelection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceSelection {
    pub prebuilt_voice_config: PrebuiltVoice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoice {
    pub voice_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInstruction {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeInput {
    pub audio: Blob,
}

impl From<EncodedAudioPayload> for ClientMessage {
    fn from(payload: EncodedAudioPayload) -> Self {
        ClientMessage::RealtimeInput(RealtimeInput {
            audio: Blob {
                mime_type: payload.mime_type,
                data: payload.data,
            },
        })
    }
}

/// Base64 data with its MIME type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub data: String,
}

/// Server → client message. Every field is optional; unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    pub setup_complete: Option<serde_json::Value>,
    pub server_content: Option<ServerContent>,
    pub go_away: Option<GoAway>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    pub model_turn: Option<ModelTurn>,
    #[serde(default)]
    pub turn_complete: bool,
    #[serde(default)]
    pub interrupted: bool,
    pub input_transcription: Option<Transcription>,
    pub output_transcription: Option<Transcription>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<ServerPart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerPart {
    pub text: Option<String>,
    pub inline_data: Option<Blob>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Transcription {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    pub time_left: Option<String>,
}

impl ServerMessage {
    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }

    /// Flatten one server message into inbound events.
    ///
    /// Order: user transcript, model transcript, turn boundary, audio, interruption.
    /// Audio payloads that fail to decode are dropped here.
    pub fn into_events(self) -> Vec<InboundEvent> {
        let mut out = Vec::new();

        let Some(content) = self.server_content else {
            return out;
        };

        if let Some(text) = content.input_transcription.and_then(|t| t.text) {
            if !text.is_empty() {
                out.push(InboundEvent::PartialUserTranscript(text));
            }
        }

        if let Some(text) = content.output_transcription.and_then(|t| t.text) {
            if !text.is_empty() {
                out.push(InboundEvent::PartialModelTranscript(text));
            }
        }

        if content.turn_complete {
            out.push(InboundEvent::TurnComplete);
        }

        let parts = content.model_turn.map(|turn| turn.parts).unwrap_or_default();
        for blob in parts.into_iter().filter_map(|part| part.inline_data) {
            if blob.data.is_empty() {
                continue;
            }
            match codec::decode_text_to_bytes(&blob.data) {
                Ok(data) => out.push(InboundEvent::AudioChunk(AudioChunk {
                    data,
                    sample_rate: events::parse_pcm_rate(&blob.mime_type)
                        .unwrap_or(events::DEFAULT_OUTPUT_SAMPLE_RATE),
                    channels: 1,
                })),
                Err(e) => warn!("Dropping inbound audio chunk: {}", e),
            }
        }

        if content.interrupted {
            out.push(InboundEvent::Interrupted);
        }

        out
    }
}
