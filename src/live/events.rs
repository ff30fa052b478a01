use crate::audio::codec;
use crate::audio::AudioFrame;

/// Sample rate of assistant audio unless the payload says otherwise
pub const DEFAULT_OUTPUT_SAMPLE_RATE: u32 = 24000;

/// Outbound audio in transport form: base64 PCM16 plus its MIME descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudioPayload {
    pub data: String,
    pub mime_type: String,
}

impl EncodedAudioPayload {
    pub fn from_frame(frame: &AudioFrame) -> Self {
        Self {
            data: codec::encode_bytes_to_text(&frame.to_le_bytes()),
            mime_type: pcm_mime_type(frame.sample_rate),
        }
    }
}

/// `audio/pcm;rate=<hz>`
pub fn pcm_mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={}", sample_rate)
}

/// Extracts `rate=` from a PCM MIME descriptor.
pub fn parse_pcm_rate(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.trim().parse().ok())
}

/// Decoded assistant audio, still raw PCM16 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub data: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Everything the remote session can tell us, one value per event
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    PartialUserTranscript(String),
    PartialModelTranscript(String),
    AudioChunk(AudioChunk),
    TurnComplete,
    Interrupted,
    /// Abnormal termination; nothing follows
    Error(String),
    /// Normal termination; nothing follows
    Closed,
}

impl InboundEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InboundEvent::Error(_) | InboundEvent::Closed)
    }
}
