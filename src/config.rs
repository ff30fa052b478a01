use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable prefix for overrides, e.g. `GENAI_STUDIO__SERVICE__HTTP__PORT=9000`
pub const ENV_PREFIX: &str = "GENAI_STUDIO";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub api: ApiConfig,
    pub models: ModelsConfig,
    pub voice: VoiceConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "genai-studio".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// REST endpoint for generateContent calls
    pub base_url: String,
    /// Websocket endpoint for the live voice session
    pub live_url: String,
    /// Explicit key; falls back to GEMINI_API_KEY / API_KEY
    pub key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            live_url: "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string(),
            key: None,
        }
    }
}

impl ApiConfig {
    pub fn resolve_key(&self) -> Option<String> {
        self.key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .or_else(|| std::env::var("API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub chat: String,
    pub image: String,
    pub live: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            chat: "gemini-3-flash-preview".to_string(),
            image: "gemini-2.5-flash-image".to_string(),
            live: "gemini-2.5-flash-native-audio-preview-12-2025".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub voice_name: String,
    pub system_instruction: String,
    /// Outbound microphone rate
    pub input_sample_rate: u32,
    /// Inbound assistant audio rate
    pub output_sample_rate: u32,
    /// Samples per outbound frame
    pub frame_size: usize,
    pub transcribe_input: bool,
    pub transcribe_output: bool,
    /// Depth of the inbound event queue
    pub event_buffer: usize,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice_name: "Zephyr".to_string(),
            system_instruction: "You are a helpful and intelligent multimodal studio assistant. Engage in natural conversation.".to_string(),
            input_sample_rate: 16000,
            output_sample_rate: 24000,
            frame_size: 4096,
            transcribe_input: true,
            transcribe_output: true,
            event_buffer: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureKind {
    Microphone,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackKind {
    Speaker,
    Virtual,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub capture: CaptureKind,
    pub playback: PlaybackKind,
    /// WAV file fed to the session when `capture = "file"`
    pub input_path: Option<PathBuf>,
    /// Where virtual playback writes the assistant's audio, if anywhere
    pub record_path: Option<PathBuf>,
    /// Pace file capture at real time instead of as fast as possible
    pub realtime: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            capture: CaptureKind::Microphone,
            playback: PlaybackKind::Speaker,
            input_path: None,
            record_path: None,
            realtime: true,
        }
    }
}

impl Config {
    /// Load from an optional file (any extension `config` understands) plus
    /// `GENAI_STUDIO__*` environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX).separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }
}
