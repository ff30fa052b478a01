use crate::config::Config;
use crate::live::LiveConfig;

/// Configuration for a voice session
#[derive(Debug, Clone)]
pub struct VoiceSessionConfig {
    /// Unique session identifier (e.g., "voice-6f1c...")
    pub session_id: String,

    /// Everything fixed when the live channel opens
    pub live: LiveConfig,

    /// Samples per outbound frame
    pub frame_size: usize,

    /// Outbound (microphone) rate
    pub input_sample_rate: u32,

    /// Assistant audio rate when the payload does not say
    pub output_sample_rate: u32,

    /// Size of each block the capture backend delivers
    pub buffer_duration_ms: u64,
}

impl VoiceSessionConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            live: LiveConfig::from_config(cfg),
            frame_size: cfg.voice.frame_size.max(1),
            input_sample_rate: cfg.voice.input_sample_rate,
            output_sample_rate: cfg.voice.output_sample_rate,
            ..Self::default()
        }
    }
}

impl Default for VoiceSessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("voice-{}", uuid::Uuid::new_v4()),
            live: LiveConfig::default(),
            frame_size: 4096,
            input_sample_rate: 16000,
            output_sample_rate: 24000,
            buffer_duration_ms: 100,
        }
    }
}
