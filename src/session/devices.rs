use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::audio::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioSource};
use crate::config::{CaptureKind, Config, PlaybackKind};
use crate::error::{VoiceError, VoiceResult};
use crate::playback::{OutputDevice, VirtualOutput};

use super::config::VoiceSessionConfig;

/// Acquires the input and output devices for one session
#[async_trait]
pub trait DeviceProvider: Send + Sync {
    fn open_input(&self, config: &VoiceSessionConfig) -> VoiceResult<Box<dyn AudioBackend>>;

    /// Opening may wait for the device to come up.
    async fn open_output(&self, config: &VoiceSessionConfig) -> VoiceResult<Arc<dyn OutputDevice>>;
}

/// Devices chosen by the `[audio]` configuration section
#[derive(Debug, Clone)]
pub struct SystemDevices {
    pub capture: CaptureKind,
    pub playback: PlaybackKind,
    pub input_path: Option<PathBuf>,
    pub record_path: Option<PathBuf>,
    pub realtime: bool,
}

impl SystemDevices {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            capture: cfg.audio.capture,
            playback: cfg.audio.playback,
            input_path: cfg.audio.input_path.clone(),
            record_path: cfg.audio.record_path.clone(),
            realtime: cfg.audio.realtime,
        }
    }
}

#[async_trait]
impl DeviceProvider for SystemDevices {
    fn open_input(&self, config: &VoiceSessionConfig) -> VoiceResult<Box<dyn AudioBackend>> {
        let source = match self.capture {
            CaptureKind::Microphone => AudioSource::Microphone,
            CaptureKind::File => {
                let path = self.input_path.clone().ok_or_else(|| {
                    VoiceError::config("audio.input_path is required for file capture")
                })?;
                AudioSource::File(path)
            }
        };

        AudioBackendFactory::create(
            source,
            AudioBackendConfig {
                target_sample_rate: config.input_sample_rate,
                buffer_duration_ms: config.buffer_duration_ms,
                realtime: self.realtime,
            },
        )
    }

    async fn open_output(&self, config: &VoiceSessionConfig) -> VoiceResult<Arc<dyn OutputDevice>> {
        match self.playback {
            PlaybackKind::Virtual => Ok(Arc::new(VirtualOutput::realtime(
                config.output_sample_rate,
                self.record_path.as_deref(),
            )?)),
            PlaybackKind::Speaker => {
                #[cfg(feature = "audio-io")]
                {
                    Ok(Arc::new(crate::playback::SpeakerOutput::open().await?))
                }

                #[cfg(not(feature = "audio-io"))]
                {
                    Err(VoiceError::device(
                        "speaker playback requires the `audio-io` feature",
                    ))
                }
            }
        }
    }
}
