use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::VoiceResult;

/// One outbound frame of 16-bit PCM (mono, interleaved if not)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    pub fn to_le_bytes(&self) -> Vec<u8> {
        super::codec::pcm16_to_bytes(&self.samples)
    }

    pub fn duration_ms(&self) -> u64 {
        let per_channel = self.samples.len() as u64 / self.channels.max(1) as u64;
        per_channel * 1000 / self.sample_rate.max(1) as u64
    }
}

/// Configuration for a capture backend
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Rate the backend must deliver (resampling if the device differs)
    pub target_sample_rate: u32,
    /// Size of each delivered block in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
    /// File backends: sleep between blocks so input arrives at real time
    pub realtime: bool,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000, // live session input rate
            buffer_duration_ms: 100,
            realtime: true,
        }
    }
}

/// Audio capture backend
///
/// Implementations:
/// - microphone: cpal default input device (feature `audio-io`)
/// - file: WAV file streamed as if it were a microphone
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing.
    ///
    /// Returns a receiver of mono float blocks in `[-1.0, 1.0]` at the
    /// configured target rate. The channel closes when capture ends.
    async fn start(&mut self) -> VoiceResult<mpsc::Receiver<Vec<f32>>>;

    /// Stop capturing and release the device. Safe to call more than once.
    async fn stop(&mut self) -> VoiceResult<()>;

    fn is_capturing(&self) -> bool;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Where captured audio comes from
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// Default input device (needs the `audio-io` feature)
    Microphone,
    /// WAV file
    File(PathBuf),
}

pub struct AudioBackendFactory;

impl AudioBackendFactory {
    pub fn create(
        source: AudioSource,
        config: AudioBackendConfig,
    ) -> VoiceResult<Box<dyn AudioBackend>> {
        match source {
            AudioSource::Microphone => {
                #[cfg(feature = "audio-io")]
                {
                    let backend = super::microphone::MicrophoneBackend::new(config)?;
                    Ok(Box::new(backend))
                }

                #[cfg(not(feature = "audio-io"))]
                {
                    let _ = config;
                    Err(crate::error::VoiceError::device(
                        "microphone capture requires the `audio-io` feature",
                    ))
                }
            }

            AudioSource::File(path) => {
                let backend = super::file::FileBackend::open(&path, config)?;
                Ok(Box::new(backend))
            }
        }
    }
}
