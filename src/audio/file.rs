use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use hound::{SampleFormat, WavReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::backend::{AudioBackend, AudioBackendConfig};
use super::codec;
use crate::error::{VoiceError, VoiceResult};

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
            anyhow::bail!(
                "Unsupported WAV format: {:?} {}-bit (expected 16-bit PCM)",
                spec.sample_format,
                spec.bits_per_sample
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Mono float samples at `target_rate`, ready for the capture pipeline
    pub fn to_mono(&self, target_rate: u32) -> Vec<f32> {
        let floats: Vec<f32> = self
            .samples
            .iter()
            .map(|&s| s as f32 / codec::PCM16_SCALE)
            .collect();
        let mono = codec::downmix_to_mono(&floats, self.channels);
        codec::resample_linear(&mono, self.sample_rate, target_rate)
    }
}

/// Capture backend that streams a WAV file as if it were a microphone
pub struct FileBackend {
    name: String,
    config: AudioBackendConfig,
    samples: Arc<Vec<f32>>,
    capturing: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl FileBackend {
    pub fn open(path: impl AsRef<Path>, config: AudioBackendConfig) -> VoiceResult<Self> {
        let path = path.as_ref();
        let audio = AudioFile::open(path).map_err(|e| VoiceError::device(format!("{:#}", e)))?;
        let samples = audio.to_mono(config.target_sample_rate);

        Ok(Self::from_samples(
            format!("file:{}", path.display()),
            samples,
            config,
        ))
    }

    /// Backend over samples already at the target rate
    pub fn from_samples(
        name: impl Into<String>,
        samples: Vec<f32>,
        config: AudioBackendConfig,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            samples: Arc::new(samples),
            capturing: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    fn block_len(&self) -> usize {
        let len = self.config.target_sample_rate as u64 * self.config.buffer_duration_ms / 1000;
        len.max(1) as usize
    }
}

#[async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> VoiceResult<mpsc::Receiver<Vec<f32>>> {
        if self.capturing.load(Ordering::SeqCst) {
            return Err(VoiceError::device(format!("{} is already capturing", self.name)));
        }

        let (tx, rx) = mpsc::channel(64);
        let samples = Arc::clone(&self.samples);
        let capturing = Arc::clone(&self.capturing);
        let block_len = self.block_len();
        let pace = self
            .config
            .realtime
            .then(|| Duration::from_millis(self.config.buffer_duration_ms));

        capturing.store(true, Ordering::SeqCst);

        let task = tokio::spawn(async move {
            for block in samples.chunks(block_len) {
                if !capturing.load(Ordering::SeqCst) {
                    break;
                }
                if tx.send(block.to_vec()).await.is_err() {
                    break;
                }
                if let Some(pace) = pace {
                    tokio::time::sleep(pace).await;
                }
            }
            debug!("File capture reached end of input");
            capturing.store(false, Ordering::SeqCst);
        });

        self.task = Some(task);
        info!("Started file capture: {} ({} samples)", self.name, self.samples.len());

        Ok(rx)
    }

    async fn stop(&mut self) -> VoiceResult<()> {
        self.capturing.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Stopped file capture: {}", self.name);
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for FileBackend {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
