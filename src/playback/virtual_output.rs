//! Output device without speakers.
//!
//! The clock advances either by hand (`advance`) or in real time on a tokio
//! ticker. What plays can be recorded to a WAV file.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::mixer::{MixerConfig, OutputMixer};
use super::output::{EndedCallback, OutputDevice, PlayableBuffer, SourceId};
use crate::audio::codec;
use crate::error::{VoiceError, VoiceResult};

const TICK: Duration = Duration::from_millis(20);

/// Writes rendered output to disk as 16-bit WAV
struct PlaybackRecorder {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    path: PathBuf,
    samples_written: usize,
}

impl PlaybackRecorder {
    fn create(path: &Path, sample_rate: u32, channels: u16) -> Result<Self> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", path))?;

        Ok(Self {
            writer: Some(writer),
            path: path.to_path_buf(),
            samples_written: 0,
        })
    }

    fn write(&mut self, samples: &[f32]) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            for sample in codec::float_samples_to_pcm16(samples) {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
            self.samples_written += samples.len();
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("Failed to finalize WAV file")?;
            info!(
                "Recorded {} samples of playback to {:?}",
                self.samples_written, self.path
            );
        }
        Ok(())
    }
}

impl Drop for PlaybackRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("Failed to finalize playback recording on drop: {:#}", e);
        }
    }
}

struct Engine {
    mixer: Mutex<OutputMixer>,
    recorder: Mutex<Option<PlaybackRecorder>>,
}

impl Engine {
    fn render(&self, frames: usize) {
        if frames == 0 {
            return;
        }

        let (block, ended) = {
            let mut mixer = self.mixer.lock();
            let channels = mixer.config().channels.max(1) as usize;
            let mut block = vec![0.0f32; frames * channels];
            let ended = mixer.render(&mut block);
            (block, ended)
        };

        if let Some(recorder) = self.recorder.lock().as_mut() {
            if let Err(e) = recorder.write(&block) {
                warn!("{:#}", e);
            }
        }

        for callback in ended {
            callback();
        }
    }
}

pub struct VirtualOutput {
    name: String,
    sample_rate: u32,
    engine: Arc<Engine>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl VirtualOutput {
    fn with_engine(name: &str, sample_rate: u32, recorder: Option<PlaybackRecorder>) -> Self {
        let mixer = OutputMixer::new(MixerConfig {
            sample_rate,
            channels: 1,
        });

        Self {
            name: name.to_string(),
            sample_rate,
            engine: Arc::new(Engine {
                mixer: Mutex::new(mixer),
                recorder: Mutex::new(recorder),
            }),
            ticker: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Clock that only moves when `advance` is called
    pub fn manual(sample_rate: u32) -> Self {
        Self::with_engine("virtual-manual", sample_rate, None)
    }

    /// Clock that follows wall time. Must be called inside a tokio runtime.
    pub fn realtime(sample_rate: u32, record_path: Option<&Path>) -> VoiceResult<Self> {
        let recorder = record_path
            .map(|path| PlaybackRecorder::create(path, sample_rate, 1))
            .transpose()
            .map_err(|e| VoiceError::device(format!("{:#}", e)))?;

        let output = Self::with_engine("virtual", sample_rate, recorder);

        let engine = Arc::clone(&output.engine);
        let ticker = tokio::spawn(async move {
            let started = tokio::time::Instant::now();
            let mut rendered: u64 = 0;
            let mut interval = tokio::time::interval(TICK);
            loop {
                interval.tick().await;
                let due = (started.elapsed().as_secs_f64() * sample_rate as f64) as u64;
                engine.render(due.saturating_sub(rendered) as usize);
                rendered = due.max(rendered);
            }
        });
        *output.ticker.lock() = Some(ticker);

        info!("Virtual output started at {}Hz", sample_rate);
        Ok(output)
    }

    /// Move the clock forward, rendering and finishing sources on the way.
    pub fn advance(&self, seconds: f64) {
        let frames = (seconds.max(0.0) * self.sample_rate as f64).round() as usize;
        self.engine.render(frames);
    }

    pub fn active_sources(&self) -> usize {
        self.engine.mixer.lock().active_count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl OutputDevice for VirtualOutput {
    fn current_time(&self) -> f64 {
        self.engine.mixer.lock().current_time()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(
        &self,
        id: SourceId,
        buffer: PlayableBuffer,
        at: f64,
        on_ended: EndedCallback,
    ) -> VoiceResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(VoiceError::device(format!("{} is closed", self.name)));
        }
        self.engine.mixer.lock().schedule(id, &buffer, at, on_ended);
        Ok(())
    }

    fn stop(&self, id: SourceId) -> bool {
        self.engine.mixer.lock().stop(id)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(ticker) = self.ticker.lock().take() {
            ticker.abort();
        }
        let stopped = self.engine.mixer.lock().stop_all();
        if let Some(mut recorder) = self.engine.recorder.lock().take() {
            if let Err(e) = recorder.finish() {
                warn!("{:#}", e);
            }
        }
        debug!("{} closed ({} sources stopped)", self.name, stopped);
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for VirtualOutput {
    fn drop(&mut self) {
        self.close();
    }
}
