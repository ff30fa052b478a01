//! Microphone capture through cpal.
//!
//! `cpal::Stream` is not `Send`, so the stream lives on a dedicated thread
//! that builds it, plays it, and drops it when told to stop. Dropping the
//! stream is what releases the microphone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::JoinHandle;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig};
use super::codec;
use crate::error::{VoiceError, VoiceResult};

pub struct MicrophoneBackend {
    config: AudioBackendConfig,
    device_name: String,
    capturing: Arc<AtomicBool>,
    stop_tx: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl MicrophoneBackend {
    /// Look up the default input device. Fails fast when none exists so the
    /// session never leaves Idle.
    pub fn new(config: AudioBackendConfig) -> VoiceResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| VoiceError::device("No input device available"))?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using input device: {}", device_name);

        Ok(Self {
            config,
            device_name,
            capturing: Arc::new(AtomicBool::new(false)),
            stop_tx: None,
            thread: None,
        })
    }

    fn release(&mut self) {
        self.capturing.store(false, Ordering::SeqCst);
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Microphone thread panicked");
            }
            info!("Released microphone: {}", self.device_name);
        }
    }
}

#[async_trait]
impl AudioBackend for MicrophoneBackend {
    async fn start(&mut self) -> VoiceResult<mpsc::Receiver<Vec<f32>>> {
        if self.capturing.load(Ordering::SeqCst) {
            return Err(VoiceError::device("Microphone is already capturing"));
        }

        let (audio_tx, audio_rx) = mpsc::channel::<Vec<f32>>(64);
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (ready_tx, ready_rx) = std_mpsc::channel::<VoiceResult<()>>();

        let target_rate = self.config.target_sample_rate;
        let capturing = Arc::clone(&self.capturing);

        let thread = std::thread::Builder::new()
            .name("microphone".to_string())
            .spawn(move || {
                let built = build_input_stream(target_rate, audio_tx, Arc::clone(&capturing));
                let stream = match built {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(VoiceError::device(format!(
                        "Failed to start input stream: {}",
                        e
                    ))));
                    return;
                }

                capturing.store(true, Ordering::SeqCst);
                let _ = ready_tx.send(Ok(()));

                // Park until stop() or the backend is dropped
                let _ = stop_rx.recv();
                capturing.store(false, Ordering::SeqCst);
                drop(stream);
                debug!("Input stream dropped");
            })
            .map_err(|e| VoiceError::device(format!("Failed to spawn microphone thread: {}", e)))?;

        let ready = tokio::task::spawn_blocking(move || ready_rx.recv())
            .await
            .map_err(|e| VoiceError::device(format!("Microphone start aborted: {}", e)))?
            .map_err(|_| VoiceError::device("Microphone thread exited before starting"))?;

        if let Err(e) = ready {
            let _ = thread.join();
            return Err(e);
        }

        self.stop_tx = Some(stop_tx);
        self.thread = Some(thread);
        info!("Started microphone capture at {}Hz", target_rate);

        Ok(audio_rx)
    }

    async fn stop(&mut self) -> VoiceResult<()> {
        self.release();
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        &self.device_name
    }
}

impl Drop for MicrophoneBackend {
    fn drop(&mut self) {
        self.release();
    }
}

fn build_input_stream(
    target_rate: u32,
    audio_tx: mpsc::Sender<Vec<f32>>,
    capturing: Arc<AtomicBool>,
) -> VoiceResult<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| VoiceError::device("No input device available"))?;

    let supported = device
        .default_input_config()
        .map_err(|e| VoiceError::device(format!("Failed to get input config: {}", e)))?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let channels = config.channels;
    let device_rate = config.sample_rate.0;

    debug!(
        "Input config: {}Hz, {} channel(s), {:?}",
        device_rate, channels, sample_format
    );

    let err_fn = |err| {
        error!("Audio input stream error: {}", err);
    };

    let forward = move |data: &[f32]| {
        if !capturing.load(Ordering::SeqCst) {
            return;
        }
        let mono = codec::downmix_to_mono(data, channels);
        let block = codec::resample_linear(&mono, device_rate, target_rate);
        if let Err(e) = audio_tx.try_send(block) {
            debug!("Dropping capture block: {}", e);
        }
    };

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| forward(data),
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let floats: Vec<f32> =
                    data.iter().map(|&s| s as f32 / codec::PCM16_SCALE).collect();
                forward(&floats)
            },
            err_fn,
            None,
        ),
        other => {
            warn!("Unsupported input sample format {:?}", other);
            return Err(VoiceError::device(format!(
                "Unsupported input sample format {:?}",
                other
            )));
        }
    };

    stream.map_err(|e| VoiceError::device(format!("Failed to build input stream: {}", e)))
}
