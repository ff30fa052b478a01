//! Speaker output through cpal.
//!
//! The stream lives on its own thread (`cpal::Stream` is not `Send`). Its
//! callback renders straight from the shared mixer, so the output clock is
//! the count of frames the device has pulled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::mixer::{MixerConfig, OutputMixer};
use super::output::{EndedCallback, OutputDevice, PlayableBuffer, SourceId};
use crate::audio::codec;
use crate::error::{VoiceError, VoiceResult};

pub struct SpeakerOutput {
    device_name: String,
    sample_rate: u32,
    mixer: Arc<Mutex<OutputMixer>>,
    stop_tx: Mutex<Option<std_mpsc::Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl SpeakerOutput {
    /// Open the default output device and start pulling silence from the mixer.
    pub async fn open() -> VoiceResult<Self> {
        // cpal handles are dropped before the readiness await
        let (device_name, sample_format, config) = {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| VoiceError::device("No output device available"))?;
            let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

            let supported = device
                .default_output_config()
                .map_err(|e| VoiceError::device(format!("Failed to get output config: {}", e)))?;
            let config: cpal::StreamConfig = supported.clone().into();
            (device_name, supported.sample_format(), config)
        };

        let mixer = Arc::new(Mutex::new(OutputMixer::new(MixerConfig {
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        })));

        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (ready_tx, ready_rx) = oneshot::channel::<VoiceResult<()>>();
        let thread_mixer = Arc::clone(&mixer);
        let stream_config = config.clone();

        let thread = std::thread::Builder::new()
            .name("speaker".to_string())
            .spawn(move || {
                let built = build_output_stream(&stream_config, sample_format, thread_mixer);
                let stream = match built {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(VoiceError::device(format!(
                        "Failed to start output stream: {}",
                        e
                    ))));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                let _ = stop_rx.recv();
                drop(stream);
                debug!("Output stream dropped");
            })
            .map_err(|e| VoiceError::device(format!("Failed to spawn speaker thread: {}", e)))?;

        // On failure the thread has already returned; it is left to finish on its own
        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(VoiceError::device("Speaker thread exited before starting")),
        }

        info!(
            "Using output device: {} ({}Hz, {} channel(s))",
            device_name, config.sample_rate.0, config.channels
        );

        Ok(Self {
            device_name,
            sample_rate: config.sample_rate.0,
            mixer,
            stop_tx: Mutex::new(Some(stop_tx)),
            thread: Mutex::new(Some(thread)),
            closed: AtomicBool::new(false),
        })
    }
}

fn render_into(mixer: &Mutex<OutputMixer>, data: &mut [f32]) {
    let ended = mixer.lock().render(data);
    for callback in ended {
        callback();
    }
}

fn build_output_stream(
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    mixer: Arc<Mutex<OutputMixer>>,
) -> VoiceResult<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| VoiceError::device("No output device available"))?;

    let err_fn = |err| {
        error!("Audio output stream error: {}", err);
    };

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device.build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| render_into(&mixer, data),
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => {
            let mut scratch: Vec<f32> = Vec::new();
            device.build_output_stream(
                config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    render_into(&mixer, &mut scratch);
                    data.copy_from_slice(&codec::float_samples_to_pcm16(&scratch));
                },
                err_fn,
                None,
            )
        }
        other => {
            warn!("Unsupported output sample format {:?}", other);
            return Err(VoiceError::device(format!(
                "Unsupported output sample format {:?}",
                other
            )));
        }
    };

    stream.map_err(|e| VoiceError::device(format!("Failed to build output stream: {}", e)))
}

impl OutputDevice for SpeakerOutput {
    fn current_time(&self) -> f64 {
        self.mixer.lock().current_time()
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
            return Err(VoiceError::device("Speaker output is closed"));
        }
        self.mixer.lock().schedule(id, &buffer, at, on_ended);
        Ok(())
    }

    fn stop(&self, id: SourceId) -> bool {
        self.mixer.lock().stop(id)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.mixer.lock().stop_all();
        if let Some(stop_tx) = self.stop_tx.lock().take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                error!("Speaker thread panicked");
            }
        }
        info!("Released output device: {}", self.device_name);
    }

    fn name(&self) -> &str {
        &self.device_name
    }
}

impl Drop for SpeakerOutput {
    fn drop(&mut self) {
        self.close();
    }
}
