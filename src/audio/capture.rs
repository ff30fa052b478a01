// Capture pipeline: float blocks from a backend -> fixed-size PCM16 frames
// -> encoded payloads on the live channel.
//
// Frames are exactly `frame_size` samples. Leftover samples carry over to
// the next block; a partial frame at end of input is dropped.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::backend::AudioFrame;
use super::codec;
use crate::live::{EncodedAudioPayload, LiveSender};

/// Latest frame amplitude, shared with readers of session state
#[derive(Debug, Clone, Default)]
pub struct AmplitudeMeter(Arc<AtomicU32>);

impl AmplitudeMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn reset(&self) {
        self.set(0.0);
    }
}

/// Root-mean-square of the frame scaled by 100. Zero for an empty frame.
pub fn frame_amplitude(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt() * 100.0
}

pub struct CapturePipeline {
    frame_size: usize,
    sample_rate: u32,
    pending: Vec<f32>,
    frames_sent: Arc<AtomicU64>,
    amplitude: AmplitudeMeter,
    samples_framed: u64,
}

impl CapturePipeline {
    pub fn new(
        frame_size: usize,
        sample_rate: u32,
        amplitude: AmplitudeMeter,
        frames_sent: Arc<AtomicU64>,
    ) -> Self {
        let frame_size = frame_size.max(1);
        Self {
            frame_size,
            sample_rate,
            pending: Vec::with_capacity(frame_size * 2),
            frames_sent,
            amplitude,
            samples_framed: 0,
        }
    }

    /// Feed one block of mono samples; returns how many frames were sent.
    pub fn push_block(&mut self, block: &[f32], sender: &LiveSender) -> usize {
        self.pending.extend_from_slice(block);

        let mut sent = 0;
        while self.pending.len() >= self.frame_size {
            let frame: Vec<f32> = self.pending.drain(..self.frame_size).collect();
            if self.process_frame(&frame, sender) {
                sent += 1;
            }
        }
        sent
    }

    /// Ships one frame unless the session is closing. Amplitude is updated
    /// only for frames that are actually sent.
    pub fn process_frame(&mut self, samples: &[f32], sender: &LiveSender) -> bool {
        if sender.is_closed() {
            return false;
        }

        self.amplitude.set(frame_amplitude(samples));

        let frame = AudioFrame {
            samples: codec::float_samples_to_pcm16(samples),
            sample_rate: self.sample_rate,
            channels: 1,
            timestamp_ms: self.samples_framed * 1000 / self.sample_rate.max(1) as u64,
        };
        self.samples_framed += samples.len() as u64;

        if sender.send(EncodedAudioPayload::from_frame(&frame)) {
            self.frames_sent.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Drive the pipeline until the backend's channel closes or the session does.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Vec<f32>>, sender: LiveSender) {
        info!("Capture pipeline started ({} samples/frame)", self.frame_size);

        while let Some(block) = rx.recv().await {
            if sender.is_closed() {
                break;
            }
            self.push_block(&block, &sender);
        }

        if !self.pending.is_empty() {
            debug!("Dropping {} trailing samples", self.pending.len());
        }
        info!(
            "Capture pipeline stopped after {} frames",
            self.frames_sent.load(Ordering::Relaxed)
        );
    }
}
