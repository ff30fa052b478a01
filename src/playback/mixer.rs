// Output mixer: sums scheduled sources onto a sample-accurate timeline.
//
// Each source is resampled to the device rate and placed at an absolute
// start frame. `render` fills the next block of output, mixes overlapping
// sources with clipping, advances the clock, and hands back the end-of-play
// callbacks of sources that finished inside the block. Callers run those
// after releasing the mixer lock.

use std::collections::HashMap;

use tracing::{debug, info};

use super::output::{EndedCallback, PlayableBuffer, SourceId};
use crate::audio::codec;

/// Configuration for the output mixer
#[derive(Debug, Clone)]
pub struct MixerConfig {
    /// Device sample rate
    pub sample_rate: u32,
    /// Interleaved output channels; sources are copied to each
    pub channels: u16,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24000,
            channels: 1,
        }
    }
}

struct Voice {
    samples: Vec<f32>,
    start_frame: u64,
    on_ended: Option<EndedCallback>,
}

impl Voice {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

pub struct OutputMixer {
    config: MixerConfig,
    voices: HashMap<SourceId, Voice>,
    /// Frames rendered so far; the output clock
    position: u64,
}

impl OutputMixer {
    pub fn new(config: MixerConfig) -> Self {
        info!(
            "Output mixer initialized: {}Hz, {} channel(s)",
            config.sample_rate, config.channels
        );

        Self {
            config,
            voices: HashMap::new(),
            position: 0,
        }
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    pub fn current_time(&self) -> f64 {
        self.position as f64 / self.config.sample_rate as f64
    }

    pub fn active_count(&self) -> usize {
        self.voices.len()
    }

    /// Place a source at `at` seconds. Past times start at the current position.
    pub fn schedule(
        &mut self,
        id: SourceId,
        buffer: &PlayableBuffer,
        at: f64,
        on_ended: EndedCallback,
    ) {
        let mono = buffer.to_mono();
        let samples = codec::resample_linear(&mono, buffer.sample_rate, self.config.sample_rate);
        let requested = (at.max(0.0) * self.config.sample_rate as f64).round() as u64;
        let start_frame = requested.max(self.position);

        debug!(
            "Scheduled source {} at frame {} ({} frames)",
            id,
            start_frame,
            samples.len()
        );

        self.voices.insert(
            id,
            Voice {
                samples,
                start_frame,
                on_ended: Some(on_ended),
            },
        );
    }

    /// Remove a source without firing its callback
    pub fn stop(&mut self, id: SourceId) -> bool {
        self.voices.remove(&id).is_some()
    }

    pub fn stop_all(&mut self) -> usize {
        let count = self.voices.len();
        self.voices.clear();
        count
    }

    /// Mix the next `out.len() / channels` frames into `out` (interleaved).
    pub fn render(&mut self, out: &mut [f32]) -> Vec<EndedCallback> {
        out.fill(0.0);

        let channels = self.config.channels.max(1) as usize;
        let frames = (out.len() / channels) as u64;
        let block_start = self.position;
        let block_end = block_start + frames;

        for voice in self.voices.values() {
            let from = voice.start_frame.max(block_start);
            let to = voice.end_frame().min(block_end);
            for frame in from..to {
                let sample = voice.samples[(frame - voice.start_frame) as usize];
                let base = (frame - block_start) as usize * channels;
                for slot in &mut out[base..base + channels] {
                    *slot += sample;
                }
            }
        }

        for slot in out.iter_mut() {
            *slot = slot.clamp(-1.0, 1.0);
        }

        self.position = block_end;

        let finished: Vec<SourceId> = self
            .voices
            .iter()
            .filter(|(_, voice)| voice.end_frame() <= block_end)
            .map(|(id, _)| *id)
            .collect();

        finished
            .into_iter()
            .filter_map(|id| self.voices.remove(&id).and_then(|mut v| v.on_ended.take()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn buffer(samples: Vec<f32>) -> PlayableBuffer {
        PlayableBuffer {
            channels: vec![samples],
            sample_rate: 10,
        }
    }

    fn counter() -> (Arc<AtomicUsize>, EndedCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, Box::new(move || {
            inner.fetch_add(1, Ordering::SeqCst);
        }))
    }

    fn mixer() -> OutputMixer {
        OutputMixer::new(MixerConfig {
            sample_rate: 10,
            channels: 1,
        })
    }

    #[test]
    fn test_mixer_creation() {
        let mixer = mixer();
        assert_eq!(mixer.active_count(), 0);
        assert_eq!(mixer.current_time(), 0.0);
    }

    #[test]
    fn test_sources_placed_on_timeline() {
        let mut mixer = mixer();
        let (_, cb) = counter();
        mixer.schedule(1, &buffer(vec![0.5; 2]), 0.2, cb);

        let mut out = vec![0.0; 5];
        let ended = mixer.render(&mut out);
        assert_eq!(out, vec![0.0, 0.0, 0.5, 0.5, 0.0]);
        assert_eq!(ended.len(), 1);
        assert!((mixer.current_time() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_overlap_clips() {
        let mut mixer = mixer();
        let (_, a) = counter();
        let (_, b) = counter();
        mixer.schedule(1, &buffer(vec![0.75; 2]), 0.0, a);
        mixer.schedule(2, &buffer(vec![0.75, 0.1]), 0.0, b);

        let mut out = vec![0.0; 2];
        mixer.render(&mut out);
        assert_eq!(out[0], 1.0);
        assert!((out[1] - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_past_start_plays_now() {
        let mut mixer = mixer();
        let mut out = vec![0.0; 3];
        mixer.render(&mut out);

        let (_, cb) = counter();
        mixer.schedule(1, &buffer(vec![0.25]), 0.0, cb);
        let mut out = vec![0.0; 1];
        mixer.render(&mut out);
        assert_eq!(out, vec![0.25]);
    }

    #[test]
    fn test_stopped_source_never_ends() {
        let mut mixer = mixer();
        let (count, cb) = counter();
        mixer.schedule(7, &buffer(vec![0.5; 4]), 0.0, cb);

        assert!(mixer.stop(7));
        assert!(!mixer.stop(7));

        let mut out = vec![0.0; 8];
        for callback in mixer.render(&mut out) {
            callback();
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_stereo_output_duplicates_mono() {
        let mut mixer = OutputMixer::new(MixerConfig {
            sample_rate: 10,
            channels: 2,
        });
        let (_, cb) = counter();
        mixer.schedule(1, &buffer(vec![0.5]), 0.0, cb);

        let mut out = vec![0.0; 4];
        mixer.render(&mut out);
        assert_eq!(out, vec![0.5, 0.5, 0.0, 0.0]);
    }
}
