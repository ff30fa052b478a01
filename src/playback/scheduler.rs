// Gapless scheduling of assistant audio.
//
// Every chunk starts at max(cursor, now) and pushes the cursor to its own
// end, so consecutive chunks play back-to-back without gaps or overlap.
// Interrupting stops every outstanding source and resets the cursor.
//
// Lock order: scheduler state, then the output's internal lock. Outputs run
// end-of-play callbacks (which take the scheduler lock) only after
// releasing their own.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::output::{OutputDevice, PlayableBuffer, SourceId};
use crate::error::VoiceResult;
use crate::live::AudioChunk;

/// Where a chunk landed on the output timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSource {
    pub id: SourceId,
    pub start_time: f64,
    pub duration: f64,
}

#[derive(Debug, Default)]
struct SchedulerState {
    next_start_time: f64,
    outstanding: HashSet<SourceId>,
}

pub struct PlaybackScheduler {
    output: Arc<dyn OutputDevice>,
    state: Arc<Mutex<SchedulerState>>,
    next_id: AtomicU64,
}

impl PlaybackScheduler {
    pub fn new(output: Arc<dyn OutputDevice>) -> Self {
        Self {
            output,
            state: Arc::new(Mutex::new(SchedulerState::default())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn output(&self) -> &Arc<dyn OutputDevice> {
        &self.output
    }

    /// Decode and schedule one chunk of PCM16.
    ///
    /// A chunk that fails to decode (including an empty one) is rejected
    /// with a decode error and leaves the cursor where it was.
    pub fn enqueue(
        &self,
        bytes: &[u8],
        sample_rate: u32,
        channels: u16,
    ) -> VoiceResult<ScheduledSource> {
        let buffer = PlayableBuffer::from_pcm16(bytes, sample_rate, channels)?;
        let duration = buffer.duration();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let weak = Arc::downgrade(&self.state);
        let on_ended = Box::new(move || {
            if let Some(state) = weak.upgrade() {
                state.lock().outstanding.remove(&id);
            }
        });

        let mut state = self.state.lock();
        let start_time = state.next_start_time.max(self.output.current_time());

        self.output.start(id, buffer, start_time, on_ended)?;

        state.next_start_time = start_time + duration;
        state.outstanding.insert(id);

        debug!(
            "Source {} scheduled at {:.3}s for {:.3}s ({} outstanding)",
            id,
            start_time,
            duration,
            state.outstanding.len()
        );

        Ok(ScheduledSource {
            id,
            start_time,
            duration,
        })
    }

    pub fn enqueue_chunk(&self, chunk: &AudioChunk) -> VoiceResult<ScheduledSource> {
        self.enqueue(&chunk.data, chunk.sample_rate, chunk.channels)
    }

    /// Stop everything scheduled or playing and reset the cursor.
    /// Returns how many sources were stopped.
    pub fn interrupt(&self) -> usize {
        let stopped = self.flush();
        if stopped > 0 {
            info!("Interrupted playback: {} source(s) stopped", stopped);
        }
        stopped
    }

    /// Same flush as `interrupt`, for session teardown.
    pub fn reset(&self) {
        let stopped = self.flush();
        debug!("Playback reset ({} source(s) stopped)", stopped);
    }

    fn flush(&self) -> usize {
        let mut state = self.state.lock();
        state.next_start_time = 0.0;

        state
            .outstanding
            .drain()
            .filter(|&id| self.output.stop(id))
            .count()
    }

    pub fn next_start_time(&self) -> f64 {
        self.state.lock().next_start_time
    }

    pub fn outstanding_count(&self) -> usize {
        self.state.lock().outstanding.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::codec;
    use crate::error::VoiceError;
    use crate::playback::VirtualOutput;

    fn silence(seconds: f64, rate: u32) -> Vec<u8> {
        codec::pcm16_to_bytes(&vec![0i16; (seconds * rate as f64) as usize])
    }

    fn scheduler() -> (Arc<VirtualOutput>, PlaybackScheduler) {
        let output = Arc::new(VirtualOutput::manual(24000));
        let scheduler = PlaybackScheduler::new(output.clone() as Arc<dyn OutputDevice>);
        (output, scheduler)
    }

    #[test]
    fn test_back_to_back() {
        let (_, scheduler) = scheduler();

        let a = scheduler.enqueue(&silence(0.5, 24000), 24000, 1).unwrap();
        let b = scheduler.enqueue(&silence(0.25, 24000), 24000, 1).unwrap();

        assert_eq!(a.start_time, 0.0);
        assert!((b.start_time - 0.5).abs() < 1e-9);
        assert!((scheduler.next_start_time() - 0.75).abs() < 1e-9);
        assert_eq!(scheduler.outstanding_count(), 2);
    }

    #[test]
    fn test_late_chunk_starts_now() {
        let (output, scheduler) = scheduler();
        scheduler.enqueue(&silence(0.1, 24000), 24000, 1).unwrap();

        output.advance(1.0);
        assert_eq!(scheduler.outstanding_count(), 0);

        let late = scheduler.enqueue(&silence(0.1, 24000), 24000, 1).unwrap();
        assert!((late.start_time - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_interrupt_resets() {
        let (output, scheduler) = scheduler();
        scheduler.enqueue(&silence(0.5, 24000), 24000, 1).unwrap();
        scheduler.enqueue(&silence(0.5, 24000), 24000, 1).unwrap();

        assert_eq!(scheduler.interrupt(), 2);
        assert_eq!(scheduler.outstanding_count(), 0);
        assert_eq!(scheduler.next_start_time(), 0.0);
        assert_eq!(output.active_sources(), 0);

        assert_eq!(scheduler.interrupt(), 0);
    }

    #[test]
    fn test_bad_chunk_leaves_cursor() {
        let (_, scheduler) = scheduler();
        scheduler.enqueue(&silence(0.5, 24000), 24000, 1).unwrap();

        assert!(matches!(
            scheduler.enqueue(&[], 24000, 1),
            Err(VoiceError::Decode { .. })
        ));
        assert!(matches!(
            scheduler.enqueue(&[0, 1, 2], 24000, 1),
            Err(VoiceError::Decode { .. })
        ));
        assert!((scheduler.next_start_time() - 0.5).abs() < 1e-9);
        assert_eq!(scheduler.outstanding_count(), 1);
    }
}
