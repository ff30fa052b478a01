use crate::audio::codec;
use crate::error::{VoiceError, VoiceResult};

pub type SourceId = u64;

/// Fires once when a source plays to its end. Never fires for a stopped source.
pub type EndedCallback = Box<dyn FnOnce() + Send + 'static>;

/// Decoded float audio, one buffer per channel
#[derive(Debug, Clone, PartialEq)]
pub struct PlayableBuffer {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl PlayableBuffer {
    /// Decode interleaved PCM16. Empty or misaligned input is a decode error.
    pub fn from_pcm16(bytes: &[u8], sample_rate: u32, channels: u16) -> VoiceResult<Self> {
        if bytes.is_empty() {
            return Err(VoiceError::decode("empty audio chunk"));
        }
        if sample_rate == 0 {
            return Err(VoiceError::decode("sample rate must be positive"));
        }

        Ok(Self {
            channels: codec::pcm16_bytes_to_float_samples(bytes, sample_rate, channels)?,
            sample_rate,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    /// Seconds
    pub fn duration(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    pub fn to_mono(&self) -> Vec<f32> {
        match self.channels.len() {
            0 => Vec::new(),
            1 => self.channels[0].clone(),
            n => (0..self.frame_count())
                .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() / n as f32)
                .collect(),
        }
    }
}

/// Audio output with a monotonic clock, on which sources are started at
/// absolute times.
///
/// Implementations must invoke `on_ended` without holding any lock the
/// caller may take inside the callback.
pub trait OutputDevice: Send + Sync {
    /// Seconds since the output was opened
    fn current_time(&self) -> f64;

    fn sample_rate(&self) -> u32;

    /// Play `buffer` starting at `at` on the output clock. A time already in
    /// the past starts immediately.
    fn start(
        &self,
        id: SourceId,
        buffer: PlayableBuffer,
        at: f64,
        on_ended: EndedCallback,
    ) -> VoiceResult<()>;

    /// Silence a source. Returns `false` when it was not playing or pending.
    fn stop(&self, id: SourceId) -> bool;

    /// Stop everything and release the device. Idempotent.
    fn close(&self);

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_from_pcm16() {
        let bytes = codec::pcm16_to_bytes(&vec![0i16; 480]);
        let buffer = PlayableBuffer::from_pcm16(&bytes, 24000, 1).unwrap();
        assert_eq!(buffer.frame_count(), 480);
        assert!((buffer.duration() - 0.02).abs() < 1e-9);
    }

    #[test]
    fn test_empty_and_odd_chunks_rejected() {
        assert!(matches!(
            PlayableBuffer::from_pcm16(&[], 24000, 1),
            Err(VoiceError::Decode { .. })
        ));
        assert!(matches!(
            PlayableBuffer::from_pcm16(&[1, 2, 3], 24000, 1),
            Err(VoiceError::Decode { .. })
        ));
    }

    #[test]
    fn test_stereo_to_mono() {
        let bytes = codec::pcm16_to_bytes(&[16384, 0, 16384, 0]);
        let buffer = PlayableBuffer::from_pcm16(&bytes, 24000, 2).unwrap();
        assert_eq!(buffer.frame_count(), 2);
        assert_eq!(buffer.to_mono(), vec![0.25, 0.25]);
    }
}
