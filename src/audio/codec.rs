//! PCM and transport conversions between the local audio pipeline and the
//! live session wire format.
//!
//! Everything here is pure: same input, same output, no allocation beyond the
//! returned buffers.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{VoiceError, VoiceResult};

/// Full-scale divisor for signed 16-bit PCM
pub const PCM16_SCALE: f32 = 32768.0;

/// Base64 (standard alphabet, padded) over the raw byte sequence.
pub fn encode_bytes_to_text(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Inverse of [`encode_bytes_to_text`].
pub fn decode_text_to_bytes(text: &str) -> VoiceResult<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| VoiceError::decode(format!("invalid base64 payload: {}", e)))
}

/// Scale `[-1.0, 1.0]` floats to i16, one sample in, one sample out.
///
/// Values at or beyond full scale saturate instead of wrapping.
pub fn float_samples_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s * PCM16_SCALE).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

/// Little-endian byte view of PCM16 samples.
pub fn pcm16_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Reads little-endian PCM16 samples. A trailing odd byte is an error.
pub fn bytes_to_pcm16(bytes: &[u8]) -> VoiceResult<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        return Err(VoiceError::decode(format!(
            "PCM16 payload has odd length {}",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Interprets `bytes` as interleaved little-endian PCM16 and splits it into
/// `channels` float buffers of `len / (2 * channels)` samples each.
///
/// `sample_rate` is carried for symmetry with the playable buffer it feeds and
/// does not affect the conversion.
pub fn pcm16_bytes_to_float_samples(
    bytes: &[u8],
    _sample_rate: u32,
    channels: u16,
) -> VoiceResult<Vec<Vec<f32>>> {
    if channels == 0 {
        return Err(VoiceError::decode("channel count must be at least 1"));
    }

    let stride = 2 * channels as usize;
    if bytes.len() % stride != 0 {
        return Err(VoiceError::decode(format!(
            "PCM16 payload of {} bytes is not a multiple of {} ({} channel(s))",
            bytes.len(),
            stride,
            channels
        )));
    }

    let frame_count = bytes.len() / stride;
    let mut buffers = vec![Vec::with_capacity(frame_count); channels as usize];

    for frame in bytes.chunks_exact(stride) {
        for (channel, buffer) in buffers.iter_mut().enumerate() {
            let offset = channel * 2;
            let sample = i16::from_le_bytes([frame[offset], frame[offset + 1]]);
            buffer.push(sample as f32 / PCM16_SCALE);
        }
    }

    Ok(buffers)
}

/// Average interleaved channels down to one.
pub fn downmix_to_mono(interleaved: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }

    let channels = channels as usize;
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Linear-interpolation resampler for mono audio.
///
/// Good enough for speech between device rates and the 16/24 kHz wire rates.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).round().max(1.0) as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let position = i as f64 * ratio;
            let index = (position.floor() as usize).min(last);
            let next = (index + 1).min(last);
            let fraction = (position - index as f64) as f32;
            samples[index] + (samples[next] - samples[index]) * fraction
        })
        .collect()
}
