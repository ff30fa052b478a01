// Tests for the PCM and transport conversions used on both audio paths

use genai_studio::audio::codec::{
    bytes_to_pcm16, decode_text_to_bytes, encode_bytes_to_text, float_samples_to_pcm16,
    pcm16_bytes_to_float_samples, pcm16_to_bytes, PCM16_SCALE,
};
use genai_studio::VoiceError;

#[test]
fn test_text_transport_preserves_bytes() {
    let bytes: Vec<u8> = (0..=255).collect();
    let text = encode_bytes_to_text(&bytes);

    assert!(text.is_ascii());
    assert_eq!(decode_text_to_bytes(&text).unwrap(), bytes);
    assert_eq!(encode_bytes_to_text(&[]), "");
}

#[test]
fn test_invalid_text_is_decode_error() {
    assert!(matches!(
        decode_text_to_bytes("not base64!!"),
        Err(VoiceError::Decode { .. })
    ));
}

#[test]
fn test_quantization_error_is_bounded() {
    let samples: Vec<f32> = (-1000..1000).map(|i| i as f32 / 1000.0).collect();
    let pcm = float_samples_to_pcm16(&samples);
    assert_eq!(pcm.len(), samples.len());

    let bytes = pcm16_to_bytes(&pcm);
    let back = pcm16_bytes_to_float_samples(&bytes, 16000, 1).unwrap();

    for (original, decoded) in samples.iter().zip(&back[0]) {
        assert!((original - decoded).abs() <= 1.0 / PCM16_SCALE);
    }
}

#[test]
fn test_full_scale_saturates() {
    assert_eq!(float_samples_to_pcm16(&[1.0, -1.0, 2.0, -2.0]), vec![32767, -32768, 32767, -32768]);
}

#[test]
fn test_stereo_split() {
    let bytes = pcm16_to_bytes(&[16384, -16384, 8192, -8192]);
    let channels = pcm16_bytes_to_float_samples(&bytes, 24000, 2).unwrap();

    assert_eq!(channels.len(), 2);
    assert_eq!(channels[0], vec![0.5, 0.25]);
    assert_eq!(channels[1], vec![-0.5, -0.25]);
}

#[test]
fn test_partial_frames_rejected() {
    assert!(bytes_to_pcm16(&[1, 2, 3]).is_err());
    assert!(pcm16_bytes_to_float_samples(&[0; 6], 24000, 2).is_err());
    assert!(pcm16_bytes_to_float_samples(&[0; 4], 24000, 0).is_err());
}

#[test]
fn test_empty_payload_decodes_to_nothing() {
    let channels = pcm16_bytes_to_float_samples(&[], 24000, 1).unwrap();
    assert_eq!(channels, vec![Vec::<f32>::new()]);
}
