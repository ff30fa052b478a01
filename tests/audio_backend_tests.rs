// Tests for the capture backend abstractions
//
// The file backend stands in for a microphone, so these also cover what the
// voice session sees from any capture device.

use anyhow::Result;
use genai_studio::audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource, FileBackend,
};
use genai_studio::VoiceError;

#[test]
fn test_audio_frame_bytes_are_little_endian() {
    let frame = AudioFrame {
        samples: vec![1, -2, 256],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: 0,
    };

    assert_eq!(frame.to_le_bytes(), vec![0x01, 0x00, 0xFE, 0xFF, 0x00, 0x01]);
}

#[test]
fn test_audio_frame_duration() {
    let frame = AudioFrame {
        samples: vec![0; 4096],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: 512,
    };
    assert_eq!(frame.duration_ms(), 256);

    let stereo = AudioFrame {
        samples: vec![0; 9600],
        sample_rate: 48000,
        channels: 2,
        timestamp_ms: 0,
    };
    assert_eq!(stereo.duration_ms(), 100);
}

#[test]
fn test_backend_config_default() {
    let config = AudioBackendConfig::default();

    assert_eq!(config.target_sample_rate, 16000);
    assert_eq!(config.buffer_duration_ms, 100);
    assert!(config.realtime);
}

#[tokio::test]
async fn test_file_backend_streams_all_samples() -> Result<()> {
    let samples: Vec<f32> = (0..4000).map(|i| (i % 100) as f32 / 100.0).collect();
    let mut backend = FileBackend::from_samples(
        "ramp",
        samples.clone(),
        AudioBackendConfig {
            target_sample_rate: 16000,
            buffer_duration_ms: 100,
            realtime: false,
        },
    );

    let mut rx = backend.start().await?;
    let mut received = Vec::new();
    let mut blocks = 0;
    while let Some(block) = rx.recv().await {
        assert!(block.len() <= 1600);
        received.extend(block);
        blocks += 1;
    }

    assert_eq!(blocks, 3);
    assert_eq!(received, samples);
    assert!(!backend.is_capturing());

    backend.stop().await?;
    backend.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_file_backend_rejects_double_start() -> Result<()> {
    let mut backend = FileBackend::from_samples(
        "long",
        vec![0.0; 160_000],
        AudioBackendConfig::default(),
    );

    let _rx = backend.start().await?;
    assert!(backend.is_capturing());
    assert!(matches!(backend.start().await, Err(VoiceError::Device { .. })));

    backend.stop().await?;
    assert!(!backend.is_capturing());
    Ok(())
}

#[test]
fn test_factory_missing_file_is_device_error() {
    let result = AudioBackendFactory::create(
        AudioSource::File("/nonexistent/input.wav".into()),
        AudioBackendConfig::default(),
    );

    assert!(matches!(result, Err(VoiceError::Device { .. })));
}

#[cfg(not(feature = "audio-io"))]
#[test]
fn test_factory_microphone_needs_feature() {
    let result =
        AudioBackendFactory::create(AudioSource::Microphone, AudioBackendConfig::default());

    match result {
        Err(VoiceError::Device { message }) => assert!(message.contains("audio-io")),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("microphone should be unavailable"),
    }
}
