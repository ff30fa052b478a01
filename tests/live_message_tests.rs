// Tests for the live websocket message model
//
// Outbound messages are checked against the JSON the service expects;
// inbound messages are parsed from JSON as the service sends them.

use anyhow::Result;
use genai_studio::audio::codec;
use genai_studio::audio::AudioFrame;
use genai_studio::live::messages::{ClientMessage, ServerMessage};
use genai_studio::live::{AudioChunk, EncodedAudioPayload, InboundEvent, LiveConfig};
use serde_json::json;

#[test]
fn test_realtime_input_shape() -> Result<()> {
    let frame = AudioFrame {
        samples: vec![0, 1, -1],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: 0,
    };
    let payload = EncodedAudioPayload::from_frame(&frame);
    assert_eq!(payload.mime_type, "audio/pcm;rate=16000");

    let json = serde_json::to_value(ClientMessage::from(payload.clone()))?;
    assert_eq!(
        json,
        json!({
            "realtimeInput": {
                "audio": {"mimeType": "audio/pcm;rate=16000", "data": payload.data}
            }
        })
    );
    Ok(())
}

#[test]
fn test_setup_respects_transcription_flags() -> Result<()> {
    let config = LiveConfig {
        model: "models/custom-live".to_string(),
        system_instruction: String::new(),
        transcribe_input: false,
        transcribe_output: true,
        ..LiveConfig::default()
    };

    let json = serde_json::to_value(config.setup_message())?;
    let setup = &json["setup"];

    assert_eq!(setup["model"], "models/custom-live");
    assert!(setup.get("systemInstruction").is_none());
    assert!(setup.get("inputAudioTranscription").is_none());
    assert_eq!(setup["outputAudioTranscription"], json!({}));
    Ok(())
}

#[test]
fn test_setup_complete() -> Result<()> {
    let message: ServerMessage = serde_json::from_value(json!({"setupComplete": {}}))?;

    assert!(message.is_setup_complete());
    assert!(message.into_events().is_empty());
    Ok(())
}

#[test]
fn test_server_content_event_order() -> Result<()> {
    let audio = codec::encode_bytes_to_text(&[1, 0, 2, 0]);
    let message: ServerMessage = serde_json::from_value(json!({
        "serverContent": {
            "interrupted": true,
            "modelTurn": {"parts": [
                {"text": "ignored"},
                {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": audio}}
            ]},
            "turnComplete": true,
            "outputTranscription": {"text": "Hi"},
            "inputTranscription": {"text": "Hello"}
        }
    }))?;

    assert_eq!(
        message.into_events(),
        vec![
            InboundEvent::PartialUserTranscript("Hello".to_string()),
            InboundEvent::PartialModelTranscript("Hi".to_string()),
            InboundEvent::TurnComplete,
            InboundEvent::AudioChunk(AudioChunk {
                data: vec![1, 0, 2, 0],
                sample_rate: 24000,
                channels: 1,
            }),
            InboundEvent::Interrupted,
        ]
    );
    Ok(())
}

#[test]
fn test_audio_rate_falls_back_to_default() -> Result<()> {
    let message: ServerMessage = serde_json::from_value(json!({
        "serverContent": {"modelTurn": {"parts": [
            {"inlineData": {"mimeType": "audio/pcm", "data": codec::encode_bytes_to_text(&[0, 0])}}
        ]}}
    }))?;

    match message.into_events().as_slice() {
        [InboundEvent::AudioChunk(chunk)] => assert_eq!(chunk.sample_rate, 24000),
        other => panic!("unexpected events: {:?}", other),
    }
    Ok(())
}

#[test]
fn test_undecodable_audio_is_dropped() -> Result<()> {
    let message: ServerMessage = serde_json::from_value(json!({
        "serverContent": {
            "modelTurn": {"parts": [
                {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "%%%"}}
            ]},
            "turnComplete": true
        }
    }))?;

    assert_eq!(message.into_events(), vec![InboundEvent::TurnComplete]);
    Ok(())
}

#[test]
fn test_unknown_fields_ignored() -> Result<()> {
    let message: ServerMessage = serde_json::from_value(json!({
        "usageMetadata": {"totalTokenCount": 12},
        "goAway": {"timeLeft": "10s"}
    }))?;

    assert!(!message.is_setup_complete());
    assert!(message.into_events().is_empty());
    Ok(())
}
