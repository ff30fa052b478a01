//! Websocket transport against a local server speaking the live protocol.

use std::time::Duration;

use anyhow::{bail, Result};
use futures::{SinkExt, StreamExt};
use genai_studio::live::events::pcm_mime_type;
use genai_studio::live::{
    EncodedAudioPayload, GeminiLiveConnector, InboundEvent, LiveConfig, LiveConnector,
};
use genai_studio::VoiceError;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

type ServerSocket = WebSocketStream<TcpStream>;

async fn listen() -> Result<(TcpListener, GeminiLiveConnector)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("ws://{}/live", listener.local_addr()?);
    Ok((listener, GeminiLiveConnector::new(url, Some("test-key".to_string()))))
}

async fn accept(listener: &TcpListener) -> Result<ServerSocket> {
    let (stream, _) = listener.accept().await?;
    Ok(tokio_tungstenite::accept_async(stream).await?)
}

/// Next text frame as JSON
async fn read_json(ws: &mut ServerSocket) -> Result<Value> {
    while let Some(frame) = ws.next().await {
        if let Message::Text(text) = frame? {
            return Ok(serde_json::from_str(&text)?);
        }
    }
    bail!("client went away")
}

/// Read the setup message and acknowledge it
async fn complete_setup(ws: &mut ServerSocket) -> Result<Value> {
    let setup = read_json(ws).await?;
    ws.send(Message::Text(r#"{"setupComplete":{}}"#.to_string())).await?;
    Ok(setup)
}

async fn collect_events(mut events: mpsc::Receiver<InboundEvent>) -> Vec<InboundEvent> {
    let mut out = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(2), events.recv()).await {
        out.push(event);
    }
    out
}

fn payload(data: &str) -> EncodedAudioPayload {
    EncodedAudioPayload {
        data: data.to_string(),
        mime_type: pcm_mime_type(16000),
    }
}

#[tokio::test]
async fn test_handshake_sends_setup_first() -> Result<()> {
    let (listener, connector) = listen().await?;

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await?;
        let setup = complete_setup(&mut ws).await?;
        ws.close(None).await?;
        anyhow::Ok(setup)
    });

    let session = connector.open(&LiveConfig::default()).await?;
    let (_sender, events) = session.into_parts();
    let setup = server.await??;

    let model = setup["setup"]["model"].as_str().unwrap_or_default();
    assert!(model.starts_with("models/"));
    assert_eq!(
        setup["setup"]["generationConfig"]["responseModalities"][0],
        "AUDIO"
    );

    assert_eq!(collect_events(events).await, vec![InboundEvent::Closed]);
    Ok(())
}

#[tokio::test]
async fn test_audio_order_and_server_close() -> Result<()> {
    let (listener, connector) = listen().await?;

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await?;
        complete_setup(&mut ws).await?;

        let mut received = Vec::new();
        for _ in 0..3 {
            let message = read_json(&mut ws).await?;
            let data = message["realtimeInput"]["audio"]["data"].as_str().unwrap_or_default();
            received.push(data.to_string());
        }

        let reply = json!({
            "serverContent": {"inputTranscription": {"text": "hello"}, "turnComplete": true}
        });
        ws.send(Message::Text(reply.to_string())).await?;
        ws.close(None).await?;
        anyhow::Ok(received)
    });

    let session = connector.open(&LiveConfig::default()).await?;
    let (sender, events) = session.into_parts();
    for data in ["AAE=", "AgM=", "BAU="] {
        assert!(sender.send(payload(data)));
    }

    assert_eq!(server.await??, vec!["AAE=", "AgM=", "BAU="]);

    let events = collect_events(events).await;
    assert_eq!(
        events,
        vec![
            InboundEvent::PartialUserTranscript("hello".to_string()),
            InboundEvent::TurnComplete,
            InboundEvent::Closed,
        ]
    );
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_setup_timeout() -> Result<()> {
    let (listener, connector) = listen().await?;
    let connector = connector.with_setup_timeout(Duration::from_millis(200));

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await?;
        read_json(&mut ws).await?;
        tokio::time::sleep(Duration::from_secs(2)).await;
        anyhow::Ok(())
    });

    let started = std::time::Instant::now();
    match connector.open(&LiveConfig::default()).await {
        Err(VoiceError::Connection { message }) => assert!(message.contains("Timed out")),
        Err(e) => bail!("unexpected error: {}", e),
        Ok(_) => bail!("handshake should not complete"),
    }
    assert!(started.elapsed() < Duration::from_secs(2));

    server.abort();
    Ok(())
}

#[tokio::test]
async fn test_close_during_setup() -> Result<()> {
    let (listener, connector) = listen().await?;

    tokio::spawn(async move {
        let mut ws = accept(&listener).await?;
        read_json(&mut ws).await?;
        ws.close(None).await?;
        anyhow::Ok(())
    });

    let result = connector.open(&LiveConfig::default()).await;
    assert!(matches!(result, Err(VoiceError::Connection { .. })));
    Ok(())
}

#[tokio::test]
async fn test_dropped_socket_reports_error() -> Result<()> {
    let (listener, connector) = listen().await?;

    tokio::spawn(async move {
        let mut ws = accept(&listener).await?;
        complete_setup(&mut ws).await?;
        drop(ws);
        anyhow::Ok(())
    });

    let session = connector.open(&LiveConfig::default()).await?;
    let (_sender, events) = session.into_parts();

    let events = collect_events(events).await;
    assert!(matches!(events.last(), Some(InboundEvent::Error(_))));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_local_close_does_not_wait_for_server() -> Result<()> {
    let (listener, connector) = listen().await?;

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await?;
        complete_setup(&mut ws).await?;
        // Never reads again, so the close handshake is never answered
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(ws);
        anyhow::Ok(())
    });

    let session = connector.open(&LiveConfig::default()).await?;
    let (sender, mut events) = session.into_parts();
    sender.close();
    assert!(!sender.send(payload("AAE=")));

    let closed = tokio::time::timeout(Duration::from_secs(1), events.recv()).await?;
    assert_eq!(closed, Some(InboundEvent::Closed));
    let after = tokio::time::timeout(Duration::from_secs(1), events.recv()).await?;
    assert_eq!(after, None);

    server.abort();
    Ok(())
}

#[tokio::test]
async fn test_refused_connection() -> Result<()> {
    let (listener, connector) = listen().await?;
    drop(listener);

    let result = connector.open(&LiveConfig::default()).await;
    assert!(matches!(result, Err(VoiceError::Connection { .. })));
    Ok(())
}
