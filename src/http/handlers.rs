use super::state::AppState;
use crate::chat::ChatMessage;
use crate::error::{ChatError, ImageError, VoiceError};
use crate::image::{AspectRatio, GeneratedImage};
use crate::session::{SessionStats, SessionStatus, TranscriptTurn, VoiceSessionState};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateImageRequest {
    pub prompt: String,

    /// Keeps the lab's current ratio when omitted
    pub aspect_ratio: Option<AspectRatio>,
}

#[derive(Debug, Serialize)]
pub struct GenerateImageResponse {
    /// `None` when the model produced no image
    pub image: Option<GeneratedImage>,
}

#[derive(Debug, Serialize)]
pub struct VoiceStatusResponse {
    pub state: VoiceSessionState,
    pub stats: SessionStats,
    pub last_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn voice_error_status(error: &VoiceError) -> StatusCode {
    match error {
        VoiceError::Connection { .. } | VoiceError::Remote { .. } => StatusCode::BAD_GATEWAY,
        VoiceError::Device { .. } => StatusCode::SERVICE_UNAVAILABLE,
        VoiceError::Decode { .. } | VoiceError::Config { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn voice_status_response(state: &AppState) -> VoiceStatusResponse {
    VoiceStatusResponse {
        state: state.voice.state(),
        stats: state.voice.stats(),
        last_error: state.voice.last_error().map(|e| e.to_string()),
    }
}

// ============================================================================
// Chat
// ============================================================================

/// GET /chat/messages
pub async fn list_messages(State(state): State<AppState>) -> Json<Vec<ChatMessage>> {
    Json(state.chat.messages())
}

/// POST /chat/messages
/// Send a message and return the model's reply
pub async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Response {
    match state.chat.send(&req.text).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(e @ ChatError::EmptyMessage) => error_response(StatusCode::BAD_REQUEST, e),
        Err(e @ ChatError::Busy) => error_response(StatusCode::CONFLICT, e),
    }
}

/// DELETE /chat/messages
pub async fn clear_messages(State(state): State<AppState>) -> StatusCode {
    state.chat.clear();
    StatusCode::NO_CONTENT
}

// ============================================================================
// Image lab
// ============================================================================

/// GET /images
/// Gallery, newest first
pub async fn list_images(State(state): State<AppState>) -> Json<Vec<GeneratedImage>> {
    Json(state.images.gallery())
}

/// POST /images
pub async fn generate_image(
    State(state): State<AppState>,
    Json(req): Json<GenerateImageRequest>,
) -> Response {
    if state.images.is_generating() {
        return error_response(StatusCode::CONFLICT, ImageError::Busy);
    }

    state.images.set_prompt(req.prompt);
    if let Some(ratio) = req.aspect_ratio {
        state.images.set_aspect_ratio(ratio);
    }

    match state.images.generate().await {
        Ok(Some(image)) => (
            StatusCode::CREATED,
            Json(GenerateImageResponse { image: Some(image) }),
        )
            .into_response(),
        Ok(None) => (StatusCode::OK, Json(GenerateImageResponse { image: None })).into_response(),
        Err(e @ ImageError::EmptyPrompt) => error_response(StatusCode::BAD_REQUEST, e),
        Err(e @ ImageError::Busy) => error_response(StatusCode::CONFLICT, e),
        Err(e @ ImageError::Remote { .. }) => error_response(StatusCode::BAD_GATEWAY, e),
        Err(e @ ImageError::Decode { .. }) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

// ============================================================================
// Live voice
// ============================================================================

/// POST /voice/start
pub async fn start_voice(State(state): State<AppState>) -> Response {
    let status = state.voice.status();
    if status != SessionStatus::Idle {
        warn!("Voice session start rejected: already {:?}", status);
        return error_response(
            StatusCode::CONFLICT,
            format!("Voice session is already {:?}", status).to_lowercase(),
        );
    }

    if let Err(e) = state.voice.start().await {
        error!("Failed to start voice session: {}", e);
        return error_response(voice_error_status(&e), e);
    }

    info!("Voice session started: {}", state.voice.session_id());
    (StatusCode::OK, Json(voice_status_response(&state))).into_response()
}

/// POST /voice/stop
pub async fn stop_voice(State(state): State<AppState>) -> Json<SessionStats> {
    state.voice.stop().await;
    Json(state.voice.stats())
}

/// GET /voice/status
pub async fn voice_status(State(state): State<AppState>) -> Json<VoiceStatusResponse> {
    Json(voice_status_response(&state))
}

/// GET /voice/transcript
/// Committed turns so far
pub async fn voice_transcript(State(state): State<AppState>) -> Json<Vec<TranscriptTurn>> {
    Json(state.voice.transcript())
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
