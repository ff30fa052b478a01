use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Chat
        .route(
            "/chat/messages",
            get(handlers::list_messages)
                .post(handlers::send_message)
                .delete(handlers::clear_messages),
        )
        // Image lab
        .route(
            "/images",
            get(handlers::list_images).post(handlers::generate_image),
        )
        // Live voice
        .route("/voice/start", post(handlers::start_voice))
        .route("/voice/stop", post(handlers::stop_voice))
        .route("/voice/status", get(handlers::voice_status))
        .route("/voice/transcript", get(handlers::voice_transcript))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        // Browser front-ends are served from another origin
        .layer(CorsLayer::permissive())
        .with_state(state)
}
