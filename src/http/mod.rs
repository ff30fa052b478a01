//! HTTP API server for local control
//!
//! This module provides a REST API over the studio:
//! - GET/POST/DELETE /chat/messages - Grounded chat conversation
//! - GET/POST /images - Image lab gallery and generation
//! - POST /voice/start, POST /voice/stop - Live voice session control
//! - GET /voice/status, GET /voice/transcript - Voice session queries
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
