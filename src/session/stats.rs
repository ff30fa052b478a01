use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::SessionStatus;

/// Statistics about a voice session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    pub status: SessionStatus,

    /// When the current session became active
    pub started_at: Option<DateTime<Utc>>,

    /// Seconds since `started_at`, zero when idle
    pub duration_secs: f64,

    /// Outbound frames handed to the channel
    pub frames_sent: u64,

    pub audio_chunks_received: u64,

    /// Received chunks that playback rejected (empty or partial PCM frames).
    /// Payloads whose base64 is invalid never become chunks and are not
    /// counted here or in `audio_chunks_received`.
    pub chunks_dropped: u64,

    pub interruptions: u64,

    /// Committed turn boundaries
    pub turns: u64,
}
