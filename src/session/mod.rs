//! Voice session management
//!
//! This module provides the `VoiceSession` controller that manages:
//! - Capture from microphone or file into the live channel
//! - Playback of assistant audio through the scheduler
//! - Transcript aggregation into committed turns
//! - Session statistics and lifecycle state

mod config;
mod devices;
mod session;
mod stats;
mod transcript;

pub use config::VoiceSessionConfig;
pub use devices::{DeviceProvider, SystemDevices};
pub use session::{SessionStatus, VoiceSession, VoiceSessionState};
pub use stats::SessionStats;
pub use transcript::{Role, TranscriptAggregator, TranscriptTurn};
