//! Live bidirectional voice channel
//!
//! - `channel`: transport-neutral session handles and the connector trait
//! - `gemini`: websocket transport
//! - `memory`: in-process transport
//! - `messages`: wire format
//! - `events`: what the rest of the pipeline consumes

pub mod channel;
pub mod events;
pub mod gemini;
pub mod memory;
pub mod messages;

pub use channel::{LiveConfig, LiveConnector, LiveSender, LiveSession};
pub use events::{AudioChunk, EncodedAudioPayload, InboundEvent};
pub use gemini::GeminiLiveConnector;
pub use memory::{MemoryConnector, RemoteEnd};
