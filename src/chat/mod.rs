//! Text chat with web-search grounding.

mod message;
mod session;

pub use message::{ChatMessage, GroundingSource};
pub use session::{ChatSession, EMPTY_REPLY, ERROR_REPLY};
