//! Request/response generative calls shared by chat and the image lab.

pub mod client;
pub mod types;

pub use client::{ContentGenerator, GenAiClient};
pub use types::{GenerateContentRequest, GenerateContentResponse};
