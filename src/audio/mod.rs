pub mod backend;
pub mod capture;
pub mod codec;
pub mod file;

#[cfg(feature = "audio-io")]
pub mod microphone;

pub use backend::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource};
pub use capture::{AmplitudeMeter, CapturePipeline};
pub use file::{AudioFile, FileBackend};
