pub mod audio;
pub mod chat;
pub mod config;
pub mod error;
pub mod genai;
pub mod http;
pub mod image;
pub mod live;
pub mod playback;
pub mod session;

pub use audio::{
    AmplitudeMeter, AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFile, AudioFrame,
    AudioSource, CapturePipeline, FileBackend,
};
pub use chat::{ChatMessage, ChatSession, GroundingSource};
pub use config::Config;
pub use error::{ChatError, GenAiError, ImageError, VoiceError, VoiceResult};
pub use genai::{ContentGenerator, GenAiClient};
pub use http::{create_router, AppState};
pub use image::{AspectRatio, GeneratedImage, ImageLab};
pub use live::{
    AudioChunk, EncodedAudioPayload, GeminiLiveConnector, InboundEvent, LiveConfig, LiveConnector,
    LiveSender, LiveSession, MemoryConnector,
};
pub use playback::{OutputDevice, PlaybackScheduler, VirtualOutput};
pub use session::{
    DeviceProvider, Role, SessionStats, SessionStatus, SystemDevices, TranscriptTurn,
    VoiceSession, VoiceSessionConfig,
};
