use std::sync::Arc;

use crate::chat::ChatSession;
use crate::config::Config;
use crate::genai::{ContentGenerator, GenAiClient};
use crate::image::ImageLab;
use crate::session::VoiceSession;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatSession>,
    pub images: Arc<ImageLab>,
    pub voice: VoiceSession,
}

impl AppState {
    pub fn new(chat: Arc<ChatSession>, images: Arc<ImageLab>, voice: VoiceSession) -> Self {
        Self { chat, images, voice }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let generator: Arc<dyn ContentGenerator> = Arc::new(GenAiClient::from_config(cfg));

        Self::new(
            Arc::new(ChatSession::new(Arc::clone(&generator), cfg.models.chat.clone())),
            Arc::new(ImageLab::new(generator, cfg.models.image.clone())),
            VoiceSession::from_config(cfg),
        )
    }
}
