use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info};

use super::message::{ChatMessage, GroundingSource};
use crate::error::ChatError;
use crate::genai::types::{Content, GenerateContentRequest, GenerateContentResponse, Part, Tool};
use crate::genai::ContentGenerator;
use crate::session::Role;

pub const EMPTY_REPLY: &str = "I couldn't process that.";
pub const ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Default)]
struct ChatState {
    messages: Vec<ChatMessage>,
    loading: bool,
}

/// Clears the in-flight flag however `send` exits
struct LoadingGuard<'a>(&'a Mutex<ChatState>);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().loading = false;
    }
}

/// Search-grounded chat conversation
pub struct ChatSession {
    generator: Arc<dyn ContentGenerator>,
    model: String,
    state: Mutex<ChatState>,
}

impl ChatSession {
    pub fn new(generator: Arc<dyn ContentGenerator>, model: impl Into<String>) -> Self {
        Self {
            generator,
            model: model.into(),
            state: Mutex::new(ChatState::default()),
        }
    }

    /// Send `text` with the whole conversation so far and append the reply.
    ///
    /// Remote failures do not surface as errors: the reply is an apology
    /// message and the failure is logged.
    pub async fn send(&self, text: &str) -> Result<ChatMessage, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let contents = {
            let mut state = self.state.lock();
            if state.loading {
                return Err(ChatError::Busy);
            }
            state.loading = true;
            state.messages.push(ChatMessage::new(Role::User, text));
            state.messages.iter().map(to_content).collect()
        };
        let _loading = LoadingGuard(&self.state);

        let request = GenerateContentRequest {
            contents,
            tools: vec![Tool::google_search()],
            generation_config: None,
        };

        let reply = match self.generator.generate(&self.model, request).await {
            Ok(response) => reply_from_response(&response),
            Err(e) => {
                error!("Chat error: {}", e);
                ChatMessage::new(Role::Model, ERROR_REPLY)
            }
        };

        info!(
            "Chat reply: {} chars, {} source(s)",
            reply.content.len(),
            reply.grounding_urls.as_ref().map(Vec::len).unwrap_or(0)
        );

        self.state.lock().messages.push(reply.clone());
        Ok(reply)
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().messages.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    pub fn clear(&self) {
        self.state.lock().messages.clear();
    }
}

fn to_content(message: &ChatMessage) -> Content {
    let role = match message.role {
        Role::User => "user",
        Role::Model => "model",
    };
    Content {
        role: Some(role.to_string()),
        parts: vec![Part::text(message.content.clone())],
    }
}

fn reply_from_response(response: &GenerateContentResponse) -> ChatMessage {
    let text = response.text();
    let mut reply = ChatMessage::new(
        Role::Model,
        if text.is_empty() { EMPTY_REPLY.to_string() } else { text },
    );

    let sources: Vec<GroundingSource> = response
        .grounding_chunks()
        .iter()
        .filter_map(|chunk| chunk.web.as_ref())
        .map(|web| GroundingSource {
            title: web.title.clone().unwrap_or_else(|| "Source".to_string()),
            uri: web.uri.clone().unwrap_or_default(),
        })
        .collect();

    reply.grounding_urls = (!sources.is_empty()).then_some(sources);
    reply
}
