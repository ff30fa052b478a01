//! Error types for the studio.

use thiserror::Error;

/// Failures of the live voice pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VoiceError {
    /// Could not open (or write to) the remote voice session.
    #[error("Live session connection failed: {message}")]
    Connection { message: String },

    /// The remote session reported a failure mid-stream.
    #[error("Live session failed: {message}")]
    Remote { message: String },

    /// An inbound audio payload could not be decoded.
    #[error("Audio decode failed: {message}")]
    Decode { message: String },

    /// Microphone or output device unavailable.
    #[error("Audio device unavailable: {message}")]
    Device { message: String },

    #[error("Invalid voice configuration: {message}")]
    Config { message: String },
}

impl VoiceError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into() }
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote { message: message.into() }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode { message: message.into() }
    }

    pub fn device(message: impl Into<String>) -> Self {
        Self::Device { message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }
}

/// Failures of the request/response generative calls.
#[derive(Error, Debug)]
pub enum GenAiError {
    #[error("No API key configured (set api.key, GEMINI_API_KEY or API_KEY)")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {message}")]
    Decode { message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("A chat request is already in flight")]
    Busy,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("Prompt is empty")]
    EmptyPrompt,

    #[error("An image is already being generated")]
    Busy,

    #[error("Image generation failed: {message}")]
    Remote { message: String },

    /// A stored image's data URI could not be turned back into bytes.
    #[error("Image data is unreadable: {message}")]
    Decode { message: String },
}

pub type VoiceResult<T> = std::result::Result<T, VoiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_error_display() {
        assert_eq!(
            VoiceError::connection("handshake refused").to_string(),
            "Live session connection failed: handshake refused"
        );
        assert_eq!(
            VoiceError::decode("odd byte count").to_string(),
            "Audio decode failed: odd byte count"
        );
        assert_eq!(
            VoiceError::device("no microphone").to_string(),
            "Audio device unavailable: no microphone"
        );
    }

    #[test]
    fn test_status_error_display() {
        let error = GenAiError::Status {
            status: 429,
            body: "quota".to_string(),
        };
        assert_eq!(error.to_string(), "Remote returned 429: quota");
    }

    #[test]
    fn test_chat_and_image_errors() {
        assert_eq!(ChatError::EmptyMessage.to_string(), "Message is empty");
        assert_eq!(ImageError::EmptyPrompt.to_string(), "Prompt is empty");
        assert_eq!(
            VoiceError::config("no key").to_string(),
            "Invalid voice configuration: no key"
        );
    }
}
