use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::aspect::AspectRatio;
use crate::error::ImageError;
use crate::genai::types::{Content, GenerateContentRequest, GenerationConfig, ImageConfig, Part};
use crate::genai::ContentGenerator;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub id: String,
    /// `data:<mime>;base64,<payload>`
    pub url: String,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub timestamp: DateTime<Utc>,
}

impl GeneratedImage {
    /// Raw image bytes behind the data URI
    pub fn decode_bytes(&self) -> Result<Vec<u8>, ImageError> {
        let payload = self
            .url
            .split_once(";base64,")
            .map(|(_, data)| data)
            .unwrap_or(&self.url);
        STANDARD.decode(payload).map_err(|e| ImageError::Decode {
            message: e.to_string(),
        })
    }

    pub fn download_name(&self) -> String {
        download_name(&self.id)
    }
}

pub fn download_name(id: &str) -> String {
    format!("gemini-gen-{}.png", id)
}

#[derive(Default)]
struct LabState {
    prompt: String,
    aspect_ratio: AspectRatio,
    gallery: Vec<GeneratedImage>,
    generating: bool,
}

struct GeneratingGuard<'a>(&'a Mutex<LabState>);

impl Drop for GeneratingGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().generating = false;
    }
}

/// Prompt, aspect ratio and a newest-first gallery
pub struct ImageLab {
    generator: Arc<dyn ContentGenerator>,
    model: String,
    state: Mutex<LabState>,
}

impl ImageLab {
    pub fn new(generator: Arc<dyn ContentGenerator>, model: impl Into<String>) -> Self {
        Self {
            generator,
            model: model.into(),
            state: Mutex::new(LabState::default()),
        }
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) {
        self.state.lock().prompt = prompt.into();
    }

    pub fn prompt(&self) -> String {
        self.state.lock().prompt.clone()
    }

    pub fn set_aspect_ratio(&self, ratio: AspectRatio) {
        self.state.lock().aspect_ratio = ratio;
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.state.lock().aspect_ratio
    }

    pub fn gallery(&self) -> Vec<GeneratedImage> {
        self.state.lock().gallery.clone()
    }

    pub fn is_generating(&self) -> bool {
        self.state.lock().generating
    }

    /// Generate from the current prompt and aspect ratio.
    ///
    /// `Ok(None)` means the model answered without an image: nothing is
    /// added and the prompt is kept. The prompt is cleared only on success.
    pub async fn generate(&self) -> Result<Option<GeneratedImage>, ImageError> {
        let (prompt, aspect_ratio) = {
            let mut state = self.state.lock();
            if state.prompt.trim().is_empty() {
                return Err(ImageError::EmptyPrompt);
            }
            if state.generating {
                return Err(ImageError::Busy);
            }
            state.generating = true;
            (state.prompt.clone(), state.aspect_ratio)
        };
        let _generating = GeneratingGuard(&self.state);

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: None,
                parts: vec![Part::text(prompt.clone())],
            }],
            tools: Vec::new(),
            generation_config: Some(GenerationConfig {
                image_config: Some(ImageConfig {
                    aspect_ratio: aspect_ratio.to_string(),
                }),
            }),
        };

        let response = self
            .generator
            .generate(&self.model, request)
            .await
            .map_err(|e| {
                error!("Image generation error: {}", e);
                ImageError::Remote {
                    message: e.to_string(),
                }
            })?;

        let Some(inline) = response.first_inline_data().filter(|d| !d.data.is_empty()) else {
            info!("Image model returned no image for prompt");
            return Ok(None);
        };

        let mime_type = if inline.mime_type.is_empty() {
            "image/png"
        } else {
            inline.mime_type.as_str()
        };

        let image = GeneratedImage {
            id: uuid::Uuid::new_v4().to_string(),
            url: format!("data:{};base64,{}", mime_type, inline.data),
            prompt,
            aspect_ratio,
            timestamp: Utc::now(),
        };

        {
            let mut state = self.state.lock();
            state.gallery.insert(0, image.clone());
            state.prompt.clear();
        }

        info!("Generated image {} ({})", image.id, aspect_ratio);
        Ok(Some(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_name() {
        assert_eq!(download_name("abc"), "gemini-gen-abc.png");
    }

    fn image_with_url(url: String) -> GeneratedImage {
        GeneratedImage {
            id: "1".to_string(),
            url,
            prompt: "p".to_string(),
            aspect_ratio: AspectRatio::Square,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_decode_bytes() {
        let url = format!("data:image/png;base64,{}", STANDARD.encode(b"\x89PNG"));
        let image = image_with_url(url);
        assert_eq!(image.decode_bytes().unwrap(), b"\x89PNG".to_vec());
        assert_eq!(image.download_name(), "gemini-gen-1.png");
    }

    #[test]
    fn test_decode_bytes_rejects_bad_payload() {
        let image = image_with_url("data:image/png;base64,@@@".to_string());
        assert!(matches!(image.decode_bytes(), Err(ImageError::Decode { .. })));
    }
}
