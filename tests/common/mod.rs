// Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use genai_studio::audio::{AudioBackend, AudioBackendConfig, FileBackend};
use genai_studio::genai::types::{GenerateContentRequest, GenerateContentResponse};
use genai_studio::playback::{OutputDevice, VirtualOutput};
use genai_studio::session::{DeviceProvider, VoiceSessionConfig};
use genai_studio::{ContentGenerator, GenAiError, VoiceError, VoiceResult};
use parking_lot::Mutex;
use serde_json::Value;

/// Scripted `ContentGenerator`: answers from a queue, records every request.
#[derive(Default)]
pub struct MockGenerator {
    replies: Mutex<VecDeque<Result<Value, u16>>>,
    requests: Mutex<Vec<(String, Value)>>,
    delay: Option<Duration>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Queue a JSON body as the next response
    pub fn reply(&self, body: Value) -> &Self {
        self.replies.lock().push_back(Ok(body));
        self
    }

    /// Queue an HTTP failure as the next response
    pub fn fail(&self, status: u16) -> &Self {
        self.replies.lock().push_back(Err(status));
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> Option<(String, Value)> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl ContentGenerator for MockGenerator {
    async fn generate(
        &self,
        model: &str,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenAiError> {
        let body = serde_json::to_value(&request).map_err(|e| GenAiError::Decode {
            message: e.to_string(),
        })?;
        self.requests.lock().push((model.to_string(), body));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.replies.lock().pop_front();
        match reply {
            Some(Ok(body)) => serde_json::from_value(body).map_err(|e| GenAiError::Decode {
                message: e.to_string(),
            }),
            Some(Err(status)) => Err(GenAiError::Status {
                status,
                body: "scripted failure".to_string(),
            }),
            None => Ok(GenerateContentResponse::default()),
        }
    }
}

pub fn text_response(text: &str) -> Value {
    serde_json::json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
    })
}

/// File-backed capture of fixed samples and a manually clocked output.
pub struct TestDevices {
    samples: Vec<f32>,
    pub fail_input: bool,
    pub fail_output: bool,
    outputs: Mutex<Vec<Arc<VirtualOutput>>>,
    inputs_opened: AtomicUsize,
}

impl TestDevices {
    pub fn new(samples: Vec<f32>) -> Self {
        Self {
            samples,
            fail_input: false,
            fail_output: false,
            outputs: Mutex::new(Vec::new()),
            inputs_opened: AtomicUsize::new(0),
        }
    }

    /// Output opened by the most recent session
    pub fn last_output(&self) -> Option<Arc<VirtualOutput>> {
        self.outputs.lock().last().cloned()
    }

    pub fn inputs_opened(&self) -> usize {
        self.inputs_opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceProvider for TestDevices {
    fn open_input(&self, config: &VoiceSessionConfig) -> VoiceResult<Box<dyn AudioBackend>> {
        if self.fail_input {
            return Err(VoiceError::device("no microphone"));
        }
        self.inputs_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FileBackend::from_samples(
            "test-input",
            self.samples.clone(),
            AudioBackendConfig {
                target_sample_rate: config.input_sample_rate,
                buffer_duration_ms: config.buffer_duration_ms,
                realtime: false,
            },
        )))
    }

    async fn open_output(&self, config: &VoiceSessionConfig) -> VoiceResult<Arc<dyn OutputDevice>> {
        if self.fail_output {
            return Err(VoiceError::device("no speakers"));
        }
        let output = Arc::new(VirtualOutput::manual(config.output_sample_rate));
        self.outputs.lock().push(Arc::clone(&output));
        Ok(output)
    }
}

/// Poll `condition` until it holds or a second passes.
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// PCM16 silence lasting `seconds` at `rate`
pub fn pcm_silence(seconds: f64, rate: u32) -> Vec<u8> {
    vec![0u8; (seconds * rate as f64) as usize * 2]
}
