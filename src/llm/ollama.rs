//! Ollama-backed text generation.
//!
//! Uses the non-streaming `/api/generate` endpoint with temperature 0 so
//! extraction output stays as deterministic as the model allows.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{LlmError, TextGenerator};

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaGenerator {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl OllamaGenerator {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, LlmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("greenlens/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LlmError::ServiceUnreachable(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        })
    }
}

impl TextGenerator for OllamaGenerator {
    fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);

        let resp = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
                options: GenerateOptions { temperature: 0.0 },
            })
            .send()
            .map_err(|e| LlmError::ServiceUnreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LlmError::BadStatus(status.as_u16()));
        }

        let body: GenerateResponse = resp
            .json()
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        if body.response.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(body.response)
    }
}
