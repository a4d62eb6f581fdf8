//! HTTP embedding service client.
//!
//! Speaks a minimal JSON contract: `POST { model, input: [texts] }` returns
//! `{ embeddings: [[f32; dim]] }`. The service hosts the sentence-transformer
//! model; which one is opaque here, but the same endpoint and model name must
//! serve both the index build and query time or similarity is meaningless.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Embedder, EmbedderError, normalize};

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

pub struct RemoteEmbedder {
    endpoint: String,
    model: String,
    dimensions: usize,
    client: reqwest::blocking::Client,
}

impl RemoteEmbedder {
    pub fn new(
        endpoint: &str,
        model: &str,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self, EmbedderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("greenlens/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EmbedderError::ServiceUnreachable(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimensions,
            client,
        })
    }

    fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .map_err(|e| EmbedderError::ServiceUnreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EmbedderError::BadStatus(status.as_u16()));
        }

        let body: EmbedResponse = resp
            .json()
            .map_err(|e| EmbedderError::MalformedResponse(e.to_string()))?;

        if body.embeddings.len() != texts.len() {
            return Err(EmbedderError::MalformedResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.embeddings.len()
            )));
        }

        let mut vectors = body.embeddings;
        for vec in &mut vectors {
            if vec.len() != self.dimensions {
                return Err(EmbedderError::MalformedResponse(format!(
                    "expected dimension {}, got {}",
                    self.dimensions,
                    vec.len()
                )));
            }
            normalize(vec);
        }

        Ok(vectors)
    }
}

impl Embedder for RemoteEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut vectors = self.request(&[text])?;
        vectors
            .pop()
            .ok_or_else(|| EmbedderError::MalformedResponse("empty embeddings array".into()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
