//! Ollama embedding service client (`POST /api/embeddings`).

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use localrag_core::config::EmbeddingConfig;
use localrag_core::{EmbedError, Embedder, Embedding};

pub struct OllamaEmbedder {
    client: Client,
    url: String,
    model: String,
    dim: usize,
    id: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbedError::BackendUnavailable(format!("cannot create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: format!("{}/api/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            dim: config.dimension,
            id: format!("ollama:{}:d{}", config.model, config.dimension),
        })
    }
}

impl Embedder for OllamaEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbedError> {
        if text.is_empty() {
            return Err(EmbedError::EmptyInput);
        }
        let response = self
            .client
            .post(&self.url)
            .json(&EmbedRequest { model: &self.model, prompt: text })
            .send()
            .map_err(|e| EmbedError::BackendUnavailable(format!("embedding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(EmbedError::BackendUnavailable(format!("embedding failed: HTTP {} {}", status, body.trim())));
        }

        let parsed: EmbedResponse = response
            .json()
            .map_err(|e| EmbedError::MalformedResponse(format!("cannot parse embedding response: {}", e)))?;
        if parsed.embedding.is_empty() {
            return Err(EmbedError::MalformedResponse("empty embedding".to_string()));
        }
        if parsed.embedding.len() != self.dim {
            return Err(EmbedError::MalformedResponse(format!(
                "model {} returned {} dims, expected {}",
                self.model,
                parsed.embedding.len(),
                self.dim
            )));
        }
        Ok(parsed.embedding)
    }
}
