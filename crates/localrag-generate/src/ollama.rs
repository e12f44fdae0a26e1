//! Ollama completion client (`POST /api/generate`, non-streaming).

use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use localrag_core::config::GenerationConfig;
use localrag_core::error::{Error, Result};
use localrag_core::{GenerationClient, Prompt};

pub struct OllamaGenerator {
    client: Client,
    url: String,
    model: String,
    temperature: f32,
}

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

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::GenerationFailed(format!("cannot create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: format!("{}/api/generate", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

impl GenerationClient for OllamaGenerator {
    fn generate(&self, prompt: &Prompt) -> Result<String> {
        let start = Instant::now();
        let request = GenerateRequest {
            model: &self.model,
            prompt: &prompt.text,
            stream: false,
            options: GenerateOptions { temperature: self.temperature },
        };
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .map_err(|e| Error::GenerationFailed(format!("generate request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::GenerationFailed(format!("generate failed: HTTP {} {}", status, body.trim())));
        }
        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| Error::GenerationFailed(format!("cannot parse generate response: {}", e)))?;
        tracing::debug!(model = %self.model, ms = start.elapsed().as_millis() as u64, "ollama generation finished");
        Ok(parsed.response)
    }
}
