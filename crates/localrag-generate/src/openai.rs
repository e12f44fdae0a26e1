//! OpenAI-compatible chat completions client (`POST /v1/chat/completions`).

use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::Deserialize;

use localrag_core::config::GenerationConfig;
use localrag_core::error::{Error, Result};
use localrag_core::{GenerationClient, Prompt};

pub struct OpenAiGenerator {
    client: Client,
    url: String,
    model: String,
    temperature: f32,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiGenerator {
    /// The API key is read from the env var named by `api_key_env`, if any.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = match &config.api_key_env {
            Some(var) => Some(std::env::var(var).map_err(|_| {
                Error::InvalidConfig(format!("generation.api_key_env names {} but it is not set", var))
            })?),
            None => None,
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::GenerationFailed(format!("cannot create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: format!("{}/v1/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
        })
    }

    fn build_request_body(&self, prompt: &Prompt) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "stream": false,
            "messages": [{ "role": "user", "content": prompt.text }],
        })
    }
}

impl GenerationClient for OpenAiGenerator {
    fn generate(&self, prompt: &Prompt) -> Result<String> {
        let start = Instant::now();
        let mut request = self.client.post(&self.url).json(&self.build_request_body(prompt));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .map_err(|e| Error::GenerationFailed(format!("chat completion request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::GenerationFailed(format!("chat completion failed: HTTP {} {}", status, body.trim())));
        }
        let parsed: ChatResponse = response
            .json()
            .map_err(|e| Error::GenerationFailed(format!("cannot parse chat completion: {}", e)))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::GenerationFailed("chat completion has no content".to_string()))?;
        tracing::debug!(model = %self.model, ms = start.elapsed().as_millis() as u64, "chat completion finished");
        Ok(content)
    }
}
