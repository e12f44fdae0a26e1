//! Completion backends, chosen by `generation.backend` in the configuration.
//! None of them retry; every failure surfaces as `Error::GenerationFailed`.

mod ollama;
mod openai;

pub use ollama::OllamaGenerator;
pub use openai::OpenAiGenerator;

use localrag_core::config::{GenerationBackendKind, GenerationConfig};
use localrag_core::error::Result;
use localrag_core::{GenerationClient, Prompt};

pub enum GenerationBackend {
    Ollama(OllamaGenerator),
    OpenAi(OpenAiGenerator),
}

impl GenerationBackend {
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let backend = match config.backend {
            GenerationBackendKind::Ollama => Self::Ollama(OllamaGenerator::new(config)?),
            GenerationBackendKind::OpenAi => Self::OpenAi(OpenAiGenerator::new(config)?),
        };
        tracing::info!(backend = ?config.backend, model = %config.model, "generation backend ready");
        Ok(backend)
    }
}

impl GenerationClient for GenerationBackend {
    fn generate(&self, prompt: &Prompt) -> Result<String> {
        match self {
            Self::Ollama(g) => g.generate(prompt),
            Self::OpenAi(g) => g.generate(prompt),
        }
    }
}
