//! Embedding backends, chosen by `embedding.backend` in the configuration.

mod device;
mod hashing;
mod model;
mod ollama;
mod pool;

pub use hashing::HashingEmbedder;
pub use model::{resolve_model_dir, EmbeddingModel};
pub use ollama::OllamaEmbedder;
pub use pool::masked_mean_l2;

use localrag_core::config::{EmbeddingBackendKind, EmbeddingConfig};
use localrag_core::{EmbedError, Embedder, Embedding};

pub enum EmbeddingBackend {
    Local(Box<EmbeddingModel>),
    Ollama(OllamaEmbedder),
    Hashing(HashingEmbedder),
}

impl EmbeddingBackend {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbedError> {
        let backend = match config.backend {
            EmbeddingBackendKind::Local => {
                let dir = resolve_model_dir(config.model_dir.as_deref())
                    .map_err(|e| EmbedError::BackendUnavailable(e.to_string()))?;
                let model = EmbeddingModel::load(&dir, &config.model, config.dimension)
                    .map_err(|e| EmbedError::BackendUnavailable(format!("cannot load model: {}", e)))?;
                Self::Local(Box::new(model))
            }
            EmbeddingBackendKind::Ollama => Self::Ollama(OllamaEmbedder::new(config)?),
            EmbeddingBackendKind::Hashing => Self::Hashing(HashingEmbedder::new(config.dimension)),
        };
        tracing::info!(embedder = backend.embedder_id(), "embedding backend ready");
        Ok(backend)
    }
}

macro_rules! each_backend {
    ($self:ident, $e:ident => $body:expr) => {
        match $self {
            EmbeddingBackend::Local($e) => $body,
            EmbeddingBackend::Ollama($e) => $body,
            EmbeddingBackend::Hashing($e) => $body,
        }
    };
}

impl Embedder for EmbeddingBackend {
    fn embedder_id(&self) -> &str {
        each_backend!(self, e => e.embedder_id())
    }

    fn dim(&self) -> usize {
        each_backend!(self, e => e.dim())
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbedError> {
        each_backend!(self, e => e.embed(text))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbedError> {
        each_backend!(self, e => e.embed_batch(texts))
    }
}
