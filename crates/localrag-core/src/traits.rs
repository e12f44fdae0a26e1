use crate::error::{EmbedError, Result};
use crate::types::{Embedding, Prompt};

/// Maps text to a fixed-dimension vector.
///
/// For a fixed backend and model version the same text must always produce
/// the same vector. Implementations never retry.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the backend/model (e.g. `ollama:nomic-embed-text:d768`).
    fn embedder_id(&self) -> &str;
    /// Embedding dimensionality (D).
    fn dim(&self) -> usize;
    fn embed(&self, text: &str) -> std::result::Result<Embedding, EmbedError>;
    /// Order-preserving, one vector per input.
    fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Embedding>, EmbedError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Blocking call to an external completion service.
pub trait GenerationClient: Send + Sync {
    fn generate(&self, prompt: &Prompt) -> Result<String>;
}
