use std::sync::Arc;

use localrag_core::config::RetrievalConfig;
use localrag_core::error::Result;
use localrag_core::types::RetrievalResult;
use localrag_core::Embedder;
use localrag_vector::SharedIndex;

/// Embeds a question and returns the top-k chunks scoring at least
/// `min_relevance`, best first. An empty result is a normal outcome.
pub struct Retriever<E: Embedder> {
    embedder: Arc<E>,
    index: Arc<SharedIndex>,
    config: RetrievalConfig,
}

impl<E: Embedder> Retriever<E> {
    pub fn new(embedder: Arc<E>, index: Arc<SharedIndex>, config: RetrievalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { embedder, index, config })
    }

    pub fn config(&self) -> RetrievalConfig {
        self.config
    }

    pub fn retrieve(&self, question: &str) -> Result<RetrievalResult> {
        let snapshot = self.index.snapshot();
        if snapshot.is_empty() {
            tracing::warn!("retrieving against an empty index");
            return Ok(RetrievalResult::default());
        }
        let query = self.embedder.embed(question)?;
        let candidates = snapshot.query(&query, self.config.top_k)?;
        let total = candidates.len();
        let hits: Vec<_> = candidates.into_iter().filter(|h| h.score >= self.config.min_relevance).collect();
        tracing::debug!(
            index = snapshot.version(),
            candidates = total,
            kept = hits.len(),
            top_score = hits.first().map(|h| h.score),
            "retrieval"
        );
        Ok(RetrievalResult { hits })
    }
}
