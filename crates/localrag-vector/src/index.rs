//! Exact nearest-neighbour index over chunk embeddings.
//!
//! A `VectorIndex` is immutable once built. Queries compute cosine similarity
//! against every entry (linear scan); ties keep insertion order.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use localrag_core::error::{Error, Result};
use localrag_core::types::{IndexEntry, ScoredChunk};

#[derive(Debug)]
pub struct VectorIndex {
    version: String,
    /// `embedder_id` of the model that produced every stored vector.
    embedder_id: String,
    dim: usize,
    entries: Vec<IndexEntry>,
    norms: Vec<f32>,
    /// Entries skipped at query time because their score was undefined.
    faults: AtomicU64,
}

impl VectorIndex {
    /// The index served before anything has been built or loaded.
    pub fn empty() -> Self {
        Self { version: String::new(), embedder_id: String::new(), dim: 0, entries: Vec::new(), norms: Vec::new(), faults: AtomicU64::new(0) }
    }

    /// Every entry's embedding must have exactly `dim` components.
    pub fn build(version: impl Into<String>, dim: usize, entries: Vec<IndexEntry>) -> Result<Self> {
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != dim) {
            return Err(Error::DimensionMismatch { expected: dim, actual: bad.embedding.len() });
        }
        let norms = entries.iter().map(|e| l2_norm(&e.embedding)).collect();
        Ok(Self { version: version.into(), embedder_id: String::new(), dim, entries, norms, faults: AtomicU64::new(0) })
    }

    /// Record which embedder produced the vectors.
    pub fn with_embedder(mut self, embedder_id: impl Into<String>) -> Self {
        self.embedder_id = embedder_id.into();
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn embedder_id(&self) -> &str {
        &self.embedder_id
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Number of undefined-score entries excluded by queries so far.
    pub fn fault_count(&self) -> u64 {
        self.faults.load(AtomicOrdering::Relaxed)
    }

    /// Up to `k` entries, best first, by cosine similarity to `embedding`.
    pub fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if embedding.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: embedding.len() });
        }
        let query_norm = l2_norm(embedding);
        if !query_norm.is_finite() || query_norm == 0.0 {
            tracing::debug!(norm = query_norm, "query vector has no direction; nothing is similar");
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = Vec::with_capacity(self.entries.len());
        let mut faults = 0u64;
        for (i, entry) in self.entries.iter().enumerate() {
            let score = dot(embedding, &entry.embedding) / (query_norm * self.norms[i]);
            if score.is_nan() || score.is_infinite() {
                faults += 1;
                tracing::warn!(chunk = %entry.chunk.id, "undefined similarity score, entry excluded");
                continue;
            }
            scored.push((i, score.clamp(-1.0, 1.0)));
        }
        if faults > 0 {
            self.faults.fetch_add(faults, AtomicOrdering::Relaxed);
        }

        // Stable sort: equal scores stay in insertion order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| {
                let entry = &self.entries[i];
                ScoredChunk { chunk: entry.chunk.clone(), score, meta: entry.meta.clone() }
            })
            .collect())
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn l2_norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}
