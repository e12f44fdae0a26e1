//! Process-wide holder of the serving index.
//!
//! Readers take an `Arc` snapshot and query it without holding any lock.
//! A replacement is built entirely off to the side and then swapped in with
//! a single pointer store; queries already running keep their old snapshot.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use localrag_core::error::Result;
use localrag_core::types::{IndexEntry, ScoredChunk};

use crate::index::VectorIndex;

pub struct SharedIndex {
    current: RwLock<Arc<VectorIndex>>,
    publish_lock: Mutex<()>,
}

impl Default for SharedIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedIndex {
    pub fn new() -> Self {
        Self::with_index(VectorIndex::empty())
    }

    pub fn with_index(index: VectorIndex) -> Self {
        Self { current: RwLock::new(Arc::new(index)), publish_lock: Mutex::new(()) }
    }

    /// The index visible to new queries right now.
    pub fn snapshot(&self) -> Arc<VectorIndex> {
        Arc::clone(&self.current.read())
    }

    /// Construct a new index from `entries` and publish it. On error the
    /// current index is untouched.
    pub fn build(&self, version: impl Into<String>, dim: usize, entries: Vec<IndexEntry>) -> Result<Arc<VectorIndex>> {
        let next = VectorIndex::build(version, dim, entries)?;
        Ok(self.publish(next))
    }

    /// Swap in a fully constructed index; returns the one it replaced.
    pub fn publish(&self, next: VectorIndex) -> Arc<VectorIndex> {
        let _guard = self.publish_lock.lock();
        let next = Arc::new(next);
        let previous = std::mem::replace(&mut *self.current.write(), Arc::clone(&next));
        tracing::info!(
            version = next.version(),
            entries = next.len(),
            previous = previous.version(),
            "vector index published"
        );
        previous
    }

    pub fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        self.snapshot().query(embedding, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localrag_core::types::{chunk_id, Chunk, SourceMeta};

    fn entries(doc: &str, n: usize) -> Vec<IndexEntry> {
        (0..n)
            .map(|i| IndexEntry {
                chunk: Chunk { id: chunk_id(doc, i), doc_id: doc.to_string(), sequence: i, start: i, end: i + 1, text: doc.to_string() },
                embedding: vec![1.0, i as f32],
                meta: SourceMeta::default(),
            })
            .collect()
    }

    #[test]
    fn starts_empty() {
        let shared = SharedIndex::new();
        assert!(shared.snapshot().is_empty());
        assert!(shared.query(&[1.0, 0.0], 3).unwrap().is_empty());
    }

    #[test]
    fn failed_build_keeps_previous_index() {
        let shared = SharedIndex::new();
        shared.build("v1", 2, entries("old", 2)).unwrap();

        let mut bad = entries("new", 2);
        bad[1].embedding = vec![1.0];
        assert!(shared.build("v2", 2, bad).is_err());

        let snap = shared.snapshot();
        assert_eq!(snap.version(), "v1");
        assert_eq!(snap.len(), 2);
    }

    #[test]
    fn held_snapshot_survives_publish() {
        let shared = SharedIndex::new();
        shared.build("v1", 2, entries("old", 1)).unwrap();
        let held = shared.snapshot();
        let previous = shared.publish(VectorIndex::build("v2", 2, entries("new", 3)).unwrap());

        assert_eq!(previous.version(), "v1");
        assert_eq!(held.version(), "v1");
        assert_eq!(held.query(&[1.0, 0.0], 5).unwrap().len(), 1);
        assert_eq!(shared.snapshot().len(), 3);
    }
}
