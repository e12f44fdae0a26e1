//! Domain types shared by the chunker, vector index, retriever and pipeline.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;
pub type Embedding = Vec<f32>;

/// Build the identifier of the `sequence`-th chunk of `doc_id`.
pub fn chunk_id(doc_id: &str, sequence: usize) -> ChunkId {
    format!("{}:{}", doc_id, sequence)
}

/// Optional provenance of a source document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMeta {
    pub title: Option<String>,
    pub path: Option<String>,
}

/// A plain-text source document with a stable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub meta: SourceMeta,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), meta: SourceMeta::default() }
    }

    pub fn with_meta(mut self, meta: SourceMeta) -> Self {
        self.meta = meta;
        self
    }
}

/// A contiguous span of a document's text, the unit of retrieval.
///
/// - `id`: `"{doc_id}:{sequence}"`, unique across the corpus
/// - `sequence`: position of the chunk within its document
/// - `start`/`end`: character (not byte) offsets into the parent text, end exclusive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub sequence: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// What the vector index stores per chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Embedding,
    pub meta: SourceMeta,
}

/// One retrieval candidate. Higher `score` is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
    pub meta: SourceMeta,
}

/// Ranked retrieval candidates, best first. May be empty, which means no
/// sufficiently relevant context exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn ids(&self) -> Vec<ChunkId> {
        self.hits.iter().map(|h| h.chunk.id.clone()).collect()
    }
}

/// The text handed to the completion service.
///
/// `included` lists the chunks whose text is in `text`, in ranked order;
/// `dropped` lists the lower-ranked chunks removed to respect the size limit.
/// A prompt is `grounded` only when at least one chunk made it in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub text: String,
    pub grounded: bool,
    pub included: Vec<ChunkId>,
    pub dropped: Vec<ChunkId>,
}

impl Prompt {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Provenance of one cited chunk, returned next to the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub chunk_id: ChunkId,
    pub doc_id: String,
    pub title: Option<String>,
    pub path: Option<String>,
    pub start: usize,
    pub end: usize,
    pub score: f32,
    pub text: String,
}

impl Source {
    pub fn from_hit(hit: &ScoredChunk) -> Self {
        Self {
            chunk_id: hit.chunk.id.clone(),
            doc_id: hit.chunk.doc_id.clone(),
            title: hit.meta.title.clone(),
            path: hit.meta.path.clone(),
            start: hit.chunk.start,
            end: hit.chunk.end,
            score: hit.score,
            text: hit.chunk.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    pub citations: Vec<ChunkId>,
    pub sources: Vec<Source>,
    pub grounded: bool,
}
