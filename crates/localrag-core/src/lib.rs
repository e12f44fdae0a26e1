pub mod chunker;
pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use chunker::{Chunker, ChunkingConfig};
pub use error::{EmbedError, Error, Result};
pub use traits::{Embedder, GenerationClient};
pub use types::{AnswerResult, Chunk, ChunkId, Document, Embedding, IndexEntry, Prompt, RetrievalResult, ScoredChunk, Source, SourceMeta};
