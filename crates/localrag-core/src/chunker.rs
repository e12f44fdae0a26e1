//! Fixed-window character chunker.
//!
//! A window of `chunk_size` characters slides over the text, advancing by
//! `chunk_size - overlap`. Every window except the last is full-size; the
//! last one stops at the end of the text and is never padded.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{chunk_id, Chunk, Document};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Max characters per chunk.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 3000, overlap: 500 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.overlap == 0 {
            return Err(Error::InvalidConfig(format!(
                "chunk_size ({}) and overlap ({}) must both be positive",
                self.chunk_size, self.overlap
            )));
        }
        if self.overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    pub fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        if document.id.is_empty() {
            return Err(Error::Chunking { doc_id: String::new(), reason: "document id is empty".to_string() });
        }
        if document.text.is_empty() {
            return Err(Error::Chunking { doc_id: document.id.clone(), reason: "document text is empty".to_string() });
        }

        // Byte offset of every char boundary, plus the end of the string.
        let text = document.text.as_str();
        let boundaries: Vec<usize> = text.char_indices().map(|(b, _)| b).chain(std::iter::once(text.len())).collect();
        let total = boundaries.len() - 1;

        let mut chunks = Vec::with_capacity(total / self.config.stride() + 1);
        let mut start = 0usize;
        loop {
            let end = (start + self.config.chunk_size).min(total);
            let sequence = chunks.len();
            chunks.push(Chunk {
                id: chunk_id(&document.id, sequence),
                doc_id: document.id.clone(),
                sequence,
                start,
                end,
                text: text[boundaries[start]..boundaries[end]].to_string(),
            });
            if end == total {
                break;
            }
            start += self.config.stride();
        }
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize, overlap: usize) -> Chunker {
        Chunker::new(ChunkingConfig { chunk_size: size, overlap }).expect("valid config")
    }

    #[test]
    fn short_document_is_one_chunk() {
        let doc = Document::new("policy", "Returns are accepted within 30 days of purchase.");
        let chunks = chunker(100, 10).chunk(&doc).expect("chunk");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, doc.text);
        assert_eq!(chunks[0].id, "policy:0");
        assert_eq!((chunks[0].start, chunks[0].end), (0, doc.text.chars().count()));
    }

    #[test]
    fn windows_advance_by_stride_and_last_is_truncated() {
        let doc = Document::new("d", "abcdefghij");
        let chunks = chunker(4, 1).chunk(&doc).expect("chunk");
        let spans: Vec<(usize, usize)> = chunks.iter().map(|c| (c.start, c.end)).collect();
        assert_eq!(spans, vec![(0, 4), (3, 7), (6, 10)]);
        assert_eq!(chunks[2].text, "ghij");

        let doc = Document::new("d", "abcdefghijk");
        let chunks = chunker(4, 1).chunk(&doc).expect("chunk");
        assert_eq!(chunks.last().map(|c| c.text.as_str()), Some("jk"));
    }

    #[test]
    fn exact_fit_produces_no_trailing_window() {
        let doc = Document::new("d", "abcdefgh");
        let chunks = chunker(8, 2).chunk(&doc).expect("chunk");
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn offsets_count_characters_not_bytes() {
        let doc = Document::new("d", "héllo wörld ✓");
        let chunks = chunker(5, 2).chunk(&doc).expect("chunk");
        assert_eq!(chunks[0].text, "héllo");
        assert_eq!(chunks[1].text, "lo wö");
        assert_eq!(chunks.last().map(|c| c.end), Some(13));
    }

    #[test]
    fn rejects_empty_text() {
        let err = chunker(10, 2).chunk(&Document::new("empty", "")).unwrap_err();
        assert!(matches!(err, Error::Chunking { ref doc_id, .. } if doc_id == "empty"));
    }

    #[test]
    fn rejects_bad_config() {
        assert!(Chunker::new(ChunkingConfig { chunk_size: 10, overlap: 10 }).is_err());
        assert!(Chunker::new(ChunkingConfig { chunk_size: 10, overlap: 0 }).is_err());
        assert!(Chunker::new(ChunkingConfig { chunk_size: 0, overlap: 0 }).is_err());
    }
}
