//! The orchestrator: owns the serving index and wires chunking, embedding,
//! retrieval, prompt assembly and generation together.

use std::collections::HashSet;
use std::sync::Arc;

use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};

use localrag_core::chunker::{Chunker, ChunkingConfig};
use localrag_core::config::{PromptConfig, RetrievalConfig, Settings};
use localrag_core::error::{Error, Result};
use localrag_core::types::{AnswerResult, Chunk, Document, Embedding, IndexEntry, RetrievalResult, Source, SourceMeta};
use localrag_core::{EmbedError, Embedder, GenerationClient};
use localrag_vector::{SharedIndex, VectorIndex};

use crate::prompt::{PromptAssembler, OUT_OF_SCOPE_ANSWER};
use crate::retriever::Retriever;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub prompt: PromptConfig,
    /// Texts per `embed_batch` call during index builds.
    pub batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            prompt: PromptConfig::default(),
            batch_size: 32,
        }
    }
}

impl From<&Settings> for PipelineConfig {
    fn from(s: &Settings) -> Self {
        Self { chunking: s.chunking, retrieval: s.retrieval, prompt: s.prompt, batch_size: s.embedding.batch_size }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub version: String,
    pub documents: usize,
    pub chunks: usize,
    pub dimension: usize,
}

pub struct Pipeline<E: Embedder, G: GenerationClient> {
    chunker: Chunker,
    embedder: Arc<E>,
    index: Arc<SharedIndex>,
    retriever: Retriever<E>,
    assembler: PromptAssembler,
    generator: G,
    batch_size: usize,
}

impl<E: Embedder, G: GenerationClient> Pipeline<E, G> {
    pub fn new(config: PipelineConfig, embedder: E, generator: G) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be positive".to_string()));
        }
        if embedder.dim() == 0 {
            return Err(Error::InvalidConfig(format!("embedder {} reports zero dimensions", embedder.embedder_id())));
        }
        let embedder = Arc::new(embedder);
        let index = Arc::new(SharedIndex::new());
        Ok(Self {
            chunker: Chunker::new(config.chunking)?,
            retriever: Retriever::new(Arc::clone(&embedder), Arc::clone(&index), config.retrieval)?,
            assembler: PromptAssembler::new(config.prompt)?,
            embedder,
            index,
            generator,
            batch_size: config.batch_size,
        })
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn assembler(&self) -> &PromptAssembler {
        &self.assembler
    }

    /// Snapshot of the index currently serving queries.
    pub fn index(&self) -> Arc<VectorIndex> {
        self.index.snapshot()
    }

    /// Serve a previously persisted index. It must have been built by the
    /// same embedder that will embed queries.
    pub fn install_index(&self, index: VectorIndex) -> Result<()> {
        if index.is_empty() {
            self.index.publish(index);
            return Ok(());
        }
        if index.dim() != self.embedder.dim() {
            return Err(Error::DimensionMismatch { expected: self.embedder.dim(), actual: index.dim() });
        }
        if index.embedder_id() != self.embedder.embedder_id() {
            return Err(Error::EmbedderMismatch {
                expected: self.embedder.embedder_id().to_string(),
                actual: index.embedder_id().to_string(),
            });
        }
        self.index.publish(index);
        Ok(())
    }

    pub fn build_index(&self, documents: &[Document]) -> Result<BuildReport> {
        self.build_index_with_progress(documents, &ProgressBar::hidden())
    }

    /// Chunk, embed and publish `documents` as one step. Any failure aborts the
    /// build and leaves the serving index untouched.
    pub fn build_index_with_progress(&self, documents: &[Document], progress: &ProgressBar) -> Result<BuildReport> {
        let chunks = self.chunk_all(documents).map_err(Error::build_aborted)?;
        let embeddings = self.embed_all(&chunks, progress).map_err(Error::build_aborted)?;
        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|((chunk, meta), embedding)| IndexEntry { chunk, embedding, meta: meta.clone() })
            .collect();

        let version = self.corpus_version(documents);
        let dimension = self.embedder.dim();
        let chunk_count = entries.len();
        let next = VectorIndex::build(version.clone(), dimension, entries)
            .map_err(Error::build_aborted)?
            .with_embedder(self.embedder.embedder_id());
        self.index.publish(next);

        tracing::info!(version = %version, documents = documents.len(), chunks = chunk_count, dimension, "index built");
        Ok(BuildReport { version, documents: documents.len(), chunks: chunk_count, dimension })
    }

    fn chunk_all<'d>(&self, documents: &'d [Document]) -> Result<Vec<(Chunk, &'d SourceMeta)>> {
        let mut seen = HashSet::with_capacity(documents.len());
        let mut chunks = Vec::new();
        for doc in documents {
            if !seen.insert(doc.id.as_str()) {
                return Err(Error::Chunking { doc_id: doc.id.clone(), reason: "duplicate document id".to_string() });
            }
            chunks.extend(self.chunker.chunk(doc)?.into_iter().map(|c| (c, &doc.meta)));
        }
        Ok(chunks)
    }

    fn embed_all(&self, chunks: &[(Chunk, &SourceMeta)], progress: &ProgressBar) -> Result<Vec<Embedding>> {
        progress.set_length(chunks.len() as u64);
        let dim = self.embedder.dim();
        let mut out = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|(c, _)| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts)?;
            if vectors.len() != texts.len() {
                return Err(Error::Embedding(EmbedError::MalformedResponse(format!(
                    "{} vectors for {} texts",
                    vectors.len(),
                    texts.len()
                ))));
            }
            if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
                return Err(Error::DimensionMismatch { expected: dim, actual: bad.len() });
            }
            out.extend(vectors);
            progress.inc(batch.len() as u64);
        }
        progress.finish_and_clear();
        Ok(out)
    }

    /// blake3 over the embedder id, chunking parameters and every document,
    /// source metadata included.
    fn corpus_version(&self, documents: &[Document]) -> String {
        let cfg = self.chunker.config();
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.embedder.embedder_id().as_bytes());
        hasher.update(&(cfg.chunk_size as u64).to_le_bytes());
        hasher.update(&(cfg.overlap as u64).to_le_bytes());
        for doc in documents {
            hasher.update(doc.id.as_bytes());
            hasher.update(&[0]);
            hasher.update(doc.text.as_bytes());
            hasher.update(&[0]);
            for field in [&doc.meta.title, &doc.meta.path] {
                match field {
                    Some(value) => {
                        hasher.update(&[1]);
                        hasher.update(value.as_bytes());
                    }
                    None => {
                        hasher.update(&[0]);
                    }
                }
                hasher.update(&[0]);
            }
        }
        hasher.finalize().to_hex().to_string()
    }

    pub fn retrieve(&self, question: &str) -> Result<RetrievalResult> {
        self.retriever.retrieve(question)
    }

    pub fn answer(&self, question: &str) -> Result<AnswerResult> {
        let retrieval = self.retrieve(question)?;
        self.answer_from(question, &retrieval)
    }

    /// Assemble and generate from an existing retrieval. Citations are exactly
    /// the chunks present in the final prompt.
    pub fn answer_from(&self, question: &str, retrieval: &RetrievalResult) -> Result<AnswerResult> {
        let prompt = self.assembler.assemble(question, retrieval)?;
        if !prompt.grounded {
            tracing::info!(question, "no relevant context, answering out of scope");
            return Ok(AnswerResult {
                answer: OUT_OF_SCOPE_ANSWER.to_string(),
                citations: Vec::new(),
                sources: Vec::new(),
                grounded: false,
            });
        }

        let answer = self.generator.generate(&prompt)?;
        let sources = retrieval.hits[..prompt.included.len()].iter().map(Source::from_hit).collect();
        tracing::info!(citations = ?prompt.included, dropped = prompt.dropped.len(), "answer generated");
        Ok(AnswerResult { answer, citations: prompt.included, sources, grounded: true })
    }
}
