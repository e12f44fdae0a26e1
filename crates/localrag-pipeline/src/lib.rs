//! Retrieval-augmented answering over a fixed document collection.

pub mod eval;
pub mod pipeline;
pub mod prompt;
pub mod retriever;

pub use pipeline::{BuildReport, Pipeline, PipelineConfig};
pub use prompt::{PromptAssembler, OUT_OF_SCOPE_ANSWER};
pub use retriever::Retriever;
