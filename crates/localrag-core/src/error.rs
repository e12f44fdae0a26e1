use thiserror::Error;

/// Failures reported by an embedding backend.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("Embedding backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Cannot embed zero-length text")]
    EmptyInput,

    #[error("Malformed embedding response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot chunk document '{doc_id}': {reason}")]
    Chunking { doc_id: String, reason: String },

    #[error(transparent)]
    Embedding(#[from] EmbedError),

    #[error("Index build aborted, previous index still active: {0}")]
    IndexBuildAborted(#[source] Box<Error>),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index was built by embedder '{actual}' but queries use '{expected}'; re-run ingest")]
    EmbedderMismatch { expected: String, actual: String },

    #[error("Prompt needs {required} characters but the limit is {limit}")]
    PromptOverflow { required: usize, limit: usize },

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Index store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a failure that happened while building a replacement index.
    pub fn build_aborted(cause: Error) -> Self {
        match cause {
            already @ Error::IndexBuildAborted(_) => already,
            other => Error::IndexBuildAborted(Box::new(other)),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Error::Store(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
