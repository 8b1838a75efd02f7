use thiserror::Error;

/// Result alias for chunking, storage and retrieval operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid chunking configuration: {0}")]
    Configuration(String),

    #[error("embedding dimension mismatch for entry '{id}': query has {expected}, stored has {actual}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("failed to embed fragment '{id}': {message}")]
    EmbeddingFailed { id: String, message: String },

    /// Never returned from an operation; built so the dropped fragments of an
    /// indexing pass can be reported through the log.
    #[error("indexed '{file_name}' with {failed} of {total} fragments dropped")]
    IndexingPartialFailure {
        file_name: String,
        failed: usize,
        total: usize,
    },

    #[error("failed to embed query: {message}")]
    QueryEmbeddingFailed { message: String },

    #[error("failed to generate answer: {message}")]
    GenerationFailed { message: String },
}

impl Error {
    /// Renders a collaborator error with its whole context chain.
    pub(crate) fn provider_message(err: &anyhow::Error) -> String {
        format!("{:#}", err)
    }
}
