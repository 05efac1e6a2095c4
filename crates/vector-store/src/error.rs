use crate::types::DocId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VectorStoreError>;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    /// Vector length does not match the index dimension. Raised before any mutation.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// Lookup on an id that was never issued or is tombstoned.
    #[error("Document not found: {0}")]
    NotFound(DocId),

    /// Persisted index failed validation. The index must be rebuilt from source documents.
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// A locking invariant was broken. Seeing this is a bug.
    #[error("Concurrent mutation conflict: {0}")]
    ConcurrentMutationConflict(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl VectorStoreError {
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptIndex(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::ConcurrentMutationConflict(msg.into())
    }
}
