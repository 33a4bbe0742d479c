//! Error handling for the matching service

use thiserror::Error;

/// Result type alias for the matching service
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Error-text markers that identify a deterministic resource failure.
/// An event that trips one of these will fail the same way on every
/// redelivery, so the consumer must not requeue it.
pub const RESOURCE_EXHAUSTION_MARKERS: &[&str] = &[
    "out of memory",
    "paging file",
    "1455",
    "oom",
    "allocation failed",
    "cannot allocate",
];

/// Main error type for the matching service
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("Document store error: {0}")]
    Document(#[from] DocumentError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the embedding backend
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Encoding failed: {0}")]
    EncodeFailed(String),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Text cannot be empty")]
    EmptyInput,

    #[error("Embedding resources exhausted: {0}")]
    ResourceExhausted(String),
}

/// Errors from the vector index
#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error(
        "Index dimension mismatch: index has {actual}, need {expected} ({records} records present)"
    )]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        records: usize,
    },

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Upsert failed: {0}")]
    UpsertFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Index not ready: {0}")]
    NotReady(String),
}

/// Errors from the structured-document store
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("CV not found: {0}")]
    NotFound(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Document store returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Invalid document payload: {0}")]
    InvalidPayload(String),
}

/// Coarse error classification used for status-code mapping and
/// consumer dispositions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    UpstreamTransient,
    ResourceExhausted,
    Internal,
}

/// What the consumer should do with the in-flight message after a
/// processing failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Requeue,
    Discard,
}

impl ServiceError {
    /// Whether this error denotes exhausted compute resources.
    /// Checked by variant and by marker substring, since upstream
    /// backends often surface these only as message text.
    pub fn is_resource_exhausted(&self) -> bool {
        if matches!(
            self,
            ServiceError::Embedding(EmbeddingError::ResourceExhausted(_))
        ) {
            return true;
        }
        let text = self.to_string().to_lowercase();
        RESOURCE_EXHAUSTION_MARKERS
            .iter()
            .any(|marker| text.contains(marker))
    }

    /// Classify the error for status-code mapping and retry decisions
    pub fn kind(&self) -> ErrorKind {
        if self.is_resource_exhausted() {
            return ErrorKind::ResourceExhausted;
        }

        match self {
            ServiceError::InvalidInput(_) => ErrorKind::InvalidInput,
            ServiceError::Embedding(EmbeddingError::EmptyInput) => ErrorKind::InvalidInput,
            ServiceError::Embedding(EmbeddingError::ConnectionFailed(_)) => {
                ErrorKind::UpstreamTransient
            }
            ServiceError::Embedding(EmbeddingError::EncodeFailed(_)) => {
                ErrorKind::UpstreamTransient
            }
            ServiceError::Document(DocumentError::NotFound(_)) => ErrorKind::NotFound,
            ServiceError::Document(DocumentError::ConnectionFailed(_)) => {
                ErrorKind::UpstreamTransient
            }
            ServiceError::Document(DocumentError::UpstreamStatus { status, .. }) => {
                if *status >= 500 {
                    ErrorKind::UpstreamTransient
                } else {
                    ErrorKind::NotFound
                }
            }
            ServiceError::Document(DocumentError::InvalidPayload(_)) => ErrorKind::InvalidInput,
            ServiceError::VectorStore(VectorStoreError::DimensionMismatch { .. }) => {
                ErrorKind::Internal
            }
            ServiceError::VectorStore(VectorStoreError::InvalidDimension { .. }) => {
                ErrorKind::Internal
            }
            ServiceError::VectorStore(_) => ErrorKind::UpstreamTransient,
            ServiceError::Queue(_) => ErrorKind::UpstreamTransient,
            ServiceError::Http(_) => ErrorKind::UpstreamTransient,
            _ => ErrorKind::Internal,
        }
    }

    /// Consumer-side outcome for a message whose processing raised
    /// this error. Deterministic failures are discarded so they cannot
    /// starve the queue; everything else is redelivered.
    pub fn disposition(&self) -> Disposition {
        match self.kind() {
            ErrorKind::InvalidInput | ErrorKind::NotFound | ErrorKind::ResourceExhausted => {
                Disposition::Discard
            }
            ErrorKind::UpstreamTransient | ErrorKind::Internal => Disposition::Requeue,
        }
    }

    /// Get error category for logging/metrics
    pub fn category(&self) -> &'static str {
        match self {
            ServiceError::Embedding(_) => "embedding",
            ServiceError::VectorStore(_) => "vector_store",
            ServiceError::Document(_) => "document",
            ServiceError::InvalidInput(_) => "invalid_input",
            ServiceError::Queue(_) => "queue",
            ServiceError::Config(_) => "config",
            ServiceError::Serialization(_) => "serialization",
            ServiceError::Http(_) => "http",
            ServiceError::Io(_) => "io",
        }
    }
}
