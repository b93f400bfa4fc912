use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

/// Errors surfaced by the chunker, the embedders and the vector index.
///
/// Nothing is retried or recovered internally: every variant reaches the
/// caller as soon as it is detected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RagError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("length mismatch: {vectors} vectors but {chunks} chunks")]
    LengthMismatch { vectors: usize, chunks: usize },

    #[error("embedding failed: {0}")]
    Embedding(String),
}

impl RagError {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    pub(crate) fn check_dimensions(expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::DimensionMismatch { expected, actual })
        }
    }
}
