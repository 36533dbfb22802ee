//! Error taxonomy for the matching engine.
//!
//! Every fatal variant aborts the whole request: the engine never returns a
//! partially filled matrix. [`MatchError::CacheMiss`] is the one internal
//! variant; the builder recovers from it by vectorising the text.

/// Error type for vectorisation, caching, and matrix operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchError {
    #[error("Embedding provider unavailable ({framework}/{model}): {reason}")]
    ProviderUnavailable {
        framework: String,
        model: String,
        reason: String,
    },

    #[error("Vectorisation failed ({framework}/{model}): {message}")]
    Vectorisation {
        framework: String,
        model: String,
        message: String,
    },

    #[error("No cached vector for key: {0}")]
    CacheMiss(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Provider returned {actual} vectors for {expected} texts")]
    VectorCountMismatch { expected: usize, actual: usize },

    #[error("Similarity matrix has {actual} rows but the instruments contain {expected} items")]
    ShapeMismatch { expected: usize, actual: usize },
}
