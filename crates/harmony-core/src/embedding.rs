//! Vectoriser trait and vector utilities.
//!
//! Defines the [`Vectoriser`] trait that every embedding backend implements,
//! the [`ModelKey`] identity a vectoriser is bound to, and pure helpers for
//! text normalisation, dimension checks, and cosine similarity.
//!
//! Concrete providers (OpenAI, Azure OpenAI, Ollama, fastembed) live in the
//! `harmony-match` app crate.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MatchError;

/// A `(framework, model)` pair identifying one embedding space.
///
/// Vectors are only comparable when produced under the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelKey {
    /// Provider family, e.g. `"openai"` or `"huggingface"`.
    pub framework: String,
    /// Model identifier within the framework.
    pub model: String,
}

impl ModelKey {
    pub fn new(framework: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            framework: framework.into(),
            model: model.into(),
        }
    }

    /// Build a [`MatchError::ProviderUnavailable`] for this key.
    pub fn unavailable(&self, reason: impl Into<String>) -> MatchError {
        MatchError::ProviderUnavailable {
            framework: self.framework.clone(),
            model: self.model.clone(),
            reason: reason.into(),
        }
    }

    /// Build a [`MatchError::Vectorisation`] for this key.
    pub fn failed(&self, message: impl Into<String>) -> MatchError {
        MatchError::Vectorisation {
            framework: self.framework.clone(),
            model: self.model.clone(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.framework, self.model)
    }
}

/// Trait for embedding backends.
///
/// One vectoriser is bound to exactly one [`ModelKey`] for its lifetime.
/// Implementations may batch internally but must return one vector per
/// input text, in input order, or fail the whole call.
#[async_trait]
pub trait Vectoriser: Send + Sync {
    /// The `(framework, model)` pair this vectoriser produces vectors for.
    fn model_key(&self) -> &ModelKey;

    /// Embed a batch of texts.
    ///
    /// # Errors
    ///
    /// - [`MatchError::ProviderUnavailable`] when credentials or the model
    ///   are missing.
    /// - [`MatchError::Vectorisation`] when the backend call fails.
    async fn vectorise(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MatchError>;
}

/// Normalise text before it is cached or sent to a provider.
///
/// Trims the ends and collapses internal whitespace runs to one space. Case
/// is kept so the normalised text is exactly what the provider embeds.
pub fn normalise_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Verify that every vector has the same length.
///
/// Returns the shared dimensionality, or `0` for an empty batch.
pub fn check_dimensions(vectors: &[Vec<f32>]) -> Result<usize, MatchError> {
    let Some(first) = vectors.first() else {
        return Ok(0);
    };
    let expected = first.len();
    if expected == 0 {
        return Err(MatchError::DimensionMismatch {
            expected: 1,
            actual: 0,
        });
    }
    for v in &vectors[1..] {
        if v.len() != expected {
            return Err(MatchError::DimensionMismatch {
                expected,
                actual: v.len(),
            });
        }
    }
    Ok(expected)
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, zero vectors, or vectors of different
/// lengths. Callers that need to reject mismatched lengths use
/// [`check_dimensions`] first.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    (dot / denom).clamp(-1.0, 1.0)
}
