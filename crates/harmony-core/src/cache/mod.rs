//! Vector cache abstraction.
//!
//! The [`VectorCache`] trait is the contract any vector persistence layer
//! satisfies: `has`, `get`, `put`, keyed by [`CacheKey`]. The cache is a pure
//! optimisation. [`vectorise_with_cache`] partitions texts into cached and
//! uncached sets, calls the provider once for the distinct uncached texts,
//! and writes the fresh vectors back, so warm and cold runs return identical
//! vectors.
//!
//! Implementations must be `Send + Sync`; one cache is shared across
//! concurrent requests.

pub mod memory;

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedding::{check_dimensions, normalise_text, ModelKey, Vectoriser};
use crate::error::MatchError;

/// Cache key: normalised text plus the embedding space it was vectorised in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub text: String,
    pub framework: String,
    pub model: String,
}

impl CacheKey {
    /// Build a key, normalising `text` with [`normalise_text`].
    pub fn new(text: &str, model: &ModelKey) -> Self {
        Self {
            text: normalise_text(text),
            framework: model.framework.clone(),
            model: model.model.clone(),
        }
    }

    /// The embedding space this key belongs to.
    pub fn model_key(&self) -> ModelKey {
        ModelKey::new(self.framework.clone(), self.model.clone())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{:?}", self.framework, self.model, self.text)
    }
}

/// Storage contract for embedding vectors.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`has`](VectorCache::has) | Check whether a key is present |
/// | [`get`](VectorCache::get) | Fetch a vector, failing with [`MatchError::CacheMiss`] |
/// | [`put`](VectorCache::put) | Store a vector (eviction is implementation-defined) |
pub trait VectorCache: Send + Sync {
    fn has(&self, key: &CacheKey) -> bool;

    /// Fetch the vector stored under `key`.
    ///
    /// # Errors
    ///
    /// [`MatchError::CacheMiss`] if the key is absent.
    fn get(&self, key: &CacheKey) -> Result<Vec<f32>, MatchError>;

    fn put(&self, key: CacheKey, vector: Vec<f32>);

    /// Number of stored entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Vectorise `texts` through `cache`, calling `vectoriser` only for misses.
///
/// Texts are normalised and deduplicated before the provider call. The
/// returned vectors are aligned with `texts`.
///
/// # Errors
///
/// - Any error from the vectoriser, unchanged.
/// - [`MatchError::VectorCountMismatch`] if the provider returns the wrong
///   number of vectors.
/// - [`MatchError::DimensionMismatch`] if fresh or cached vectors disagree in
///   length.
///
/// Nothing is written to the cache unless the whole batch validates.
pub async fn vectorise_with_cache(
    vectoriser: &dyn Vectoriser,
    cache: &dyn VectorCache,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, MatchError> {
    let model = vectoriser.model_key();
    let keys: Vec<CacheKey> = texts.iter().map(|t| CacheKey::new(t, model)).collect();

    let mut resolved: HashMap<String, Vec<f32>> = HashMap::with_capacity(keys.len());
    let mut pending: HashSet<&str> = HashSet::new();
    let mut uncached: Vec<String> = Vec::new();

    for key in &keys {
        if resolved.contains_key(&key.text) || pending.contains(key.text.as_str()) {
            continue;
        }
        let hit = if cache.has(key) {
            match cache.get(key) {
                Ok(v) => Some(v),
                // Evicted between `has` and `get`.
                Err(MatchError::CacheMiss(_)) => None,
                Err(e) => return Err(e),
            }
        } else {
            None
        };
        match hit {
            Some(v) => {
                resolved.insert(key.text.clone(), v);
            }
            None => {
                pending.insert(key.text.as_str());
                uncached.push(key.text.clone());
            }
        }
    }

    debug!(
        model = %model,
        requested = texts.len(),
        cached = resolved.len(),
        uncached = uncached.len(),
        "vector cache lookup"
    );

    let fresh = if uncached.is_empty() {
        Vec::new()
    } else {
        let vectors = vectoriser.vectorise(&uncached).await?;
        if vectors.len() != uncached.len() {
            return Err(MatchError::VectorCountMismatch {
                expected: uncached.len(),
                actual: vectors.len(),
            });
        }
        vectors
    };

    let mut all: Vec<Vec<f32>> = resolved.values().cloned().collect();
    all.extend(fresh.iter().cloned());
    check_dimensions(&all)?;

    for (text, vector) in uncached.into_iter().zip(fresh) {
        cache.put(
            CacheKey {
                text: text.clone(),
                framework: model.framework.clone(),
                model: model.model.clone(),
            },
            vector.clone(),
        );
        resolved.insert(text, vector);
    }

    keys.iter()
        .map(|k| {
            resolved
                .get(&k.text)
                .cloned()
                .ok_or_else(|| MatchError::CacheMiss(k.to_string()))
        })
        .collect()
}
