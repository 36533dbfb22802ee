//! Embedding provider registry and concrete vectorisers.
//!
//! Every backend implements [`harmony_core::embedding::Vectoriser`]. The
//! [`ProviderRegistry`] maps a `(framework, model)` pair to the factory that
//! builds it, so adding a model is one [`ProviderRegistry::register`] call.
//!
//! | Framework | Adapter | Requirements |
//! |-----------|---------|--------------|
//! | `huggingface` | [`local`] (fastembed) | `local-embeddings` feature |
//! | `openai` | [`remote`] | `OPENAI_API_KEY` |
//! | `azure_openai` | [`remote`] | `AZURE_OPENAI_API_KEY`, `AZURE_OPENAI_ENDPOINT` |
//! | `ollama` | [`remote`] | a running Ollama at `embedding.url` |
//!
//! # Provider Selection
//!
//! ```rust,no_run
//! # use harmony_match::config::EmbeddingConfig;
//! # use harmony_match::embedding::ProviderRegistry;
//! let registry = ProviderRegistry::builtin();
//! let vectoriser = registry.create(&EmbeddingConfig::default()).unwrap();
//! assert_eq!(vectoriser.model_key().framework, "huggingface");
//! ```
//!
//! # Retry Strategy
//!
//! The HTTP adapters use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

pub mod local;
pub mod remote;

use std::collections::BTreeMap;
use std::time::Duration;

use harmony_core::embedding::{ModelKey, Vectoriser};
use harmony_core::MatchError;

use crate::config::EmbeddingConfig;

/// Builds a vectoriser for one registered key.
pub type ProviderFactory =
    fn(&EmbeddingConfig, &ModelKey) -> Result<Box<dyn Vectoriser>, MatchError>;

/// Lookup table from [`ModelKey`] to [`ProviderFactory`].
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<ModelKey, ProviderFactory>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in model.
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        for model in local::SUPPORTED_MODELS {
            registry.register(ModelKey::new("huggingface", *model), local::create);
        }
        for model in [
            "text-embedding-ada-002",
            "text-embedding-3-small",
            "text-embedding-3-large",
        ] {
            registry.register(ModelKey::new("openai", model), remote::openai);
        }
        for model in ["text-embedding-ada-002", "text-embedding-3-large"] {
            registry.register(ModelKey::new("azure_openai", model), remote::azure_openai);
        }
        for model in ["nomic-embed-text", "mxbai-embed-large"] {
            registry.register(ModelKey::new("ollama", model), remote::ollama);
        }

        registry
    }

    /// Register (or replace) the factory for `key`.
    pub fn register(&mut self, key: ModelKey, factory: ProviderFactory) -> &mut Self {
        self.factories.insert(key, factory);
        self
    }

    pub fn contains(&self, key: &ModelKey) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys, sorted by framework then model.
    pub fn models(&self) -> Vec<ModelKey> {
        self.factories.keys().cloned().collect()
    }

    /// Build the vectoriser selected by `config.framework` / `config.model`.
    ///
    /// # Errors
    ///
    /// [`MatchError::ProviderUnavailable`] if the key is not registered or
    /// the factory cannot construct the provider.
    pub fn create(&self, config: &EmbeddingConfig) -> Result<Box<dyn Vectoriser>, MatchError> {
        let key = config.model_key();
        let factory = self.factories.get(&key).ok_or_else(|| {
            key.unavailable(format!(
                "model is not registered; run `harmony models` to list the {} available models",
                self.factories.len()
            ))
        })?;
        let vectoriser = factory(config, &key)?;
        tracing::debug!(model = %key, "embedding provider created");
        Ok(vectoriser)
    }
}

/// Delay before retry `attempt` (1-based): 1s, 2s, 4s … capped at 32s.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(5))
}
