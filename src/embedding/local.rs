//! Local sentence-transformer models via fastembed.
//!
//! Models are downloaded from Hugging Face on first use and cached; after
//! that no network calls are needed. Inference runs on a blocking thread so
//! it never stalls the async runtime. Without the `local-embeddings` feature
//! every local model reports [`MatchError::ProviderUnavailable`].

use harmony_core::embedding::{ModelKey, Vectoriser};
use harmony_core::MatchError;

use crate::config::EmbeddingConfig;

/// Hugging Face model ids served by this adapter.
pub const SUPPORTED_MODELS: &[&str] = &[
    "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2",
    "sentence-transformers/paraphrase-multilingual-mpnet-base-v2",
    "sentence-transformers/all-MiniLM-L6-v2",
];

/// Factory for `huggingface/*` models.
#[cfg(feature = "local-embeddings")]
pub fn create(config: &EmbeddingConfig, key: &ModelKey) -> Result<Box<dyn Vectoriser>, MatchError> {
    Ok(Box::new(fastembed_impl::LocalVectoriser::new(config, key)?))
}

#[cfg(not(feature = "local-embeddings"))]
pub fn create(
    _config: &EmbeddingConfig,
    key: &ModelKey,
) -> Result<Box<dyn Vectoriser>, MatchError> {
    Err(key.unavailable(
        "local models require building with `--features local-embeddings`",
    ))
}

#[cfg(feature = "local-embeddings")]
mod fastembed_impl {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use harmony_core::embedding::{ModelKey, Vectoriser};
    use harmony_core::MatchError;

    use crate::config::EmbeddingConfig;

    fn to_fastembed_model(key: &ModelKey) -> Result<EmbeddingModel, MatchError> {
        match key.model.as_str() {
            "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2" => {
                Ok(EmbeddingModel::ParaphraseMLMiniLML12V2)
            }
            "sentence-transformers/paraphrase-multilingual-mpnet-base-v2" => {
                Ok(EmbeddingModel::ParaphraseMLMpnetBaseV2)
            }
            "sentence-transformers/all-MiniLM-L6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
            other => Err(key.unavailable(format!("unknown local embedding model: '{}'", other))),
        }
    }

    /// fastembed-backed vectoriser. The model is loaded on first use.
    pub struct LocalVectoriser {
        key: ModelKey,
        model: EmbeddingModel,
        batch_size: usize,
        loaded: Arc<Mutex<Option<TextEmbedding>>>,
    }

    impl LocalVectoriser {
        pub fn new(config: &EmbeddingConfig, key: &ModelKey) -> Result<Self, MatchError> {
            Ok(Self {
                key: key.clone(),
                model: to_fastembed_model(key)?,
                batch_size: config.batch_size,
                loaded: Arc::new(Mutex::new(None)),
            })
        }
    }

    #[async_trait]
    impl Vectoriser for LocalVectoriser {
        fn model_key(&self) -> &ModelKey {
            &self.key
        }

        async fn vectorise(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MatchError> {
            let key = self.key.clone();
            let model = self.model.clone();
            let batch_size = self.batch_size;
            let loaded = Arc::clone(&self.loaded);
            let texts = texts.to_vec();

            tokio::task::spawn_blocking(move || {
                let mut guard = loaded
                    .lock()
                    .map_err(|_| key.failed("local model lock poisoned"))?;
                if guard.is_none() {
                    tracing::info!(model = %key, "loading local embedding model");
                    let embedding = TextEmbedding::try_new(
                        InitOptions::new(model).with_show_download_progress(false),
                    )
                    .map_err(|e| {
                        key.unavailable(format!("failed to initialize local embedding model: {}", e))
                    })?;
                    *guard = Some(embedding);
                }
                let embedding = guard
                    .as_mut()
                    .ok_or_else(|| key.failed("local model not loaded"))?;
                embedding
                    .embed(texts, Some(batch_size))
                    .map_err(|e| key.failed(format!("local embedding failed: {}", e)))
            })
            .await
            .map_err(|e| self.key.failed(format!("embedding task failed: {}", e)))?
        }
    }
}
