use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use harmony_core::cache::memory::InMemoryVectorCache;
use harmony_core::matrix::MatchEngine;
use harmony_core::negation;

use crate::config::Config;
use crate::embedding::ProviderRegistry;
use crate::instruments;
use crate::report::{self, RunOptions};
use crate::snapshot;

/// Command-line overrides for the `[matching]` section.
#[derive(Debug, Clone, Default)]
pub struct MatchOverrides {
    pub query: Option<String>,
    pub no_negate: bool,
    pub threshold: Option<f32>,
    pub within: bool,
    pub one_to_one: bool,
}

impl MatchOverrides {
    /// Merge these overrides onto the configured defaults.
    pub fn apply(&self, config: &Config) -> Result<RunOptions> {
        let mut options = RunOptions::from(&config.matching);
        if let Some(threshold) = self.threshold {
            if !(-1.0..=1.0).contains(&threshold) {
                bail!("--threshold must be in [-1.0, 1.0]");
            }
            options.crosswalk.threshold = threshold;
        }
        options.query = self.query.clone();
        options.negate &= !self.no_negate;
        options.crosswalk.allow_within_instrument |= self.within;
        options.crosswalk.one_to_one |= self.one_to_one;
        Ok(options)
    }
}

/// Create the cache configured in `[cache]`, restoring its snapshot if any.
pub fn open_cache(config: &Config) -> Result<Arc<InMemoryVectorCache>> {
    let cache = match config.cache.max_entries {
        Some(max) => InMemoryVectorCache::with_capacity(max),
        None => InMemoryVectorCache::new(),
    };
    if let Some(path) = &config.cache.path {
        snapshot::load_snapshot(path, &cache)?;
    }
    Ok(Arc::new(cache))
}

/// Build a [`MatchEngine`] for the configured model over `cache`.
pub fn build_engine(
    config: &Config,
    registry: &ProviderRegistry,
    cache: Arc<InMemoryVectorCache>,
) -> Result<MatchEngine> {
    let vectoriser = registry.create(&config.embedding)?;
    Ok(MatchEngine::new(Arc::from(vectoriser), cache))
}

/// Run `harmony match`: load instruments, build the report, print it.
pub async fn run_match(
    config: &Config,
    path: &Path,
    overrides: &MatchOverrides,
    json: bool,
) -> Result<()> {
    let instruments = instruments::load_instruments(path)?;
    let options = overrides.apply(config)?;

    let cache = open_cache(config)?;
    let engine = build_engine(config, &ProviderRegistry::builtin(), Arc::clone(&cache))?;

    let result = report::run_match(&engine, &instruments, &options).await;

    // Vectors computed before a failure are still worth keeping.
    if let Some(snapshot_path) = &config.cache.path {
        if let Err(e) = snapshot::save_snapshot(snapshot_path, &cache) {
            tracing::warn!(error = %e, "failed to save cache snapshot");
        }
    }

    let report = result?;
    if json {
        println!("{}", report::render_json(&report)?);
    } else {
        print!("{}", report::render_table(&report));
    }
    Ok(())
}

/// Run `harmony negate`.
pub fn run_negate(text: &str, language: &str) {
    if !negation::is_supported(language) {
        tracing::warn!(language, "no negation rules for language, text is unchanged");
    }
    println!("{}", negation::negate(text, language));
}

/// Run `harmony models`.
pub fn run_models(config: &Config) {
    let active = config.embedding.model_key();
    println!("{:<14} {}", "FRAMEWORK", "MODEL");
    println!("{}", "-".repeat(72));
    for key in ProviderRegistry::builtin().models() {
        let marker = if key == active { "  (configured)" } else { "" };
        println!("{:<14} {}{}", key.framework, key.model, marker);
    }
}
