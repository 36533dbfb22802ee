//! On-disk vector cache snapshots.
//!
//! A snapshot is a JSON file holding the contents of an
//! [`InMemoryVectorCache`], grouped by embedding space. Each group carries a
//! SHA-256 fingerprint of its `(framework, model)` pair; groups whose
//! fingerprint or dimensionality does not check out are skipped on load
//! rather than poisoning the cache.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use harmony_core::cache::memory::InMemoryVectorCache;
use harmony_core::cache::{CacheKey, VectorCache};
use harmony_core::embedding::ModelKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub groups: Vec<SnapshotGroup>,
}

/// All cached vectors for one embedding space.
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotGroup {
    pub framework: String,
    pub model: String,
    pub fingerprint: String,
    pub dims: usize,
    /// Normalised text → vector.
    pub vectors: BTreeMap<String, Vec<f32>>,
}

/// Hex SHA-256 of `framework` and `model`, NUL-separated.
pub fn model_fingerprint(key: &ModelKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.framework.as_bytes());
    hasher.update([0u8]);
    hasher.update(key.model.as_bytes());
    hex::encode(hasher.finalize())
}

/// Group the cache contents into a [`Snapshot`].
pub fn build_snapshot(cache: &InMemoryVectorCache) -> Snapshot {
    let mut groups: BTreeMap<ModelKey, SnapshotGroup> = BTreeMap::new();
    for (key, vector) in cache.snapshot() {
        let model_key = key.model_key();
        let group = groups.entry(model_key.clone()).or_insert_with(|| SnapshotGroup {
            fingerprint: model_fingerprint(&model_key),
            framework: model_key.framework,
            model: model_key.model,
            dims: vector.len(),
            vectors: BTreeMap::new(),
        });
        group.vectors.insert(key.text, vector);
    }

    Snapshot {
        version: SNAPSHOT_VERSION,
        saved_at: Utc::now(),
        groups: groups.into_values().collect(),
    }
}

/// Load a snapshot into `cache`. A missing file loads nothing.
///
/// Returns the number of vectors restored.
pub fn load_snapshot(path: &Path, cache: &InMemoryVectorCache) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cache snapshot: {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse cache snapshot: {}", path.display()))?;

    if snapshot.version != SNAPSHOT_VERSION {
        warn!(
            path = %path.display(),
            version = snapshot.version,
            "unsupported snapshot version, ignoring"
        );
        return Ok(0);
    }

    let mut restored = 0;
    for group in snapshot.groups {
        let model_key = ModelKey::new(&group.framework, &group.model);
        if group.fingerprint != model_fingerprint(&model_key) {
            warn!(model = %model_key, "snapshot fingerprint mismatch, skipping group");
            continue;
        }
        if group.vectors.values().any(|v| v.len() != group.dims || v.is_empty()) {
            warn!(model = %model_key, dims = group.dims, "inconsistent vector lengths, skipping group");
            continue;
        }
        for (text, vector) in group.vectors {
            cache.put(CacheKey::new(&text, &model_key), vector);
            restored += 1;
        }
    }

    info!(path = %path.display(), vectors = restored, "cache snapshot loaded");
    Ok(restored)
}

/// Write the cache to `path` (via a temporary file, then rename).
///
/// Returns the number of vectors written.
pub fn save_snapshot(path: &Path, cache: &InMemoryVectorCache) -> Result<usize> {
    let snapshot = build_snapshot(cache);
    let count = snapshot.groups.iter().map(|g| g.vectors.len()).sum();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let json = serde_json::to_string(&snapshot)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .with_context(|| format!("Failed to write cache snapshot: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move cache snapshot into place: {}", path.display()))?;

    info!(path = %path.display(), vectors = count, "cache snapshot saved");
    Ok(count)
}
