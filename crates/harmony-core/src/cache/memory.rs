//! In-memory [`VectorCache`] implementation.
//!
//! Uses a `HashMap` behind `std::sync::Mutex`; entries are effectively
//! write-once per key, so a single lock is enough for concurrent requests.
//! An optional capacity evicts the oldest insertion first.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::error::MatchError;

use super::{CacheKey, VectorCache};

#[derive(Default)]
struct Entries {
    vectors: HashMap<CacheKey, Vec<f32>>,
    order: VecDeque<CacheKey>,
}

/// In-memory vector cache, optionally bounded.
#[derive(Default)]
pub struct InMemoryVectorCache {
    entries: Mutex<Entries>,
    max_entries: Option<usize>,
}

impl InMemoryVectorCache {
    /// Create an unbounded cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache holding at most `max_entries` vectors.
    ///
    /// A capacity of `0` is treated as unbounded.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            max_entries: (max_entries > 0).then_some(max_entries),
        }
    }

    /// Copy out every entry in insertion order (oldest first).
    pub fn snapshot(&self) -> Vec<(CacheKey, Vec<f32>)> {
        let entries = self.lock();
        entries
            .order
            .iter()
            .filter_map(|k| entries.vectors.get(k).map(|v| (k.clone(), v.clone())))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // Entries are only ever inserted whole, so a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl VectorCache for InMemoryVectorCache {
    fn has(&self, key: &CacheKey) -> bool {
        self.lock().vectors.contains_key(key)
    }

    fn get(&self, key: &CacheKey) -> Result<Vec<f32>, MatchError> {
        self.lock()
            .vectors
            .get(key)
            .cloned()
            .ok_or_else(|| MatchError::CacheMiss(key.to_string()))
    }

    fn put(&self, key: CacheKey, vector: Vec<f32>) {
        let mut entries = self.lock();
        if entries.vectors.insert(key.clone(), vector).is_none() {
            entries.order.push_back(key);
        }
        if let Some(max) = self.max_entries {
            while entries.vectors.len() > max {
                let Some(oldest) = entries.order.pop_front() else {
                    break;
                };
                entries.vectors.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.lock().vectors.len()
    }
}
