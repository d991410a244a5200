//! Bounded cache of open storage units
//!
//! Runs stay registered when their unit is evicted; only the connection is
//! closed. The next access reopens it from the run's file.

use std::num::NonZeroUsize;
use std::path::Path;

use lru::LruCache;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

use super::unit::StorageUnit;

pub struct UnitCache {
    inner: LruCache<String, StorageUnit>,
}

impl UnitCache {
    /// Create a cache holding at most `capacity` open units (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let size = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(size),
        }
    }

    /// Get the open unit for `run_uid`, opening `path` on a miss
    pub fn get_or_open(&mut self, run_uid: &str, path: &Path) -> StoreResult<&mut StorageUnit> {
        if !self.inner.contains(run_uid) {
            let unit = StorageUnit::open(run_uid, path)?;
            self.insert(unit);
        }
        self.inner
            .get_mut(run_uid)
            .ok_or_else(|| StoreError::unknown_run(run_uid))
    }

    /// Cache an already opened unit, evicting the least recently used one
    pub fn insert(&mut self, unit: StorageUnit) {
        let key = unit.run_uid().to_string();
        if let Some((evicted, _)) = self.inner.push(key.clone(), unit) {
            if evicted != key {
                debug!(run = %evicted, "closed least recently used storage unit");
            }
        }
    }

    pub fn contains(&self, run_uid: &str) -> bool {
        self.inner.contains(run_uid)
    }

    /// Number of open units
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }

    /// Close every open unit
    pub fn clear(&mut self) {
        self.inner.clear();
    }
}
