//! Event documents
//!
//! An event is one timestamped measurement belonging to a descriptor.
//! Events are append-only: they are inserted once and never updated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row of a descriptor's table, in document form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub uid: String,
    pub descriptor: String,
    pub seq_num: i64,
    pub time: f64,
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
    #[serde(default)]
    pub timestamps: BTreeMap<String, f64>,
}

impl Event {
    /// Create an event with empty data
    pub fn new(uid: impl Into<String>, descriptor: impl Into<String>, seq_num: i64, time: f64) -> Self {
        Self {
            uid: uid.into(),
            descriptor: descriptor.into(),
            seq_num,
            time,
            data: BTreeMap::new(),
            timestamps: BTreeMap::new(),
        }
    }

    /// Record one reading and its timestamp
    pub fn with_reading(mut self, key: impl Into<String>, value: Value, timestamp: f64) -> Self {
        let key = key.into();
        self.data.insert(key.clone(), value);
        self.timestamps.insert(key, timestamp);
        self
    }

    /// Check that `data` and `timestamps` both carry exactly `keys`
    pub fn keys_match<'a, I>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut count = 0;
        for key in keys {
            if !self.data.contains_key(key) || !self.timestamps.contains_key(key) {
                return false;
            }
            count += 1;
        }
        self.data.len() == count && self.timestamps.len() == count
    }
}
