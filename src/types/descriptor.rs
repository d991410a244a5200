//! Event descriptor documents

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema declaration for one stream of events within a run
///
/// The names in `data_keys` fix the columns of the descriptor's table.
/// Per-key metadata (dtype, source, shape...) is opaque to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub uid: String,
    pub run_start: String,
    #[serde(default)]
    pub data_keys: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Descriptor {
    /// Create a descriptor with no data keys
    pub fn new(uid: impl Into<String>, run_start: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            run_start: run_start.into(),
            data_keys: BTreeMap::new(),
            time: None,
            extra: Map::new(),
        }
    }

    /// Declare data keys with empty metadata
    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for key in keys {
            self.data_keys.insert(key.into(), Value::Object(Map::new()));
        }
        self
    }

    /// Declare one data key with its metadata
    pub fn with_key(mut self, key: impl Into<String>, meta: Value) -> Self {
        self.data_keys.insert(key.into(), meta);
        self
    }

    /// Declared key names, sorted
    pub fn key_names(&self) -> impl Iterator<Item = &str> {
        self.data_keys.keys().map(String::as_str)
    }
}
