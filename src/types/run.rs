//! Run start and run stop documents

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Root document of an acquisition run
///
/// Only `uid` is interpreted by the store; everything else is kept as-is
/// and handed to the run start collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStart {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RunStart {
    /// Create a run start with only a uid
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            time: None,
            extra: Map::new(),
        }
    }

    /// Set the start time
    pub fn with_time(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }

    /// Attach an opaque metadata field
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Closing document of an acquisition run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStop {
    pub uid: String,
    pub run_start: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RunStop {
    pub fn new(uid: impl Into<String>, run_start: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            run_start: run_start.into(),
            time: None,
            exit_status: None,
            extra: Map::new(),
        }
    }

    pub fn with_exit_status(mut self, exit_status: impl Into<String>) -> Self {
        self.exit_status = Some(exit_status.into());
        self
    }
}
