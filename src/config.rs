//! Store configuration
//!
//! A single base directory holds one SQLite file per run plus the JSON
//! collections for control-plane metadata.

use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming the base directory
pub const DIR_ENV: &str = "RUN_STORE_DIR";

/// Environment variable bounding the number of open unit connections
pub const MAX_OPEN_UNITS_ENV: &str = "RUN_STORE_MAX_OPEN_UNITS";

/// Default cap on simultaneously open storage units
pub const DEFAULT_MAX_OPEN_UNITS: usize = 64;

/// Configuration for the run store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Base directory for unit files and JSON collections
    pub directory: PathBuf,
    /// Maximum number of storage unit connections kept open at once
    pub max_open_units: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("data"),
            max_open_units: DEFAULT_MAX_OPEN_UNITS,
        }
    }
}

impl StoreConfig {
    /// Create config with custom base directory
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Set the open unit cap (clamped to at least 1)
    pub fn with_max_open_units(mut self, max_open_units: usize) -> Self {
        self.max_open_units = max_open_units.max(1);
        self
    }

    /// Build config from `RUN_STORE_DIR` / `RUN_STORE_MAX_OPEN_UNITS`.
    ///
    /// Relative directories are resolved against the current directory.
    /// An unparsable cap falls back to the default.
    pub fn from_env() -> Self {
        let current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        let directory = match env::var(DIR_ENV) {
            Ok(path) => {
                let path = PathBuf::from(path);
                if path.is_absolute() {
                    path
                } else {
                    current_dir.join(path)
                }
            }
            Err(_) => current_dir.join("data"),
        };

        let max_open_units = env::var(MAX_OPEN_UNITS_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_OPEN_UNITS);

        Self::new(directory).with_max_open_units(max_open_units)
    }

    /// Get the base directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path to the run start collection
    pub fn run_starts_path(&self) -> PathBuf {
        self.directory.join("run_starts.json")
    }

    /// Path to the run stop collection
    pub fn run_stops_path(&self) -> PathBuf {
        self.directory.join("run_stops.json")
    }

    /// Path to the descriptor collection
    pub fn descriptors_path(&self) -> PathBuf {
        self.directory.join("event_descriptors.json")
    }
}
