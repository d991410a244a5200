//! Run Store
//!
//! Persists the RunStart → Descriptor → Event document tree of acquisition
//! runs onto SQLite, behind a document-collection style API.
//!
//! # Features
//!
//! - **One file per run**: every run owns one SQLite storage unit
//! - **Dynamic schema**: each descriptor gets a table whose columns come
//!   from its `data_keys`
//! - **Stateless recovery**: the run and descriptor indexes are rebuilt
//!   from file names and table catalogs alone
//! - **Bounded connections**: open units are kept in an LRU cache
//!
//! # Modules
//!
//! - `types`: Document types (RunStart, RunStop, Descriptor, Event)
//! - `storage`: Event collection, storage units, schema and row mapping
//! - `collections`: JSON metadata collections and the control-plane adapters
//! - `config`: Base directory and cache configuration
//! - `error`: Error type shared across the crate
//! - `utils`: Atomic file rewrites, timestamps
//!
//! # Example
//!
//! ```no_run
//! use run_store::{Descriptor, Event, MetadataStore, RunStart, StoreConfig};
//! use serde_json::json;
//!
//! fn main() -> run_store::StoreResult<()> {
//!     let mut store = MetadataStore::new(StoreConfig::new("data"))?;
//!     store.insert_run_start(&RunStart::new("r-1"))?;
//!     store.insert_descriptor(&Descriptor::new("d-1", "r-1").with_keys(["x"]))?;
//!     store.insert_event(&Event::new("e-1", "d-1", 1, 0.0).with_reading("x", json!(1.0), 0.0))?;
//!
//!     for event in store.find_events("d-1", None)? {
//!         println!("{} {:?}", event.seq_num, event.data);
//!     }
//!     Ok(())
//! }
//! ```

pub mod collections;
pub mod config;
pub mod error;
pub mod storage;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use collections::{
    DescriptorCollection, DocumentCollection, JsonCollection, MetadataStore, RunStartCollection,
};
pub use config::StoreConfig;
pub use error::{ReferenceKind, StoreError, StoreResult};
pub use storage::{EventCollection, EventCursor, InsertSummary, RecoveryReport, SortKey};
pub use types::{Descriptor, Event, RunStart, RunStop};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
