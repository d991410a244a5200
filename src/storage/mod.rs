//! Relational storage for events
//!
//! - `codec`: uid ↔ identifier transliteration, file and table naming
//! - `schema`: column layout of descriptor tables
//! - `rows`: event ↔ row mapping
//! - `transaction`: commit-or-rollback scope
//! - `unit`: one SQLite connection per run
//! - `cache`: bounded set of open units
//! - `query`: descriptor filter, sort keys, event cursor
//! - `registry`: `EventCollection`, the run/descriptor registry
//!
//! # Layout
//!
//! ```text
//! <dir>/
//! ├── <run_uid>.sqlite          one unit per run
//! │   ├── desc_<descriptor_uid>  one table per descriptor
//! │   └── ...
//! ├── run_starts.json
//! ├── run_stops.json
//! └── event_descriptors.json
//! ```
//!
//! Hyphens in uids become underscores in file and table names.

pub mod cache;
pub mod codec;
pub mod query;
pub mod registry;
pub mod rows;
pub mod schema;
pub mod transaction;
pub mod unit;

pub use cache::UnitCache;
pub use query::{Direction, EventCursor, SortKey};
pub use registry::{EventCollection, InsertSummary, RecoveryReport};
pub use schema::{columns, ColumnLayout};
pub use transaction::with_transaction;
pub use unit::StorageUnit;
