//! Document collections
//!
//! - `document`: the keyed JSON collection boundary and its file backend
//! - `control`: run start / descriptor adapters over the event collection
//! - `metadata`: the facade wiring all collections to one directory

mod control;
mod document;
mod metadata;

pub use control::{DescriptorCollection, RunStartCollection, SharedEvents};
pub use document::{DocumentCollection, JsonCollection, DEFAULT_KEY_FIELD};
pub use metadata::MetadataStore;
