//! Control-plane adapters
//!
//! Run start and descriptor writes have a side effect on the event
//! collection (a new unit, a new table). The adapters run that side effect
//! first and only then write the document to the metadata collection, so a
//! registry failure never leaves a stored-but-unregistered document.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::StoreResult;
use crate::storage::EventCollection;
use crate::types::{Descriptor, RunStart};

use super::document::{DocumentCollection, JsonCollection, DEFAULT_KEY_FIELD};

/// Event collection shared by the adapters of one metadata store
pub type SharedEvents = Arc<Mutex<EventCollection>>;

/// Run start documents; each insert creates the run's storage unit
pub struct RunStartCollection<C = JsonCollection> {
    events: SharedEvents,
    store: C,
}

impl<C: DocumentCollection> RunStartCollection<C> {
    pub fn new(events: SharedEvents, store: C) -> Self {
        Self { events, store }
    }

    /// Create the run's unit, then store the document keyed by `uid`
    pub fn insert_one(&mut self, doc: &RunStart) -> StoreResult<()> {
        let value = serde_json::to_value(doc)?;
        self.events.lock().create_run(doc)?;
        self.store.insert_one(value, DEFAULT_KEY_FIELD)
    }

    pub fn find(&self, filter: &Value) -> StoreResult<Vec<Value>> {
        self.store.find(filter)
    }

    pub fn find_one(&self, filter: &Value) -> StoreResult<Option<Value>> {
        self.store.find_one(filter)
    }

    /// Underlying document collection
    pub fn store(&self) -> &C {
        &self.store
    }
}

/// Descriptor documents; each insert creates the descriptor's table
pub struct DescriptorCollection<C = JsonCollection> {
    events: SharedEvents,
    store: C,
}

impl<C: DocumentCollection> DescriptorCollection<C> {
    pub fn new(events: SharedEvents, store: C) -> Self {
        Self { events, store }
    }

    /// Create the descriptor's table, then store the document
    pub fn insert_one(&mut self, doc: &Descriptor) -> StoreResult<()> {
        let value = serde_json::to_value(doc)?;
        self.events.lock().create_descriptor(doc)?;
        self.store.insert_one(value, DEFAULT_KEY_FIELD)
    }

    pub fn find(&self, filter: &Value) -> StoreResult<Vec<Value>> {
        self.store.find(filter)
    }

    pub fn find_one(&self, filter: &Value) -> StoreResult<Option<Value>> {
        self.store.find_one(filter)
    }

    pub fn store(&self) -> &C {
        &self.store
    }
}
