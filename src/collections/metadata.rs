//! Metadata store: one base directory, all four collections
//!
//! Collections are built lazily on first use. Replacing the configuration
//! drops every collection and every open unit connection, so the next
//! access recovers from the new directory.

use std::fs;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::info;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::storage::{EventCollection, InsertSummary, SortKey};
use crate::types::{Descriptor, Event, RunStart, RunStop};
use crate::utils::cleanup_temp_files;

use super::control::{DescriptorCollection, RunStartCollection, SharedEvents};
use super::document::{DocumentCollection, JsonCollection, DEFAULT_KEY_FIELD};

pub struct MetadataStore {
    config: StoreConfig,
    events: Option<SharedEvents>,
    run_starts: Option<RunStartCollection>,
    run_stops: Option<JsonCollection>,
    descriptors: Option<DescriptorCollection>,
}

impl MetadataStore {
    /// Create a store over `config.directory`, creating the directory
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        prepare_directory(&config)?;
        Ok(Self {
            config,
            events: None,
            run_starts: None,
            run_stops: None,
            descriptors: None,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Point the store at a new configuration
    ///
    /// Cached collections and unit connections are dropped.
    pub fn set_config(&mut self, config: StoreConfig) -> StoreResult<()> {
        prepare_directory(&config)?;
        info!(directory = %config.directory().display(), "metadata store reconfigured");
        self.config = config;
        self.events = None;
        self.run_starts = None;
        self.run_stops = None;
        self.descriptors = None;
        Ok(())
    }

    /// The shared event collection, recovered on first access
    pub fn events(&mut self) -> StoreResult<SharedEvents> {
        if let Some(events) = &self.events {
            return Ok(Arc::clone(events));
        }
        let events = Arc::new(Mutex::new(EventCollection::open(&self.config)?));
        self.events = Some(Arc::clone(&events));
        Ok(events)
    }

    fn run_starts(&mut self) -> StoreResult<&mut RunStartCollection> {
        let collection = match self.run_starts.take() {
            Some(collection) => collection,
            None => {
                let events = self.events()?;
                let store = JsonCollection::open(self.config.run_starts_path())?;
                RunStartCollection::new(events, store)
            }
        };
        Ok(self.run_starts.insert(collection))
    }

    fn run_stops(&mut self) -> StoreResult<&mut JsonCollection> {
        let collection = match self.run_stops.take() {
            Some(collection) => collection,
            None => JsonCollection::open(self.config.run_stops_path())?,
        };
        Ok(self.run_stops.insert(collection))
    }

    fn descriptors(&mut self) -> StoreResult<&mut DescriptorCollection> {
        let collection = match self.descriptors.take() {
            Some(collection) => collection,
            None => {
                let events = self.events()?;
                let store = JsonCollection::open(self.config.descriptors_path())?;
                DescriptorCollection::new(events, store)
            }
        };
        Ok(self.descriptors.insert(collection))
    }

    pub fn insert_run_start(&mut self, doc: &RunStart) -> StoreResult<()> {
        self.run_starts()?.insert_one(doc)
    }

    /// Store a run stop; its run start must already be stored
    pub fn insert_run_stop(&mut self, doc: &RunStop) -> StoreResult<()> {
        if self.run_start(&doc.run_start)?.is_none() {
            return Err(StoreError::unknown_run(&doc.run_start));
        }
        let value = serde_json::to_value(doc)?;
        self.run_stops()?.insert_one(value, DEFAULT_KEY_FIELD)
    }

    pub fn insert_descriptor(&mut self, doc: &Descriptor) -> StoreResult<()> {
        self.descriptors()?.insert_one(doc)
    }

    pub fn insert_event(&mut self, doc: &Event) -> StoreResult<()> {
        self.events()?.lock().insert_one(doc)
    }

    pub fn insert_events(&mut self, docs: &[Event]) -> StoreResult<InsertSummary> {
        self.events()?.lock().insert_many(docs)
    }

    /// Events of one descriptor, optionally sorted
    pub fn find_events(
        &mut self,
        descriptor_uid: &str,
        sort: Option<&[SortKey]>,
    ) -> StoreResult<Vec<Event>> {
        let shared = self.events()?;
        let mut events = shared.lock();
        events
            .find(&json!({ "descriptor": descriptor_uid }), sort)?
            .into_events()
    }

    pub fn run_start(&mut self, uid: &str) -> StoreResult<Option<RunStart>> {
        let found = self.run_starts()?.find_one(&json!({ "uid": uid }))?;
        decode_optional(found)
    }

    pub fn run_stop_for(&mut self, run_uid: &str) -> StoreResult<Option<RunStop>> {
        let found = self.run_stops()?.find_one(&json!({ "run_start": run_uid }))?;
        decode_optional(found)
    }

    pub fn descriptor(&mut self, uid: &str) -> StoreResult<Option<Descriptor>> {
        let found = self.descriptors()?.find_one(&json!({ "uid": uid }))?;
        decode_optional(found)
    }

    pub fn descriptors_for_run(&mut self, run_uid: &str) -> StoreResult<Vec<Descriptor>> {
        self.descriptors()?
            .find(&json!({ "run_start": run_uid }))?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(StoreError::from))
            .collect()
    }
}

fn prepare_directory(config: &StoreConfig) -> StoreResult<()> {
    fs::create_dir_all(config.directory())?;
    cleanup_temp_files(config.directory())?;
    Ok(())
}

fn decode_optional<T: serde::de::DeserializeOwned>(doc: Option<Value>) -> StoreResult<Option<T>> {
    doc.map(serde_json::from_value)
        .transpose()
        .map_err(StoreError::from)
}
