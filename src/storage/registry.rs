//! Event collection: the registry of per-run storage units
//!
//! Owns the run → unit and descriptor → run indexes. Neither index is
//! persisted separately: the unit files in the base directory and their
//! table catalogs are the durable index, and `recover()` rebuilds both maps
//! from them.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::types::Value as SqlValue;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::types::{Descriptor, Event, RunStart};

use super::cache::UnitCache;
use super::codec::{self, parse_unit_file_name, table_name, unit_file_name};
use super::query::{descriptor_filter, order_by_clause, EventCursor, SortKey};
use super::rows::encode_event;
use super::schema::ColumnLayout;
use super::unit::StorageUnit;

/// What `recover()` found in the base directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub runs: usize,
    pub descriptors: usize,
    /// Directory entries that did not look like unit files
    pub skipped: usize,
    /// Descriptor uids whose table exists in more than one unit
    pub conflicts: Vec<String>,
}

/// Rows written per descriptor by `insert_many`, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertSummary {
    pub groups: Vec<(String, usize)>,
}

impl InsertSummary {
    /// Total rows written
    pub fn total(&self) -> usize {
        self.groups.iter().map(|(_, n)| n).sum()
    }
}

/// Registry of storage units and the event collection API over them
pub struct EventCollection {
    directory: PathBuf,
    /// Every known run and its unit file
    runs: HashMap<String, PathBuf>,
    /// Descriptor uid → owning run uid
    descriptors: HashMap<String, String>,
    /// Column layouts resolved so far, by descriptor uid
    layouts: HashMap<String, ColumnLayout>,
    units: UnitCache,
}

impl EventCollection {
    /// Open the collection over `config.directory`, creating it if needed,
    /// and recover the indexes from what is already there
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        fs::create_dir_all(config.directory())?;

        let mut collection = Self {
            directory: config.directory().to_path_buf(),
            runs: HashMap::new(),
            descriptors: HashMap::new(),
            layouts: HashMap::new(),
            units: UnitCache::new(config.max_open_units),
        };
        collection.recover()?;
        Ok(collection)
    }

    /// Rebuild the run and descriptor indexes by scanning the directory
    ///
    /// Files that do not follow the unit naming convention are skipped.
    /// Tables that do not follow the descriptor convention are ignored.
    /// A descriptor table found in more than one unit stays with the first
    /// unit in file name order and is listed in `conflicts`. On error the
    /// previous indexes are left in place.
    pub fn recover(&mut self) -> StoreResult<RecoveryReport> {
        let mut report = RecoveryReport::default();
        let mut runs = HashMap::new();
        let mut descriptors: HashMap<String, String> = HashMap::new();
        let mut units = UnitCache::new(self.units.capacity());

        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                entries.push(entry.path());
            }
        }
        entries.sort();

        for path in entries {
            let run_uid = match path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_unit_file_name)
            {
                Some(uid) => uid,
                None => {
                    debug!(path = %path.display(), "skipping unrecognized file");
                    report.skipped += 1;
                    continue;
                }
            };

            let unit = StorageUnit::open(&run_uid, &path)?;
            for descriptor_uid in unit.descriptor_uids()? {
                if let Some(owner) = descriptors.get(&descriptor_uid) {
                    warn!(
                        descriptor = %descriptor_uid,
                        kept = %owner,
                        ignored = %run_uid,
                        "descriptor table present in more than one unit"
                    );
                    report.conflicts.push(descriptor_uid);
                    continue;
                }
                descriptors.insert(descriptor_uid, run_uid.clone());
                report.descriptors += 1;
            }
            runs.insert(run_uid, path);
            units.insert(unit);
            report.runs += 1;
        }

        self.runs = runs;
        self.descriptors = descriptors;
        self.layouts.clear();
        self.units = units;

        info!(
            runs = report.runs,
            descriptors = report.descriptors,
            skipped = report.skipped,
            conflicts = report.conflicts.len(),
            directory = %self.directory.display(),
            "recovered event collection"
        );
        Ok(report)
    }

    /// Register a run and open its storage unit
    ///
    /// Creating an already registered run is a no-op. An unregistered run
    /// whose file already exists reuses that file.
    pub fn create_run(&mut self, doc: &RunStart) -> StoreResult<()> {
        codec::validate_uid(&doc.uid)?;
        if self.runs.contains_key(&doc.uid) {
            debug!(run = %doc.uid, "run already registered");
            return Ok(());
        }

        let path = self.unit_path(&doc.uid);
        let unit = StorageUnit::open(&doc.uid, &path)?;
        self.units.insert(unit);
        self.runs.insert(doc.uid.clone(), path);

        info!(run = %doc.uid, "created run");
        Ok(())
    }

    /// Create the descriptor's table inside its run's unit
    pub fn create_descriptor(&mut self, doc: &Descriptor) -> StoreResult<()> {
        codec::validate_uid(&doc.uid)?;
        if !self.runs.contains_key(&doc.run_start) {
            return Err(StoreError::unknown_run(&doc.run_start));
        }
        if let Some(owner) = self.descriptors.get(&doc.uid) {
            return Err(StoreError::DuplicateKey(format!(
                "descriptor {} already exists in run {}",
                doc.uid, owner
            )));
        }

        let layout = ColumnLayout::from_keys(doc.key_names())?;
        let table = table_name(&doc.uid);
        self.unit(&doc.run_start)?.create_table(&table, &layout)?;

        self.descriptors.insert(doc.uid.clone(), doc.run_start.clone());
        self.layouts.insert(doc.uid.clone(), layout);

        info!(
            descriptor = %doc.uid,
            run = %doc.run_start,
            keys = doc.data_keys.len(),
            "created descriptor table"
        );
        Ok(())
    }

    /// Find the events of one descriptor
    ///
    /// `filter` must be exactly `{"descriptor": <uid>}`. Without `sort` the
    /// events come back in insertion (physical row) order.
    pub fn find(&mut self, filter: &Value, sort: Option<&[SortKey]>) -> StoreResult<EventCursor> {
        let descriptor_uid = descriptor_filter(filter)?.to_string();
        let run_uid = self.run_of_descriptor(&descriptor_uid)?.to_string();
        let layout = self.layout(&descriptor_uid)?;
        let order_by = order_by_clause(&layout, sort.unwrap_or(&[]))?;

        let rows = self
            .unit(&run_uid)?
            .select_rows(&table_name(&descriptor_uid), &layout, &order_by)?;

        debug!(descriptor = %descriptor_uid, rows = rows.len(), "read events");
        Ok(EventCursor::new(descriptor_uid, layout, rows))
    }

    /// Events have no unique lookup; use `find`
    pub fn find_one(&mut self, filter: &Value) -> StoreResult<Option<Event>> {
        Err(StoreError::UnsupportedQuery(format!(
            "find_one is not supported on events (filter {})",
            filter
        )))
    }

    /// Append one event to its descriptor's table
    pub fn insert_one(&mut self, doc: &Event) -> StoreResult<()> {
        let run_uid = self.run_of_descriptor(&doc.descriptor)?.to_string();
        let layout = self.layout(&doc.descriptor)?;
        let row = encode_event(doc, &layout)?;

        self.unit(&run_uid)?
            .insert_rows(&table_name(&doc.descriptor), &layout, &[row])?;
        debug!(event = %doc.uid, descriptor = %doc.descriptor, "inserted event");
        Ok(())
    }

    /// Append a batch of events, one transaction per descriptor
    ///
    /// The whole batch is validated before anything is written. Groups
    /// are then committed one at a time in first-seen order, so a storage
    /// failure in a later group leaves earlier groups committed.
    pub fn insert_many(&mut self, docs: &[Event]) -> StoreResult<InsertSummary> {
        struct Group {
            descriptor: String,
            run: String,
            layout: ColumnLayout,
            rows: Vec<Vec<SqlValue>>,
        }

        let mut groups: Vec<Group> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for doc in docs {
            let slot = match index.get(&doc.descriptor) {
                Some(&slot) => slot,
                None => {
                    let run = self.run_of_descriptor(&doc.descriptor)?.to_string();
                    let layout = self.layout(&doc.descriptor)?;
                    groups.push(Group {
                        descriptor: doc.descriptor.clone(),
                        run,
                        layout,
                        rows: Vec::new(),
                    });
                    index.insert(doc.descriptor.clone(), groups.len() - 1);
                    groups.len() - 1
                }
            };
            let group = &mut groups[slot];
            group.rows.push(encode_event(doc, &group.layout)?);
        }

        let mut summary = InsertSummary::default();
        for group in groups {
            let written = self.unit(&group.run)?.insert_rows(
                &table_name(&group.descriptor),
                &group.layout,
                &group.rows,
            )?;
            debug!(descriptor = %group.descriptor, rows = written, "inserted event batch");
            summary.groups.push((group.descriptor, written));
        }
        Ok(summary)
    }

    /// Base directory holding the unit files
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Known run uids, sorted
    pub fn run_uids(&self) -> Vec<String> {
        let mut uids: Vec<String> = self.runs.keys().cloned().collect();
        uids.sort();
        uids
    }

    /// Known descriptor uids, sorted
    pub fn descriptor_uids(&self) -> Vec<String> {
        let mut uids: Vec<String> = self.descriptors.keys().cloned().collect();
        uids.sort();
        uids
    }

    /// Descriptor uids registered under one run, sorted
    pub fn descriptors_of_run(&self, run_uid: &str) -> Vec<String> {
        let mut uids: Vec<String> = self
            .descriptors
            .iter()
            .filter(|(_, run)| run.as_str() == run_uid)
            .map(|(uid, _)| uid.clone())
            .collect();
        uids.sort();
        uids
    }

    /// Run owning a descriptor
    pub fn run_of_descriptor(&self, descriptor_uid: &str) -> StoreResult<&str> {
        self.descriptors
            .get(descriptor_uid)
            .map(String::as_str)
            .ok_or_else(|| StoreError::unknown_descriptor(descriptor_uid))
    }

    pub fn has_run(&self, run_uid: &str) -> bool {
        self.runs.contains_key(run_uid)
    }

    /// Number of currently open unit connections
    pub fn open_unit_count(&self) -> usize {
        self.units.len()
    }

    /// Number of events stored for a descriptor
    pub fn count(&mut self, descriptor_uid: &str) -> StoreResult<u64> {
        let run_uid = self.run_of_descriptor(descriptor_uid)?.to_string();
        self.unit(&run_uid)?.row_count(&table_name(descriptor_uid))
    }

    fn unit_path(&self, run_uid: &str) -> PathBuf {
        self.directory.join(unit_file_name(run_uid))
    }

    fn unit(&mut self, run_uid: &str) -> StoreResult<&mut StorageUnit> {
        let path = self
            .runs
            .get(run_uid)
            .ok_or_else(|| StoreError::unknown_run(run_uid))?;
        self.units.get_or_open(run_uid, path)
    }

    /// Column layout of a descriptor's table, read from the catalog once
    fn layout(&mut self, descriptor_uid: &str) -> StoreResult<ColumnLayout> {
        if let Some(layout) = self.layouts.get(descriptor_uid) {
            return Ok(layout.clone());
        }

        let run_uid = self.run_of_descriptor(descriptor_uid)?.to_string();
        let columns = self
            .unit(&run_uid)?
            .table_columns(&table_name(descriptor_uid))?;
        if columns.is_empty() {
            return Err(StoreError::unknown_descriptor(descriptor_uid));
        }

        let layout = ColumnLayout::from_columns(&columns)?;
        self.layouts
            .insert(descriptor_uid.to_string(), layout.clone());
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> EventCollection {
        EventCollection::open(&StoreConfig::new(dir.path())).unwrap()
    }

    fn event(uid: &str, descriptor: &str, seq_num: i64) -> Event {
        Event::new(uid, descriptor, seq_num, 100.0 + seq_num as f64)
            .with_reading("x", json!(seq_num), 10.0)
    }

    #[test]
    fn test_create_run_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut events = open(&dir);

        events.create_run(&RunStart::new("r-1")).unwrap();
        events.create_run(&RunStart::new("r-1")).unwrap();

        assert_eq!(events.run_uids(), vec!["r-1"]);
        assert!(dir.path().join("r_1.sqlite").exists());
    }

    #[test]
    fn test_create_run_rejects_bad_uid() {
        let dir = TempDir::new().unwrap();
        let mut events = open(&dir);

        let err = events.create_run(&RunStart::new("r_1")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidIdentifier(_)));
        assert!(events.run_uids().is_empty());
    }

    #[test]
    fn test_descriptor_requires_known_run() {
        let dir = TempDir::new().unwrap();
        let mut events = open(&dir);

        let err = events
            .create_descriptor(&Descriptor::new("d-1", "r-1").with_keys(["x"]))
            .unwrap_err();
        assert!(err.is_unknown_reference());
        assert!(events.descriptor_uids().is_empty());
    }

    #[test]
    fn test_duplicate_descriptor_keeps_registry() {
        let dir = TempDir::new().unwrap();
        let mut events = open(&dir);
        events.create_run(&RunStart::new("r-1")).unwrap();
        events
            .create_descriptor(&Descriptor::new("d-1", "r-1").with_keys(["x"]))
            .unwrap();

        events.insert_one(&event("e-1", "d-1", 1)).unwrap();
        events.create_run(&RunStart::new("r-2")).unwrap();

        for run in ["r-1", "r-2"] {
            let err = events
                .create_descriptor(&Descriptor::new("d-1", run).with_keys(["y"]))
                .unwrap_err();
            assert!(matches!(err, StoreError::DuplicateKey(_)), "{}", run);
        }

        assert_eq!(events.run_of_descriptor("d-1").unwrap(), "r-1");
        assert_eq!(events.count("d-1").unwrap(), 1);
        events.insert_one(&event("e-2", "d-1", 2)).unwrap();
        assert_eq!(events.count("d-1").unwrap(), 2);

        // Nothing was created in the other run's unit
        let r2 = rusqlite::Connection::open(dir.path().join("r_2.sqlite")).unwrap();
        let tables: i64 = r2
            .query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get(0))
            .unwrap();
        assert_eq!(tables, 0);
    }

    #[test]
    fn test_unregistered_existing_table_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let mut events = open(&dir);
        events.create_run(&RunStart::new("r-1")).unwrap();

        let raw = rusqlite::Connection::open(dir.path().join("r_1.sqlite")).unwrap();
        raw.execute_batch("CREATE TABLE \"desc_d_9\" (\"uid\")").unwrap();
        drop(raw);

        let err = events
            .create_descriptor(&Descriptor::new("d-9", "r-1").with_keys(["x"]))
            .unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
        assert!(events.descriptor_uids().is_empty());
    }

    #[test]
    fn test_recover_reports_descriptor_in_two_units() {
        let dir = TempDir::new().unwrap();
        {
            let mut events = open(&dir);
            events.create_run(&RunStart::new("r-1")).unwrap();
            events.create_run(&RunStart::new("r-2")).unwrap();
            events
                .create_descriptor(&Descriptor::new("d-1", "r-1").with_keys(["x"]))
                .unwrap();
            events.insert_one(&event("e-1", "d-1", 1)).unwrap();
        }

        // Same table planted in the second unit behind the registry's back
        let raw = rusqlite::Connection::open(dir.path().join("r_2.sqlite")).unwrap();
        raw.execute_batch(&ColumnLayout::from_keys(["x"]).unwrap().create_table_sql("desc_d_1"))
            .unwrap();
        drop(raw);

        let mut events = open(&dir);
        let report = events.recover().unwrap();
        assert_eq!(report.runs, 2);
        assert_eq!(report.descriptors, 1);
        assert_eq!(report.conflicts, vec!["d-1".to_string()]);
        assert_eq!(events.run_of_descriptor("d-1").unwrap(), "r-1");
        assert_eq!(events.count("d-1").unwrap(), 1);
    }

    #[test]
    fn test_failed_recover_keeps_previous_indexes() {
        let dir = TempDir::new().unwrap();
        let mut events = open(&dir);
        events.create_run(&RunStart::new("r-1")).unwrap();
        events
            .create_descriptor(&Descriptor::new("d-1", "r-1").with_keys(["x"]))
            .unwrap();
        events.insert_one(&event("e-1", "d-1", 1)).unwrap();

        // Sorts after r_1.sqlite, so the scan fails partway through
        fs::write(dir.path().join("zz.sqlite"), vec![0xAB; 4096]).unwrap();

        assert!(events.recover().is_err());
        assert_eq!(events.run_uids(), vec!["r-1"]);
        assert_eq!(events.run_of_descriptor("d-1").unwrap(), "r-1");
        assert_eq!(events.count("d-1").unwrap(), 1);
    }

    #[test]
    fn test_insert_one_validates_keys() {
        let dir = TempDir::new().unwrap();
        let mut events = open(&dir);
        events.create_run(&RunStart::new("r-1")).unwrap();
        events
            .create_descriptor(&Descriptor::new("d-1", "r-1").with_keys(["x", "y"]))
            .unwrap();

        let err = events.insert_one(&event("e-1", "d-1", 1)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument(_)));
        assert_eq!(events.count("d-1").unwrap(), 0);
    }

    #[test]
    fn test_insert_unknown_descriptor() {
        let dir = TempDir::new().unwrap();
        let mut events = open(&dir);

        let err = events.insert_one(&event("e-1", "d-9", 1)).unwrap_err();
        assert!(err.is_unknown_reference());
    }

    #[test]
    fn test_find_one_unsupported() {
        let dir = TempDir::new().unwrap();
        let mut events = open(&dir);
        let err = events.find_one(&json!({"descriptor": "d-1"})).unwrap_err();
        assert!(err.is_unsupported_query());
    }

    #[test]
    fn test_insert_many_validates_before_writing() {
        let dir = TempDir::new().unwrap();
        let mut events = open(&dir);
        events.create_run(&RunStart::new("r-1")).unwrap();
        events
            .create_descriptor(&Descriptor::new("d-1", "r-1").with_keys(["x"]))
            .unwrap();

        let batch = vec![event("e-1", "d-1", 1), event("e-2", "d-unknown", 2)];
        let err = events.insert_many(&batch).unwrap_err();
        assert!(err.is_unknown_reference());
        assert_eq!(events.count("d-1").unwrap(), 0);
    }

    #[test]
    fn test_insert_many_empty_batch() {
        let dir = TempDir::new().unwrap();
        let mut events = open(&dir);
        let summary = events.insert_many(&[]).unwrap();
        assert_eq!(summary, InsertSummary::default());
        assert_eq!(summary.total(), 0);
    }

    #[test]
    fn test_find_with_sort() {
        let dir = TempDir::new().unwrap();
        let mut events = open(&dir);
        events.create_run(&RunStart::new("r-1")).unwrap();
        events
            .create_descriptor(&Descriptor::new("d-1", "r-1").with_keys(["x"]))
            .unwrap();
        events
            .insert_many(&[event("e-2", "d-1", 2), event("e-1", "d-1", 1), event("e-3", "d-1", 3)])
            .unwrap();

        let physical: Vec<String> = events
            .find(&json!({"descriptor": "d-1"}), None)
            .unwrap()
            .map(|e| e.unwrap().uid)
            .collect();
        assert_eq!(physical, vec!["e-2", "e-1", "e-3"]);

        let sorted: Vec<i64> = events
            .find(&json!({"descriptor": "d-1"}), Some(&[SortKey::desc("seq_num")]))
            .unwrap()
            .map(|e| e.unwrap().seq_num)
            .collect();
        assert_eq!(sorted, vec![3, 2, 1]);

        let err = events
            .find(&json!({"descriptor": "d-1"}), Some(&[SortKey::asc("data.missing")]))
            .unwrap_err();
        assert!(err.is_unsupported_query());
    }

    #[test]
    fn test_bounded_unit_cache() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(dir.path()).with_max_open_units(2);
        let mut events = EventCollection::open(&config).unwrap();

        for run in ["r-1", "r-2", "r-3"] {
            events.create_run(&RunStart::new(run)).unwrap();
            let desc = format!("d{}", run);
            events
                .create_descriptor(&Descriptor::new(desc.as_str(), run).with_keys(["x"]))
                .unwrap();
        }
        assert_eq!(events.open_unit_count(), 2);

        // r-1's unit was evicted; writing to it reopens the file
        events.insert_one(&event("e-1", "dr-1", 1)).unwrap();
        assert_eq!(events.open_unit_count(), 2);
        assert_eq!(events.count("dr-1").unwrap(), 1);
    }

    #[test]
    fn test_recover_skips_unrecognized_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        fs::write(dir.path().join("run_starts.json"), "").unwrap();

        let mut events = open(&dir);
        events.create_run(&RunStart::new("r-1")).unwrap();

        let report = events.recover().unwrap();
        assert_eq!(
            report,
            RecoveryReport {
                runs: 1,
                descriptors: 0,
                skipped: 2,
                conflicts: Vec::new()
            }
        );
    }
}
