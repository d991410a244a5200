//! Generic keyed document collections
//!
//! Control-plane metadata (run starts, run stops, descriptors) lives in
//! flat JSON collections next to the unit files. `DocumentCollection` is the
//! boundary the control-plane adapters write through; `JsonCollection` is
//! the file-backed implementation.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::utils::atomic_write_with;

/// Field documents are keyed by unless a collection says otherwise
pub const DEFAULT_KEY_FIELD: &str = "uid";

/// A keyed collection of JSON documents
pub trait DocumentCollection {
    /// Persist `doc` keyed by `key_field`; fails on a duplicate key
    fn insert_one(&mut self, doc: Value, key_field: &str) -> StoreResult<()>;

    /// Documents whose top-level fields equal every field of `filter`
    fn find(&self, filter: &Value) -> StoreResult<Vec<Value>>;

    /// First document matching `filter`
    fn find_one(&self, filter: &Value) -> StoreResult<Option<Value>> {
        Ok(self.find(filter)?.into_iter().next())
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn matches_filter(doc: &Value, filter: &serde_json::Map<String, Value>) -> bool {
    filter.iter().all(|(k, v)| doc.get(k) == Some(v))
}

/// JSON-lines file holding one document per line
///
/// The whole file is loaded on open and rewritten atomically on insert.
#[derive(Debug)]
pub struct JsonCollection {
    path: PathBuf,
    docs: Vec<Value>,
}

impl JsonCollection {
    /// Open the collection at `path`, loading any existing documents
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut docs = Vec::new();

        if path.exists() {
            let content = fs::read_to_string(&path)?;
            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                docs.push(serde_json::from_str(line)?);
            }
        }

        debug!(path = %path.display(), docs = docs.len(), "opened json collection");
        Ok(Self { path, docs })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All documents in insertion order
    pub fn all(&self) -> &[Value] {
        &self.docs
    }

    fn persist(&self) -> StoreResult<()> {
        atomic_write_with(&self.path, |file| {
            for doc in &self.docs {
                let line = serde_json::to_string(doc)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                writeln!(file, "{}", line)?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

impl DocumentCollection for JsonCollection {
    fn insert_one(&mut self, doc: Value, key_field: &str) -> StoreResult<()> {
        if !doc.is_object() {
            return Err(StoreError::InvalidDocument(format!(
                "documents must be JSON objects, got {}",
                doc
            )));
        }
        let key = match doc.get(key_field) {
            Some(Value::Null) | None => {
                return Err(StoreError::InvalidDocument(format!(
                    "document has no '{}' field",
                    key_field
                )))
            }
            Some(key) => key.clone(),
        };
        if self.docs.iter().any(|d| d.get(key_field) == Some(&key)) {
            return Err(StoreError::DuplicateKey(format!("{}={}", key_field, key)));
        }

        self.docs.push(doc);
        if let Err(e) = self.persist() {
            self.docs.pop();
            return Err(e);
        }
        Ok(())
    }

    fn find(&self, filter: &Value) -> StoreResult<Vec<Value>> {
        let filter = filter.as_object().ok_or_else(|| {
            StoreError::UnsupportedQuery(format!("filter must be a JSON object, got {}", filter))
        })?;
        Ok(self
            .docs
            .iter()
            .filter(|doc| matches_filter(doc, filter))
            .cloned()
            .collect())
    }

    fn len(&self) -> usize {
        self.docs.len()
    }
}
