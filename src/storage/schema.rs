//! Schema builder for descriptor tables
//!
//! A descriptor's `data_keys` fix its table's columns:
//!
//! ```text
//! uid, seq_num, time, data_<k1>..data_<kn>, timestamps_<k1>..timestamps_<kn>
//! ```
//!
//! with keys in lexicographic (byte) order. Encoding and decoding of rows
//! both rely on this positional alignment, so the same key set must always
//! produce the same column sequence.

use std::collections::{BTreeSet, HashSet};

use crate::error::{StoreError, StoreResult};

use super::codec::quote;

/// Leading columns present in every descriptor table
pub const FIXED_COLUMNS: [&str; 3] = ["uid", "seq_num", "time"];

pub const DATA_PREFIX: &str = "data_";
pub const TIMESTAMPS_PREFIX: &str = "timestamps_";

/// Ordered column list for a set of data keys
pub fn columns<I, S>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let sorted: BTreeSet<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();

    FIXED_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(sorted.iter().map(|k| format!("{}{}", DATA_PREFIX, k)))
        .chain(sorted.iter().map(|k| format!("{}{}", TIMESTAMPS_PREFIX, k)))
        .collect()
}

fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidDocument("data key is empty".to_string()));
    }
    if key.contains('\0') {
        return Err(StoreError::InvalidDocument(format!(
            "data key {:?} contains NUL",
            key
        )));
    }
    Ok(())
}

/// Sorted keys and the matching column names of one descriptor table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    keys: Vec<String>,
    columns: Vec<String>,
}

impl ColumnLayout {
    /// Build the layout for a descriptor's declared keys
    pub fn from_keys<I, S>(keys: I) -> StoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: BTreeSet<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();
        // SQLite column names are case-insensitive for ASCII letters
        let mut folded = HashSet::with_capacity(keys.len());
        for key in &keys {
            validate_key(key)?;
            if !folded.insert(key.to_ascii_lowercase()) {
                return Err(StoreError::InvalidDocument(format!(
                    "data key {:?} differs from another key only by case",
                    key
                )));
            }
        }
        let columns = columns(&keys);
        Ok(Self {
            keys: keys.into_iter().collect(),
            columns,
        })
    }

    /// Rebuild the layout from a table's stored column list
    ///
    /// Used after recovery, when only the table catalog is available.
    pub fn from_columns(stored: &[String]) -> StoreResult<Self> {
        let malformed = || {
            StoreError::InvalidDocument(format!("unexpected table layout: {:?}", stored))
        };

        if stored.len() < FIXED_COLUMNS.len()
            || stored.iter().zip(FIXED_COLUMNS).any(|(a, b)| a != b)
        {
            return Err(malformed());
        }

        let rest = &stored[FIXED_COLUMNS.len()..];
        if rest.len() % 2 != 0 {
            return Err(malformed());
        }
        let (data, timestamps) = rest.split_at(rest.len() / 2);

        let mut keys = Vec::with_capacity(data.len());
        for (d, t) in data.iter().zip(timestamps) {
            let key = d.strip_prefix(DATA_PREFIX).ok_or_else(malformed)?;
            if t.strip_prefix(TIMESTAMPS_PREFIX) != Some(key) {
                return Err(malformed());
            }
            keys.push(key.to_string());
        }

        let layout = Self::from_keys(&keys)?;
        if layout.columns != stored {
            return Err(malformed());
        }
        Ok(layout)
    }

    /// Data keys in column order
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Column names in table order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Whether the table has a column with this exact name
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Comma separated, quoted column list
    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| quote(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `CREATE TABLE` statement for this layout
    pub fn create_table_sql(&self, table: &str) -> String {
        format!("CREATE TABLE {} ({})", quote(table), self.column_list())
    }

    /// Single-row `INSERT` statement with numbered placeholders
    pub fn insert_sql(&self, table: &str) -> String {
        let placeholders = (1..=self.columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(table),
            self.column_list(),
            placeholders
        )
    }
}
