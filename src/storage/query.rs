//! Event query shapes: the descriptor filter, sort keys and the event cursor

use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::types::Event;

use super::rows::decode_event;
use super::schema::{ColumnLayout, DATA_PREFIX, FIXED_COLUMNS, TIMESTAMPS_PREFIX};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    fn sql(&self) -> &'static str {
        match self {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }
}

/// One sort criterion: a document field path and a direction
///
/// Field paths are `uid`, `seq_num`, `time`, `data.<key>` or
/// `timestamps.<key>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: Direction,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }

    /// Parse `field` or `field:asc` / `field:desc`
    pub fn parse(text: &str) -> StoreResult<Self> {
        let (field, direction) = match text.rsplit_once(':') {
            Some((field, "asc")) => (field, Direction::Ascending),
            Some((field, "desc")) => (field, Direction::Descending),
            Some(_) => {
                return Err(StoreError::UnsupportedQuery(format!(
                    "sort direction in '{}' must be asc or desc",
                    text
                )))
            }
            None => (text, Direction::Ascending),
        };
        if field.is_empty() {
            return Err(StoreError::UnsupportedQuery("empty sort field".to_string()));
        }
        Ok(Self {
            field: field.to_string(),
            direction,
        })
    }

    /// Column this key sorts on, if the field path is one of the document's
    fn column(&self) -> Option<String> {
        if let Some(key) = self.field.strip_prefix("data.") {
            Some(format!("{}{}", DATA_PREFIX, key))
        } else if let Some(key) = self.field.strip_prefix("timestamps.") {
            Some(format!("{}{}", TIMESTAMPS_PREFIX, key))
        } else if FIXED_COLUMNS.contains(&self.field.as_str()) {
            Some(self.field.clone())
        } else {
            None
        }
    }
}

/// Extract the descriptor uid from a `{"descriptor": <uid>}` filter
///
/// Any other shape is rejected; nothing else can be answered without a
/// full scan of every unit.
pub fn descriptor_filter(filter: &Value) -> StoreResult<&str> {
    let unsupported = || {
        StoreError::UnsupportedQuery(format!(
            "only {{\"descriptor\": <uid>}} filters are supported, got {}",
            filter
        ))
    };

    let object = filter.as_object().ok_or_else(unsupported)?;
    if object.len() != 1 {
        return Err(unsupported());
    }
    object
        .get("descriptor")
        .and_then(Value::as_str)
        .ok_or_else(unsupported)
}

/// Build the `ORDER BY` clause for a layout, or an empty string
pub fn order_by_clause(layout: &ColumnLayout, sort: &[SortKey]) -> StoreResult<String> {
    if sort.is_empty() {
        return Ok(String::new());
    }

    let mut terms = Vec::with_capacity(sort.len());
    for key in sort {
        let column = match key.column() {
            Some(column) if layout.has_column(&column) => column,
            _ => {
                return Err(StoreError::UnsupportedQuery(format!(
                    "cannot sort on '{}': no such field",
                    key.field
                )))
            }
        };
        terms.push(format!(
            "{} {}",
            super::codec::quote(&column),
            key.direction.sql()
        ));
    }
    Ok(format!(" ORDER BY {}", terms.join(", ")))
}

/// Lazy sequence of events read from one descriptor table
///
/// Rows are fetched up front; decoding happens as the cursor advances.
#[derive(Debug)]
pub struct EventCursor {
    descriptor: String,
    layout: ColumnLayout,
    rows: std::vec::IntoIter<Vec<SqlValue>>,
}

impl EventCursor {
    pub(crate) fn new(descriptor: String, layout: ColumnLayout, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            descriptor,
            layout,
            rows: rows.into_iter(),
        }
    }

    /// Descriptor whose events this cursor yields
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Collect the remaining events, stopping at the first decode error
    pub fn into_events(self) -> StoreResult<Vec<Event>> {
        self.collect()
    }
}

impl Iterator for EventCursor {
    type Item = StoreResult<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(decode_event(&self.descriptor, &self.layout, row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for EventCursor {}
