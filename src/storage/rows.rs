//! Row ↔ event document mapping
//!
//! A row is positioned as
//! `[uid, seq_num, time, data[k1]..data[kn], timestamps[k1]..timestamps[kn]]`
//! following a [`ColumnLayout`].

use std::collections::BTreeMap;

use rusqlite::types::Value as SqlValue;
use serde_json::{Number, Value};

use crate::error::{StoreError, StoreResult};
use crate::types::Event;

use super::schema::ColumnLayout;

/// Convert one data value into a SQLite cell
///
/// Booleans become integers; arrays and objects are rejected.
pub fn to_sql_value(key: &str, value: &Value) -> StoreResult<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(SqlValue::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(SqlValue::Real(f))
            } else {
                Err(StoreError::InvalidDocument(format!(
                    "data[{}] = {} is not representable",
                    key, n
                )))
            }
        }
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(StoreError::InvalidDocument(format!(
            "data[{}] must be a scalar, got {}",
            key, value
        ))),
    }
}

/// Convert one SQLite cell back into a data value
pub fn from_sql_value(column: &str, value: SqlValue) -> StoreResult<Value> {
    match value {
        SqlValue::Null => Ok(Value::Null),
        SqlValue::Integer(i) => Ok(Value::from(i)),
        // NaN and infinities have no JSON form
        SqlValue::Real(f) => Ok(Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)),
        SqlValue::Text(s) => Ok(Value::String(s)),
        SqlValue::Blob(_) => Err(StoreError::InvalidDocument(format!(
            "column {} holds a blob",
            column
        ))),
    }
}

fn real(column: &str, value: SqlValue) -> StoreResult<f64> {
    match value {
        SqlValue::Real(f) => Ok(f),
        SqlValue::Integer(i) => Ok(i as f64),
        other => Err(StoreError::InvalidDocument(format!(
            "column {} expected a number, got {:?}",
            column, other
        ))),
    }
}

/// Encode an event into a row, checking it against the layout's keys
pub fn encode_event(event: &Event, layout: &ColumnLayout) -> StoreResult<Vec<SqlValue>> {
    if !event.keys_match(layout.keys().iter().map(String::as_str)) {
        return Err(StoreError::InvalidDocument(format!(
            "event {} keys {:?}/{:?} do not match descriptor {} keys {:?}",
            event.uid,
            event.data.keys().collect::<Vec<_>>(),
            event.timestamps.keys().collect::<Vec<_>>(),
            event.descriptor,
            layout.keys()
        )));
    }

    let mut row = Vec::with_capacity(layout.len());
    row.push(SqlValue::Text(event.uid.clone()));
    row.push(SqlValue::Integer(event.seq_num));
    row.push(SqlValue::Real(event.time));

    for key in layout.keys() {
        row.push(to_sql_value(key, &event.data[key])?);
    }
    for key in layout.keys() {
        row.push(SqlValue::Real(event.timestamps[key]));
    }

    Ok(row)
}

/// Decode a row selected in layout order into an event
pub fn decode_event(
    descriptor: &str,
    layout: &ColumnLayout,
    row: Vec<SqlValue>,
) -> StoreResult<Event> {
    if row.len() != layout.len() {
        return Err(StoreError::InvalidDocument(format!(
            "row has {} cells, table {} has {} columns",
            row.len(),
            descriptor,
            layout.len()
        )));
    }

    let columns = layout.columns();
    let n = layout.keys().len();
    let mut cells = row.into_iter();
    // Length checked above, so the iterator yields exactly layout.len() cells
    let mut next = || cells.next().unwrap_or(SqlValue::Null);

    let uid = match next() {
        SqlValue::Text(s) => s,
        other => {
            return Err(StoreError::InvalidDocument(format!(
                "column uid expected text, got {:?}",
                other
            )))
        }
    };
    let seq_num = match next() {
        SqlValue::Integer(i) => i,
        other => {
            return Err(StoreError::InvalidDocument(format!(
                "column seq_num expected an integer, got {:?}",
                other
            )))
        }
    };
    let time = real("time", next())?;

    let mut data = BTreeMap::new();
    for (i, key) in layout.keys().iter().enumerate() {
        data.insert(key.clone(), from_sql_value(&columns[3 + i], next())?);
    }

    let mut timestamps = BTreeMap::new();
    for (i, key) in layout.keys().iter().enumerate() {
        timestamps.insert(key.clone(), real(&columns[3 + n + i], next())?);
    }

    Ok(Event {
        uid,
        descriptor: descriptor.to_string(),
        seq_num,
        time,
        data,
        timestamps,
    })
}
