//! Storage unit: one SQLite file holding every descriptor table of a run

use std::path::{Path, PathBuf};

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use tracing::debug;

use crate::error::StoreResult;

use super::codec::{parse_table_name, quote};
use super::schema::ColumnLayout;
use super::transaction::with_transaction;

const LIST_TABLES: &str = "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name";

/// Open connection to one run's database file
#[derive(Debug)]
pub struct StorageUnit {
    run_uid: String,
    path: PathBuf,
    conn: Connection,
}

impl StorageUnit {
    /// Open (or create) the unit file at `path`
    pub fn open<P: AsRef<Path>>(run_uid: &str, path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        debug!(run = run_uid, path = %path.display(), "opened storage unit");
        Ok(Self {
            run_uid: run_uid.to_string(),
            path,
            conn,
        })
    }

    pub fn run_uid(&self) -> &str {
        &self.run_uid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every table in the unit's catalog
    pub fn list_tables(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self.conn.prepare(LIST_TABLES)?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
        names.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Descriptor uids recovered from the table catalog
    pub fn descriptor_uids(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .list_tables()?
            .iter()
            .filter_map(|name| parse_table_name(name))
            .collect())
    }

    /// Stored column names of `table`, empty if it does not exist
    pub fn table_columns(&self, table: &str) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote(table)))?;
        let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
        names.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Create a descriptor table
    pub fn create_table(&mut self, table: &str, layout: &ColumnLayout) -> StoreResult<()> {
        let sql = layout.create_table_sql(table);
        with_transaction(&mut self.conn, |tx| {
            tx.execute_batch(&sql)?;
            Ok(())
        })
    }

    /// Insert rows with one prepared statement inside one transaction
    pub fn insert_rows(
        &mut self,
        table: &str,
        layout: &ColumnLayout,
        rows: &[Vec<SqlValue>],
    ) -> StoreResult<usize> {
        let sql = layout.insert_sql(table);
        with_transaction(&mut self.conn, |tx| {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                stmt.execute(params_from_iter(row.iter()))?;
            }
            Ok(rows.len())
        })
    }

    /// Read every row of `table` in layout order
    ///
    /// `order_by` is a prebuilt clause (possibly empty); without it rows
    /// come back in physical order.
    pub fn select_rows(
        &self,
        table: &str,
        layout: &ColumnLayout,
        order_by: &str,
    ) -> StoreResult<Vec<Vec<SqlValue>>> {
        let sql = format!(
            "SELECT {} FROM {}{}",
            layout.column_list(),
            quote(table),
            order_by
        );
        let width = layout.len();

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            (0..width)
                .map(|i| row.get::<_, SqlValue>(i))
                .collect::<Result<Vec<_>, _>>()
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Number of rows in `table`
    pub fn row_count(&self, table: &str) -> StoreResult<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn row(uid: &str, seq: i64, x: f64) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(uid.to_string()),
            SqlValue::Integer(seq),
            SqlValue::Real(seq as f64),
            SqlValue::Real(x),
            SqlValue::Real(0.5),
        ]
    }

    #[test]
    fn test_create_insert_select() {
        let temp_dir = TempDir::new().unwrap();
        let mut unit = StorageUnit::open("r-1", temp_dir.path().join("r_1.sqlite")).unwrap();
        let layout = ColumnLayout::from_keys(["x"]).unwrap();

        unit.create_table("desc_d_1", &layout).unwrap();
        let inserted = unit
            .insert_rows("desc_d_1", &layout, &[row("e-1", 1, 1.5), row("e-2", 2, 2.5)])
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(unit.row_count("desc_d_1").unwrap(), 2);

        let rows = unit.select_rows("desc_d_1", &layout, "").unwrap();
        assert_eq!(rows, vec![row("e-1", 1, 1.5), row("e-2", 2, 2.5)]);

        let rows = unit
            .select_rows("desc_d_1", &layout, " ORDER BY \"seq_num\" DESC")
            .unwrap();
        assert_eq!(rows[0], row("e-2", 2, 2.5));
    }

    #[test]
    fn test_catalog_listing() {
        let temp_dir = TempDir::new().unwrap();
        let mut unit = StorageUnit::open("r-1", temp_dir.path().join("r_1.sqlite")).unwrap();
        let layout = ColumnLayout::from_keys(["a", "b"]).unwrap();

        unit.create_table("desc_d_2", &layout).unwrap();
        unit.create_table("desc_d_1", &layout).unwrap();

        assert_eq!(unit.list_tables().unwrap(), vec!["desc_d_1", "desc_d_2"]);
        assert_eq!(unit.descriptor_uids().unwrap(), vec!["d-1", "d-2"]);
        assert_eq!(unit.table_columns("desc_d_1").unwrap(), layout.columns());
        assert!(unit.table_columns("desc_missing").unwrap().is_empty());
    }

    #[test]
    fn test_failed_insert_leaves_table_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let mut unit = StorageUnit::open("r-1", temp_dir.path().join("r_1.sqlite")).unwrap();
        let layout = ColumnLayout::from_keys(["x"]).unwrap();
        unit.create_table("desc_d_1", &layout).unwrap();

        // Second row is one cell short
        let mut short = row("e-2", 2, 2.0);
        short.pop();
        let result = unit.insert_rows("desc_d_1", &layout, &[row("e-1", 1, 1.0), short]);

        assert!(result.is_err());
        assert_eq!(unit.row_count("desc_d_1").unwrap(), 0);
    }

    #[test]
    fn test_duplicate_table_fails() {
        let temp_dir = TempDir::new().unwrap();
        let mut unit = StorageUnit::open("r-1", temp_dir.path().join("r_1.sqlite")).unwrap();
        let layout = ColumnLayout::from_keys(["x"]).unwrap();

        unit.create_table("desc_d_1", &layout).unwrap();
        assert!(unit.create_table("desc_d_1", &layout).is_err());
    }
}
