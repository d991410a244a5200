//! Transaction scope
//!
//! Runs a body against a transaction on one unit's connection:
//!
//! 1. Begin a transaction (the handle)
//! 2. Run the body
//! 3. Commit on success, roll back on failure
//!
//! The handle is released on every exit path. A failing body's error is
//! returned unchanged, even if the rollback itself fails.

use rusqlite::{Connection, Transaction};
use tracing::warn;

use crate::error::StoreResult;

/// Run `body` inside a transaction on `conn`
///
/// # Example
///
/// ```ignore
/// with_transaction(&mut conn, |tx| {
///     tx.execute("INSERT INTO t VALUES (?1)", [1])?;
///     Ok(())
/// })?;
/// ```
pub fn with_transaction<T, F>(conn: &mut Connection, body: F) -> StoreResult<T>
where
    F: FnOnce(&Transaction<'_>) -> StoreResult<T>,
{
    let tx = conn.transaction()?;

    match body(&tx) {
        Ok(value) => {
            // A failed COMMIT drops the transaction, which rolls it back.
            tx.commit()?;
            Ok(value)
        }
        Err(err) => {
            match tx.rollback() {
                Ok(()) => warn!(error = %err, "transaction rolled back"),
                Err(rollback_err) => warn!(
                    error = %err,
                    rollback_error = %rollback_err,
                    "transaction rollback failed"
                ),
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v)").unwrap();
        conn
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_commit_on_success() {
        let mut conn = test_conn();

        let inserted = with_transaction(&mut conn, |tx| {
            tx.execute("INSERT INTO t VALUES (?1)", [1])?;
            tx.execute("INSERT INTO t VALUES (?1)", [2])?;
            Ok(2)
        })
        .unwrap();

        assert_eq!(inserted, 2);
        assert_eq!(count(&conn), 2);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_rollback_returns_original_error() {
        let mut conn = test_conn();

        let result: StoreResult<()> = with_transaction(&mut conn, |tx| {
            tx.execute("INSERT INTO t VALUES (?1)", [1])?;
            Err(StoreError::InvalidDocument("boom".to_string()))
        });

        match result {
            Err(StoreError::InvalidDocument(msg)) => assert_eq!(msg, "boom"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(count(&conn), 0);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_storage_error_rolls_back_earlier_statements() {
        let mut conn = test_conn();

        let result = with_transaction(&mut conn, |tx| {
            tx.execute("INSERT INTO t VALUES (?1)", [1])?;
            tx.execute("INSERT INTO missing VALUES (?1)", [2])?;
            Ok(())
        });

        assert!(matches!(result, Err(StoreError::Storage(_))));
        assert_eq!(count(&conn), 0);

        // Connection is usable again after the failed scope
        with_transaction(&mut conn, |tx| {
            tx.execute("INSERT INTO t VALUES (?1)", [3])?;
            Ok(())
        })
        .unwrap();
        assert_eq!(count(&conn), 1);
    }
}
