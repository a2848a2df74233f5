use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, TransactionBehavior};

use crate::error::SQLError;
use crate::traits::{Row, SQLExecutor, SQLStore, Value};

/// How many times a transaction is re-run before giving up with
/// [`SQLError::Busy`].
const MAX_TX_ATTEMPTS: usize = 5;

/// SqliteStore is a SQLStore implementation backed by rusqlite (bundled SQLite).
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self, SQLError> {
        let conn = Connection::open(path)
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        // Enable WAL mode for better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self, SQLError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Convert our Value enum to rusqlite's ToSql.
fn bind_params(params: &[Value]) -> Vec<Box<dyn rusqlite::types::ToSql + '_>> {
    params
        .iter()
        .map(|v| -> Box<dyn rusqlite::types::ToSql + '_> {
            match v {
                Value::Null => Box::new(rusqlite::types::Null),
                Value::Integer(i) => Box::new(*i),
                Value::Real(f) => Box::new(*f),
                Value::Text(s) => Box::new(s.as_str()),
                Value::Blob(b) => Box::new(b.as_slice()),
            }
        })
        .collect()
}

/// Extract a Value from a rusqlite row at a given column index.
fn row_value_at(row: &rusqlite::Row, idx: usize) -> Value {
    // Try integer first, then real, then text, then blob, then null.
    if let Ok(i) = row.get::<_, i64>(idx) {
        return Value::Integer(i);
    }
    if let Ok(f) = row.get::<_, f64>(idx) {
        return Value::Real(f);
    }
    if let Ok(s) = row.get::<_, String>(idx) {
        return Value::Text(s);
    }
    if let Ok(b) = row.get::<_, Vec<u8>>(idx) {
        return Value::Blob(b);
    }
    Value::Null
}

fn run_query(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        bound.iter().map(|b| b.as_ref()).collect();

    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| SQLError::Query(e.to_string()))?;

    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            let mut columns = Vec::new();
            for (i, name) in column_names.iter().enumerate() {
                let val = row_value_at(row, i);
                columns.push((name.clone(), val));
            }
            Ok(Row { columns })
        })
        .map_err(|e| SQLError::Query(e.to_string()))?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(|e| SQLError::Query(e.to_string()))?);
    }
    Ok(result)
}

fn run_exec(conn: &Connection, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        bound.iter().map(|b| b.as_ref()).collect();

    let affected = conn
        .execute(sql, param_refs.as_slice())
        .map_err(|e| SQLError::Execution(e.to_string()))?;

    Ok(affected as u64)
}

fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    )
}

/// Executor handed to transaction closures. Statements run against the
/// open transaction and commit or roll back with it.
struct TxExecutor<'a> {
    conn: &'a Connection,
}

impl SQLExecutor for TxExecutor<'_> {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        run_query(self.conn, sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        run_exec(self.conn, sql, params)
    }
}

impl SQLExecutor for SqliteStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Query(e.to_string()))?;
        run_query(&conn, sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;
        run_exec(&conn, sql, params)
    }
}

impl SQLStore for SqliteStore {
    fn transaction(
        &self,
        f: &mut dyn FnMut(&dyn SQLExecutor) -> Result<(), SQLError>,
    ) -> Result<(), SQLError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        let mut last_busy = String::from("database busy");
        for _ in 0..MAX_TX_ATTEMPTS {
            // BEGIN IMMEDIATE takes the write lock up front, so a conflicting
            // writer surfaces here or at commit, never in between.
            let tx = match conn.transaction_with_behavior(TransactionBehavior::Immediate) {
                Ok(tx) => tx,
                Err(e) if is_busy(&e) => {
                    last_busy = e.to_string();
                    continue;
                }
                Err(e) => return Err(SQLError::Execution(e.to_string())),
            };

            let executor = TxExecutor { conn: &tx };
            match f(&executor) {
                Ok(()) => match tx.commit() {
                    Ok(()) => return Ok(()),
                    Err(e) if is_busy(&e) => {
                        last_busy = e.to_string();
                        continue;
                    }
                    Err(e) => return Err(SQLError::Execution(e.to_string())),
                },
                // Dropping `tx` rolls back. Busy retries from scratch,
                // everything else aborts.
                Err(SQLError::Busy(m)) => {
                    last_busy = m;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Err(SQLError::Busy(format!("retries exhausted: {}", last_busy)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .exec(
                "CREATE TABLE items (id TEXT PRIMARY KEY, qty INTEGER)",
                &[],
            )
            .unwrap();
        store
    }

    #[test]
    fn test_exec_and_query() {
        let store = test_store();
        store
            .exec(
                "INSERT INTO items (id, qty) VALUES (?1, ?2)",
                &[Value::Text("a".into()), Value::Integer(7)],
            )
            .unwrap();

        let rows = store
            .query("SELECT id, qty FROM items", &[])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("id"), Some("a"));
        assert_eq!(rows[0].get_i64("qty"), Some(7));
    }

    #[test]
    fn test_open_file_db() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let store = SqliteStore::open(tmp.path()).unwrap();
        store.exec("CREATE TABLE t (id TEXT)", &[]).unwrap();
        store
            .exec("INSERT INTO t (id) VALUES (?1)", &[Value::Text("x".into())])
            .unwrap();
        let rows = store.query("SELECT id FROM t", &[]).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_transaction_commits_both_writes() {
        let store = test_store();
        store
            .transaction(&mut |tx| {
                tx.exec(
                    "INSERT INTO items (id, qty) VALUES (?1, ?2)",
                    &[Value::Text("a".into()), Value::Integer(1)],
                )?;
                tx.exec(
                    "INSERT INTO items (id, qty) VALUES (?1, ?2)",
                    &[Value::Text("b".into()), Value::Integer(2)],
                )?;
                Ok(())
            })
            .unwrap();

        let rows = store.query("SELECT id FROM items", &[]).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_transaction_error_rolls_back() {
        let store = test_store();
        let result = store.transaction(&mut |tx| {
            tx.exec(
                "INSERT INTO items (id, qty) VALUES (?1, ?2)",
                &[Value::Text("a".into()), Value::Integer(1)],
            )?;
            Err(SQLError::RolledBack)
        });
        assert!(result.is_err());

        let rows = store.query("SELECT id FROM items", &[]).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_transaction_captures_result() {
        let store = test_store();
        let mut read_back = None;
        store
            .transaction(&mut |tx| {
                tx.exec(
                    "INSERT INTO items (id, qty) VALUES (?1, ?2)",
                    &[Value::Text("a".into()), Value::Integer(42)],
                )?;
                let rows = tx.query(
                    "SELECT qty FROM items WHERE id = ?1",
                    &[Value::Text("a".into())],
                )?;
                read_back = rows.first().and_then(|r| r.get_i64("qty"));
                Ok(())
            })
            .unwrap();
        assert_eq!(read_back, Some(42));
    }
}
