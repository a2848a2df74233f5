pub mod adjust;
pub mod aggregate;
pub mod branches;
pub mod catalog;
pub mod ledger;
pub mod reconcile;
pub mod records;
pub mod schema;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use salondesk_core::{ServiceConfig, ServiceError};
use salondesk_sql::{SQLError, SQLExecutor, SQLStore, SqliteStore, Value};

use crate::history::{HistoryEvent, HistorySink, SqlHistorySink};

/// Inventory service — stock records, catalog, reconciliation, the
/// transactional adjustment path and its audit ledger, and the read-side
/// stock overview.
pub struct InventoryService {
    pub(crate) sql: Arc<dyn SQLStore>,
    pub(crate) history: Arc<dyn HistorySink>,
}

impl InventoryService {
    /// Create a new InventoryService, initializing the DB schema.
    pub fn new(
        sql: Arc<dyn SQLStore>,
        history: Arc<dyn HistorySink>,
    ) -> Result<Arc<Self>, ServiceError> {
        schema::init_schema(sql.as_ref())?;
        Ok(Arc::new(Self { sql, history }))
    }

    /// Open a service on the SQLite database named by `config`, with the
    /// default SQL-backed history sink.
    pub fn open(config: &ServiceConfig) -> Result<Arc<Self>, ServiceError> {
        let store = SqliteStore::open(&config.resolve_sqlite_path())
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        let sql: Arc<dyn SQLStore> = Arc::new(store);
        let history = Arc::new(SqlHistorySink::new(sql.clone()));
        Self::new(sql, history)
    }

    // ── Generic document helpers ──
    //
    // Every table stores the full JSON document in a `data` column with
    // extracted columns for filtering. These helpers cover the plain
    // (non-transactional) document writes; quantity mutations go through
    // `in_transaction` instead.

    /// Insert a document as JSON into a table with indexed columns.
    pub(crate) fn insert_doc<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        doc: &T,
        indexes: &[(&str, Value)],
    ) -> Result<(), ServiceError> {
        let json =
            serde_json::to_string(doc).map_err(|e| ServiceError::Internal(e.to_string()))?;

        let mut cols = vec!["id", "data"];
        let mut placeholders = vec!["?1".to_string(), "?2".to_string()];
        let mut params = vec![Value::Text(id.to_string()), Value::Text(json)];

        for (i, (col, val)) in indexes.iter().enumerate() {
            cols.push(col);
            placeholders.push(format!("?{}", i + 3));
            params.push(val.clone());
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            cols.join(", "),
            placeholders.join(", "),
        );

        self.sql.exec(&sql, &params).map_err(|e| {
            let msg = e.to_string();
            if msg.contains("UNIQUE constraint") {
                ServiceError::Conflict(msg)
            } else {
                ServiceError::Storage(msg)
            }
        })?;

        Ok(())
    }

    /// Get a document by id, deserializing the JSON `data` column.
    pub(crate) fn get_doc<T: DeserializeOwned>(
        &self,
        table: &str,
        id: &str,
    ) -> Result<T, ServiceError> {
        let sql = format!("SELECT data FROM {} WHERE id = ?1", table);
        let rows = self
            .sql
            .query(&sql, &[Value::Text(id.to_string())])
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        let row = rows
            .first()
            .ok_or_else(|| ServiceError::NotFound(format!("{}/{}", table, id)))?;
        let data = row
            .get_str("data")
            .ok_or_else(|| ServiceError::Internal("missing data column".into()))?;
        serde_json::from_str(data).map_err(|e| ServiceError::Internal(e.to_string()))
    }

    /// Update a document's JSON data and indexed columns.
    pub(crate) fn update_doc<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        doc: &T,
        indexes: &[(&str, Value)],
    ) -> Result<(), ServiceError> {
        let json =
            serde_json::to_string(doc).map_err(|e| ServiceError::Internal(e.to_string()))?;

        let mut sets = vec!["data = ?1".to_string()];
        let mut params: Vec<Value> = vec![Value::Text(json)];

        for (i, (col, val)) in indexes.iter().enumerate() {
            sets.push(format!("{} = ?{}", col, i + 2));
            params.push(val.clone());
        }

        let id_idx = params.len() + 1;
        params.push(Value::Text(id.to_string()));

        let sql = format!("UPDATE {} SET {} WHERE id = ?{}", table, sets.join(", "), id_idx);

        let affected = self
            .sql
            .exec(&sql, &params)
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        if affected == 0 {
            return Err(ServiceError::NotFound(format!("{}/{}", table, id)));
        }

        Ok(())
    }

    /// Delete a document by id.
    pub(crate) fn delete_doc(&self, table: &str, id: &str) -> Result<(), ServiceError> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", table);
        let affected = self
            .sql
            .exec(&sql, &[Value::Text(id.to_string())])
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        if affected == 0 {
            return Err(ServiceError::NotFound(format!("{}/{}", table, id)));
        }
        Ok(())
    }

    /// Run a query returning `data` columns and deserialize each row.
    pub(crate) fn query_docs<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<T>, ServiceError> {
        let rows = self
            .sql
            .query(sql, params)
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in &rows {
            let data = row
                .get_str("data")
                .ok_or_else(|| ServiceError::Internal("missing data column".into()))?;
            docs.push(
                serde_json::from_str(data).map_err(|e| ServiceError::Internal(e.to_string()))?,
            );
        }
        Ok(docs)
    }

    /// List documents with equality filters and pagination.
    pub(crate) fn list_docs<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, Value)],
        order_by: &str,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<T>, usize), ServiceError> {
        let mut where_clauses = Vec::new();
        let mut params = Vec::new();

        for (i, (col, val)) in filters.iter().enumerate() {
            where_clauses.push(format!("{} = ?{}", col, i + 1));
            params.push(val.clone());
        }

        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", where_clauses.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) as cnt FROM {}{}", table, where_sql);
        let count_rows = self
            .sql
            .query(&count_sql, &params)
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        let total = count_rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0) as usize;

        let limit_idx = params.len() + 1;
        let offset_idx = params.len() + 2;
        params.push(Value::Integer(limit as i64));
        params.push(Value::Integer(offset as i64));

        let sql = format!(
            "SELECT data FROM {}{} ORDER BY {} LIMIT ?{} OFFSET ?{}",
            table, where_sql, order_by, limit_idx, offset_idx,
        );

        let items = self.query_docs(&sql, &params)?;
        Ok((items, total))
    }

    /// Apply an RFC 7386 merge patch to a document, re-validating the result
    /// against the document type.
    pub(crate) fn apply_patch<T: Serialize + DeserializeOwned>(
        current: &T,
        patch: serde_json::Value,
    ) -> Result<T, ServiceError> {
        let mut base =
            serde_json::to_value(current).map_err(|e| ServiceError::Internal(e.to_string()))?;
        salondesk_core::merge_patch(&mut base, &patch);
        serde_json::from_value(base)
            .map_err(|e| ServiceError::Validation(format!("invalid patch: {}", e)))
    }

    // ── Transactions ──

    /// Run `f` inside one store transaction, carrying its typed result (or
    /// business error) across the closure boundary.
    ///
    /// `f` may be re-run from scratch when the store detects a conflicting
    /// concurrent write; retry exhaustion surfaces as `Conflict`. A business
    /// error returned by `f` rolls the transaction back and propagates
    /// unchanged.
    pub(crate) fn in_transaction<T>(
        &self,
        mut f: impl FnMut(&dyn SQLExecutor) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let mut outcome: Option<Result<T, ServiceError>> = None;

        let tx_result = self.sql.transaction(&mut |tx| {
            outcome = None;
            match f(tx) {
                Ok(v) => {
                    outcome = Some(Ok(v));
                    Ok(())
                }
                Err(e) => {
                    outcome = Some(Err(e));
                    Err(SQLError::RolledBack)
                }
            }
        });

        match tx_result {
            Ok(()) => match outcome {
                Some(Ok(v)) => Ok(v),
                _ => Err(ServiceError::Internal(
                    "transaction committed without a result".into(),
                )),
            },
            Err(SQLError::Busy(m)) => Err(ServiceError::Conflict(m)),
            Err(e) => match outcome {
                Some(Err(svc)) => Err(svc),
                _ => Err(ServiceError::Storage(e.to_string())),
            },
        }
    }

    // ── History feed ──

    /// Best-effort feed write. Failures are logged and dropped; they never
    /// affect the operation that produced the event.
    pub(crate) fn record_history(&self, event: HistoryEvent) {
        if let Err(e) = self.history.record(event) {
            warn!("history feed write failed (dropped): {}", e);
        }
    }
}
