//! Fire-and-forget change feed.
//!
//! Unrelated back-office screens render a cross-entity activity feed from
//! these envelopes. Writes are best-effort by contract: a failed feed write
//! is logged and dropped, and must never roll back or fail the mutation
//! that produced it. The ledger's own audit rows follow the stricter
//! transactional contract in `service::adjust`, not this feed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use salondesk_core::{ServiceError, new_id, now_rfc3339};
use salondesk_sql::{SQLStore, Value};

/// Create/update/delete envelope with before/after snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub id: String,
    pub action: String,
    pub collection: String,
    pub doc_id: String,

    #[serde(default)]
    pub before: Option<serde_json::Value>,
    #[serde(default)]
    pub after: Option<serde_json::Value>,

    pub created_at: String,
}

impl HistoryEvent {
    pub fn new(
        action: &str,
        collection: &str,
        doc_id: &str,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: new_id(),
            action: action.to_string(),
            collection: collection.to_string(),
            doc_id: doc_id.to_string(),
            before,
            after,
            created_at: now_rfc3339(),
        }
    }
}

/// Pluggable feed sink. The concrete backend is injected at startup.
pub trait HistorySink: Send + Sync {
    fn record(&self, event: HistoryEvent) -> Result<(), ServiceError>;
}

/// Default sink: appends events to the `history_events` table in the same
/// database the service runs on.
pub struct SqlHistorySink {
    sql: Arc<dyn SQLStore>,
}

impl SqlHistorySink {
    pub fn new(sql: Arc<dyn SQLStore>) -> Self {
        Self { sql }
    }
}

impl HistorySink for SqlHistorySink {
    fn record(&self, event: HistoryEvent) -> Result<(), ServiceError> {
        let json = serde_json::to_string(&event)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        self.sql
            .exec(
                "INSERT INTO history_events (id, data, action, collection, doc_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                &[
                    Value::Text(event.id),
                    Value::Text(json),
                    Value::Text(event.action),
                    Value::Text(event.collection),
                    Value::Text(event.doc_id),
                    Value::Text(event.created_at),
                ],
            )
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        Ok(())
    }
}

/// Sink that drops every event. For hosts that run without a feed.
pub struct NullHistorySink;

impl HistorySink for NullHistorySink {
    fn record(&self, _event: HistoryEvent) -> Result<(), ServiceError> {
        Ok(())
    }
}
