use salondesk_core::{Actor, ServiceError, new_id, now_rfc3339};
use salondesk_sql::Value;
use tracing::info;

use super::InventoryService;
use crate::history::HistoryEvent;
use crate::model::{InventoryAdjustment, InventoryRecord};

impl InventoryService {
    /// Change an existing record's quantity by a signed delta.
    ///
    /// This is the single sanctioned mutation path for quantities outside
    /// the bulk stock-entry flow. The quantity write and the audit append
    /// commit atomically in one store transaction; when a concurrent
    /// adjustment conflicts, the whole read-modify-write re-runs from
    /// scratch, so no two adjustments can read the same `before` and both
    /// commit. The change-feed entry afterwards is best-effort only.
    pub fn adjust(
        &self,
        record_id: &str,
        delta: i64,
        reason: &str,
        actor: Option<&Actor>,
    ) -> Result<InventoryAdjustment, ServiceError> {
        let (adjustment, before_doc, after_doc) = self.in_transaction(|tx| {
            let rows = tx
                .query(
                    "SELECT data FROM inventory_records WHERE id = ?1",
                    &[Value::Text(record_id.to_string())],
                )
                .map_err(|e| ServiceError::Storage(e.to_string()))?;
            let data = rows
                .first()
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("inventory_records/{}", record_id))
                })?
                .get_str("data")
                .ok_or_else(|| ServiceError::Internal("missing data column".into()))?;
            let record: InventoryRecord =
                serde_json::from_str(data).map_err(|e| ServiceError::Internal(e.to_string()))?;

            let before = record.quantity;
            let after = before + delta;
            if after < 0 {
                return Err(ServiceError::Validation(format!(
                    "adjustment of {} would drive quantity below zero (current {})",
                    delta, before
                )));
            }

            let now = now_rfc3339();
            let mut updated = record.clone();
            updated.quantity = after;
            updated.last_updated = now.clone();

            let record_json = serde_json::to_string(&updated)
                .map_err(|e| ServiceError::Internal(e.to_string()))?;
            tx.exec(
                "UPDATE inventory_records SET data = ?1, quantity = ?2, last_updated = ?3
                 WHERE id = ?4",
                &[
                    Value::Text(record_json),
                    Value::Integer(after),
                    Value::Text(now.clone()),
                    Value::Text(record_id.to_string()),
                ],
            )
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

            let adjustment = InventoryAdjustment {
                id: new_id(),
                record_id: record_id.to_string(),
                product_id: updated.product_id.clone(),
                branch_id: Some(updated.branch_id.clone()),
                before,
                after,
                delta,
                reason: reason.to_string(),
                created_by: actor.cloned(),
                created_at: now,
            };
            let adj_json = serde_json::to_string(&adjustment)
                .map_err(|e| ServiceError::Internal(e.to_string()))?;
            tx.exec(
                "INSERT INTO inventory_adjustments
                 (id, data, record_id, product_id, branch_id, delta, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                &[
                    Value::Text(adjustment.id.clone()),
                    Value::Text(adj_json),
                    Value::Text(adjustment.record_id.clone()),
                    match &adjustment.product_id {
                        Some(p) => Value::Text(p.clone()),
                        None => Value::Null,
                    },
                    match &adjustment.branch_id {
                        Some(b) => Value::Text(b.clone()),
                        None => Value::Null,
                    },
                    Value::Integer(delta),
                    Value::Text(adjustment.created_at.clone()),
                ],
            )
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

            Ok((
                adjustment,
                serde_json::to_value(&record).ok(),
                serde_json::to_value(&updated).ok(),
            ))
        })?;

        info!(
            "adjusted record {}: {} → {} ({:+}, {})",
            record_id, adjustment.before, adjustment.after, delta, reason
        );

        self.record_history(HistoryEvent::new(
            "update",
            "inventory_records",
            record_id,
            before_doc,
            after_doc,
        ));

        Ok(adjustment)
    }
}
