use salondesk_core::{ListParams, ListResult, ServiceError, new_id, now_rfc3339};
use salondesk_sql::Value;

use super::InventoryService;
use crate::history::HistoryEvent;
use crate::model::{InventoryRecord, name_key};

pub struct CreateRecordInput {
    pub product_id: Option<String>,
    pub product_name: String,
    pub branch_id: String,
    pub branch_name: String,
    pub quantity: i64,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<f64>,
}

/// Indexed columns extracted from a record document on every write.
pub(crate) fn record_indexes(record: &InventoryRecord) -> Vec<(&'static str, Value)> {
    vec![
        (
            "product_id",
            match &record.product_id {
                Some(p) => Value::Text(p.clone()),
                None => Value::Null,
            },
        ),
        ("product_name", Value::Text(record.product_name.clone())),
        ("name_ci", Value::Text(name_key(&record.product_name))),
        ("branch_id", Value::Text(record.branch_id.clone())),
        ("branch_name", Value::Text(record.branch_name.clone())),
        ("quantity", Value::Integer(record.quantity)),
        ("last_updated", Value::Text(record.last_updated.clone())),
    ]
}

impl InventoryService {
    /// Create a per-branch stock record.
    pub fn create_record(&self, input: CreateRecordInput) -> Result<InventoryRecord, ServiceError> {
        let name = input.product_name.trim();
        if name.is_empty() {
            return Err(ServiceError::Validation("product name is required".into()));
        }
        if input.quantity < 0 {
            return Err(ServiceError::Validation(format!(
                "quantity may not be negative: {}",
                input.quantity
            )));
        }

        let record = InventoryRecord {
            id: new_id(),
            product_id: input.product_id,
            product_name: name.to_string(),
            branch_id: input.branch_id,
            branch_name: input.branch_name,
            quantity: input.quantity,
            unit: input.unit,
            category: input.category,
            image_url: input.image_url,
            price: input.price,
            last_updated: now_rfc3339(),
        };

        self.insert_doc(
            "inventory_records",
            &record.id,
            &record,
            &record_indexes(&record),
        )?;

        self.record_history(HistoryEvent::new(
            "create",
            "inventory_records",
            &record.id,
            None,
            serde_json::to_value(&record).ok(),
        ));

        Ok(record)
    }

    /// Get a record by id.
    pub fn get_record(&self, id: &str) -> Result<InventoryRecord, ServiceError> {
        self.get_doc("inventory_records", id)
    }

    /// All records linked to a product.
    pub fn list_by_product(&self, product_id: &str) -> Result<Vec<InventoryRecord>, ServiceError> {
        self.query_docs(
            "SELECT data FROM inventory_records WHERE product_id = ?1 ORDER BY id",
            &[Value::Text(product_id.to_string())],
        )
    }

    /// All records carrying this product name (case-insensitive, trimmed),
    /// linked or not.
    pub fn list_by_name(&self, product_name: &str) -> Result<Vec<InventoryRecord>, ServiceError> {
        self.query_docs(
            "SELECT data FROM inventory_records WHERE name_ci = ?1 ORDER BY id",
            &[Value::Text(name_key(product_name))],
        )
    }

    /// All records held at a branch.
    pub fn list_by_branch(&self, branch_id: &str) -> Result<Vec<InventoryRecord>, ServiceError> {
        self.query_docs(
            "SELECT data FROM inventory_records WHERE branch_id = ?1 ORDER BY id",
            &[Value::Text(branch_id.to_string())],
        )
    }

    /// List records with pagination, most recently touched first.
    pub fn list_records(
        &self,
        params: &ListParams,
    ) -> Result<ListResult<InventoryRecord>, ServiceError> {
        let (items, total) = self.list_docs(
            "inventory_records",
            &[],
            "last_updated DESC",
            params.limit,
            params.offset,
        )?;
        Ok(ListResult { items, total })
    }

    /// Update a record with JSON merge-patch semantics.
    ///
    /// This is the plain metadata write path. It carries no audit trail, so
    /// quantity changes belong on `adjust` — the one exception is the bulk
    /// stock-entry flow, which sets quantities wholesale by design.
    pub fn update_record(
        &self,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<InventoryRecord, ServiceError> {
        let current: InventoryRecord = self.get_doc("inventory_records", id)?;
        let mut updated: InventoryRecord = Self::apply_patch(&current, patch)?;

        if updated.quantity < 0 {
            return Err(ServiceError::Validation(format!(
                "quantity may not be negative: {}",
                updated.quantity
            )));
        }

        updated.id = current.id.clone();
        updated.last_updated = now_rfc3339();

        self.update_doc("inventory_records", id, &updated, &record_indexes(&updated))?;

        self.record_history(HistoryEvent::new(
            "update",
            "inventory_records",
            id,
            serde_json::to_value(&current).ok(),
            serde_json::to_value(&updated).ok(),
        ));

        Ok(updated)
    }

    /// Delete a record. Irreversible; the product's cached aggregate is
    /// deliberately left untouched.
    pub fn delete_record(&self, id: &str) -> Result<(), ServiceError> {
        let current: InventoryRecord = self.get_doc("inventory_records", id)?;
        self.delete_doc("inventory_records", id)?;

        self.record_history(HistoryEvent::new(
            "delete",
            "inventory_records",
            id,
            serde_json::to_value(&current).ok(),
            None,
        ));

        Ok(())
    }
}
