use salondesk_core::{ListParams, ListResult, ServiceError, new_id, now_rfc3339};
use salondesk_sql::Value;

use super::InventoryService;
use crate::history::HistoryEvent;
use crate::model::{Product, name_key};

pub struct CreateProductInput {
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub price: Option<f64>,
    pub image_url: Option<String>,
    /// Caller-supplied aggregate, typically the sum of the branch
    /// quantities just written.
    pub quantity: i64,
}

pub(crate) fn product_indexes(product: &Product) -> Vec<(&'static str, Value)> {
    vec![
        ("name", Value::Text(product.name.clone())),
        ("name_ci", Value::Text(name_key(&product.name))),
        ("quantity", Value::Integer(product.quantity)),
        ("created_at", Value::Text(product.created_at.clone())),
        ("updated_at", Value::Text(product.updated_at.clone())),
    ]
}

impl InventoryService {
    /// Create a canonical catalog entry.
    pub fn create_product(&self, input: CreateProductInput) -> Result<Product, ServiceError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(ServiceError::Validation("product name is required".into()));
        }
        if input.quantity < 0 {
            return Err(ServiceError::Validation(format!(
                "quantity may not be negative: {}",
                input.quantity
            )));
        }

        let now = now_rfc3339();
        let product = Product {
            id: new_id(),
            name: name.to_string(),
            brand: input.brand,
            category: input.category,
            unit: input.unit,
            price: input.price,
            image_url: input.image_url,
            quantity: input.quantity,
            created_at: now.clone(),
            updated_at: now,
        };

        self.insert_doc("products", &product.id, &product, &product_indexes(&product))?;

        self.record_history(HistoryEvent::new(
            "create",
            "products",
            &product.id,
            None,
            serde_json::to_value(&product).ok(),
        ));

        Ok(product)
    }

    /// Get a product by id.
    pub fn get_product(&self, id: &str) -> Result<Product, ServiceError> {
        self.get_doc("products", id)
    }

    /// Find a product by case-insensitive, whitespace-trimmed name
    /// equality. First match (oldest entry) wins; no fuzzy matching.
    pub fn find_by_name(&self, name: &str) -> Result<Option<Product>, ServiceError> {
        let matches: Vec<Product> = self.query_docs(
            "SELECT data FROM products WHERE name_ci = ?1 ORDER BY created_at, id LIMIT 1",
            &[Value::Text(name_key(name))],
        )?;
        Ok(matches.into_iter().next())
    }

    /// List products with pagination, newest first.
    pub fn list_products(&self, params: &ListParams) -> Result<ListResult<Product>, ServiceError> {
        let (items, total) = self.list_docs(
            "products",
            &[],
            "created_at DESC",
            params.limit,
            params.offset,
        )?;
        Ok(ListResult { items, total })
    }

    /// Update a product with JSON merge-patch semantics.
    pub fn update_product(
        &self,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<Product, ServiceError> {
        let current: Product = self.get_doc("products", id)?;
        let mut updated: Product = Self::apply_patch(&current, patch)?;

        if updated.quantity < 0 {
            return Err(ServiceError::Validation(format!(
                "quantity may not be negative: {}",
                updated.quantity
            )));
        }

        updated.id = current.id.clone();
        updated.created_at = current.created_at.clone();
        updated.updated_at = now_rfc3339();

        self.update_doc("products", id, &updated, &product_indexes(&updated))?;

        self.record_history(HistoryEvent::new(
            "update",
            "products",
            id,
            serde_json::to_value(&current).ok(),
            serde_json::to_value(&updated).ok(),
        ));

        Ok(updated)
    }

    /// Delete a catalog entry. Explicit and independent: branch records
    /// referencing it are left in place and fall back to unlinked grouping.
    pub fn delete_product(&self, id: &str) -> Result<(), ServiceError> {
        let current: Product = self.get_doc("products", id)?;
        self.delete_doc("products", id)?;

        self.record_history(HistoryEvent::new(
            "delete",
            "products",
            id,
            serde_json::to_value(&current).ok(),
            None,
        ));

        Ok(())
    }

    /// Authoritative aggregate derivation, in contrast to the cached
    /// `Product.quantity`: sums every record linked by id, plus unlinked
    /// records whose name matches case-insensitively.
    pub fn recompute_quantity(&self, product_id: &str) -> Result<i64, ServiceError> {
        let product: Product = self.get_doc("products", product_id)?;

        let rows = self
            .sql
            .query(
                "SELECT COALESCE(SUM(quantity), 0) AS total FROM inventory_records
                 WHERE product_id = ?1 OR (product_id IS NULL AND name_ci = ?2)",
                &[
                    Value::Text(product_id.to_string()),
                    Value::Text(name_key(&product.name)),
                ],
            )
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        Ok(rows.first().and_then(|r| r.get_i64("total")).unwrap_or(0))
    }
}
