use std::collections::HashMap;

use salondesk_core::ServiceError;
use salondesk_sql::Value;

use super::InventoryService;
use crate::model::InventoryAdjustment;

impl InventoryService {
    /// Adjustments for a product, oldest first (replay order), optionally
    /// restricted to entries at or after `since` (RFC 3339).
    pub fn list_for_product(
        &self,
        product_id: &str,
        since: Option<&str>,
    ) -> Result<Vec<InventoryAdjustment>, ServiceError> {
        self.list_adjustments(Some(("product_id", product_id)), since)
    }

    /// Adjustments recorded at a branch, oldest first.
    pub fn list_for_branch(
        &self,
        branch_id: &str,
        since: Option<&str>,
    ) -> Result<Vec<InventoryAdjustment>, ServiceError> {
        self.list_adjustments(Some(("branch_id", branch_id)), since)
    }

    /// Every adjustment in the window, oldest first.
    pub fn list_all(
        &self,
        since: Option<&str>,
    ) -> Result<Vec<InventoryAdjustment>, ServiceError> {
        self.list_adjustments(None, since)
    }

    fn list_adjustments(
        &self,
        filter: Option<(&str, &str)>,
        since: Option<&str>,
    ) -> Result<Vec<InventoryAdjustment>, ServiceError> {
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        if let Some((col, val)) = filter {
            params.push(Value::Text(val.to_string()));
            clauses.push(format!("{} = ?{}", col, params.len()));
        }
        if let Some(ts) = since {
            params.push(Value::Text(ts.to_string()));
            clauses.push(format!("created_at >= ?{}", params.len()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        self.query_docs(
            &format!(
                "SELECT data FROM inventory_adjustments{} ORDER BY created_at, id",
                where_sql
            ),
            &params,
        )
    }

    /// Cost of stock consumed in the window: Σ |delta| × product price over
    /// negative-delta adjustments. Recomputed on every call; adjustments
    /// with no linked product (or an unpriced product) contribute nothing.
    pub fn consumed_cost(&self, since: Option<&str>) -> Result<f64, ServiceError> {
        let adjustments = self.list_all(since)?;

        let mut prices: HashMap<String, Option<f64>> = HashMap::new();
        let mut total = 0.0;
        for adj in adjustments.iter().filter(|a| a.delta < 0) {
            let Some(product_id) = &adj.product_id else {
                continue;
            };
            let price = prices
                .entry(product_id.clone())
                .or_insert_with(|| self.get_product(product_id).ok().and_then(|p| p.price));
            if let Some(price) = *price {
                total += adj.delta.unsigned_abs() as f64 * price;
            }
        }
        Ok(total)
    }
}
