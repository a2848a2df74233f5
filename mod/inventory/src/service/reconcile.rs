use salondesk_core::{ServiceError, new_id, now_rfc3339};
use salondesk_sql::Value;
use tracing::{debug, info, warn};

use super::InventoryService;
use super::catalog::{CreateProductInput, product_indexes};
use super::records::record_indexes;
use crate::history::HistoryEvent;
use crate::model::{InventoryRecord, Product, name_key};

/// One branch's share of a stock submission.
pub struct BranchStockEntry {
    pub branch_id: String,
    pub branch_name: String,
    pub quantity: i64,
}

/// A bulk "add stock" submission: one free-text product name plus the
/// per-branch quantities being entered.
pub struct AddStockInput {
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub price: Option<f64>,
    pub image_url: Option<String>,
    pub entries: Vec<BranchStockEntry>,
}

#[derive(Debug)]
pub struct AddStockOutcome {
    pub product: Product,
    pub created_product: bool,
    /// Branch records written by this submission, in entry order.
    pub records: Vec<InventoryRecord>,
    /// Pre-existing unlinked records promoted onto the product.
    pub promoted: usize,
    pub total_added: i64,
}

fn fill_if_empty(existing: &mut Option<String>, incoming: &Option<String>) {
    if existing.as_deref().is_none_or(str::is_empty) {
        if let Some(v) = incoming {
            if !v.is_empty() {
                *existing = Some(v.clone());
            }
        }
    }
}

impl InventoryService {
    /// Reconcile a stock submission against existing records and the
    /// catalog.
    ///
    /// Per branch with a positive quantity, the matching (name, branch)
    /// record is overwritten — set, not added — or created. The product
    /// aggregate is additive: the cached quantity grows by the submission
    /// total. Branch writes are sequential and not atomic as a group; a
    /// failure partway leaves earlier branches already written.
    pub fn add_stock(&self, input: AddStockInput) -> Result<AddStockOutcome, ServiceError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::Validation("product name is required".into()));
        }
        for entry in &input.entries {
            if entry.quantity < 0 {
                return Err(ServiceError::Validation(format!(
                    "quantity may not be negative for branch {}: {}",
                    entry.branch_id, entry.quantity
                )));
            }
        }

        let key = name_key(&name);
        let total_added: i64 = input.entries.iter().map(|e| e.quantity).sum();

        // 1. Write one record per branch with stock in this submission.
        let mut written: Vec<InventoryRecord> = Vec::new();
        for entry in input.entries.iter().filter(|e| e.quantity > 0) {
            written.push(self.write_branch_record(&name, &key, entry, &input)?);
        }

        // 2. Find-or-create the canonical product; the aggregate is a cheap
        //    additive cache, never recomputed here.
        let (product, created_product) = match self.find_by_name(&name)? {
            Some(existing) => (self.absorb_submission(existing, &input, total_added)?, false),
            None => (
                self.create_product(CreateProductInput {
                    name: name.clone(),
                    brand: input.brand.clone(),
                    category: input.category.clone(),
                    unit: input.unit.clone(),
                    price: input.price,
                    image_url: input.image_url.clone(),
                    quantity: total_added,
                })?,
                true,
            ),
        };

        // 3. Lazy promotion: every unlinked record sharing this name gets
        //    linked now. This is the only path that sets `product_id`.
        let written_ids: Vec<&str> = written.iter().map(|r| r.id.as_str()).collect();
        let promoted = self.promote_unlinked(&key, &product.id, &written_ids)?;
        for record in &mut written {
            record.product_id = Some(product.id.clone());
        }

        info!(
            "add stock: '{}' → {} branch record(s), total {}, product {} ({})",
            name,
            written.len(),
            total_added,
            product.id,
            if created_product { "created" } else { "updated" },
        );

        Ok(AddStockOutcome {
            product,
            created_product,
            records: written,
            promoted,
            total_added,
        })
    }

    /// Rewrite the name on every unlinked record matching `old_name`.
    ///
    /// Linking is not retroactive: the rewritten records stay unlinked
    /// until the next stock submission for the new name reconciles them.
    pub fn rename_unlinked(
        &self,
        old_name: &str,
        new_name: &str,
    ) -> Result<Vec<InventoryRecord>, ServiceError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(ServiceError::Validation("product name is required".into()));
        }

        let matching: Vec<InventoryRecord> = self.query_docs(
            "SELECT data FROM inventory_records
             WHERE product_id IS NULL AND name_ci = ?1 ORDER BY id",
            &[Value::Text(name_key(old_name))],
        )?;

        let mut renamed = Vec::with_capacity(matching.len());
        for record in matching {
            let mut updated = record.clone();
            updated.product_name = new_name.to_string();
            updated.last_updated = now_rfc3339();

            self.update_doc(
                "inventory_records",
                &updated.id,
                &updated,
                &record_indexes(&updated),
            )?;

            self.record_history(HistoryEvent::new(
                "update",
                "inventory_records",
                &updated.id,
                serde_json::to_value(&record).ok(),
                serde_json::to_value(&updated).ok(),
            ));

            renamed.push(updated);
        }

        info!(
            "renamed {} unlinked record(s): '{}' → '{}'",
            renamed.len(),
            old_name,
            new_name
        );
        Ok(renamed)
    }

    /// Set-or-create the record for one (name, branch) pair.
    fn write_branch_record(
        &self,
        name: &str,
        key: &str,
        entry: &BranchStockEntry,
        input: &AddStockInput,
    ) -> Result<InventoryRecord, ServiceError> {
        let existing: Vec<InventoryRecord> = self.query_docs(
            "SELECT data FROM inventory_records
             WHERE name_ci = ?1 AND branch_id = ?2 ORDER BY id",
            &[
                Value::Text(key.to_string()),
                Value::Text(entry.branch_id.clone()),
            ],
        )?;

        if existing.len() > 1 {
            // One record per (name, branch) is the invariant; historical
            // data can violate it. Pick the first match deterministically
            // and keep the anomaly visible.
            warn!(
                "{} records for ('{}', {}); updating the first match",
                existing.len(),
                name,
                entry.branch_id
            );
        }

        match existing.into_iter().next() {
            Some(record) => {
                let mut updated = record.clone();
                updated.quantity = entry.quantity;
                updated.branch_name = entry.branch_name.clone();
                updated.last_updated = now_rfc3339();

                self.update_doc(
                    "inventory_records",
                    &updated.id,
                    &updated,
                    &record_indexes(&updated),
                )?;

                debug!(
                    "stock entry: record {} ('{}', {}) set to {}",
                    updated.id, name, entry.branch_id, entry.quantity
                );
                self.record_history(HistoryEvent::new(
                    "update",
                    "inventory_records",
                    &updated.id,
                    serde_json::to_value(&record).ok(),
                    serde_json::to_value(&updated).ok(),
                ));

                Ok(updated)
            }
            None => {
                let record = InventoryRecord {
                    id: new_id(),
                    product_id: None,
                    product_name: name.to_string(),
                    branch_id: entry.branch_id.clone(),
                    branch_name: entry.branch_name.clone(),
                    quantity: entry.quantity,
                    unit: input.unit.clone(),
                    category: input.category.clone(),
                    image_url: input.image_url.clone(),
                    price: input.price,
                    last_updated: now_rfc3339(),
                };

                self.insert_doc(
                    "inventory_records",
                    &record.id,
                    &record,
                    &record_indexes(&record),
                )?;

                debug!(
                    "stock entry: record {} ('{}', {}) created with {}",
                    record.id, name, entry.branch_id, entry.quantity
                );
                self.record_history(HistoryEvent::new(
                    "create",
                    "inventory_records",
                    &record.id,
                    None,
                    serde_json::to_value(&record).ok(),
                ));

                Ok(record)
            }
        }
    }

    /// Grow the cached aggregate and merge newly supplied descriptive
    /// fields into gaps only — a populated field is never overwritten.
    fn absorb_submission(
        &self,
        current: Product,
        input: &AddStockInput,
        total_added: i64,
    ) -> Result<Product, ServiceError> {
        let mut updated = current.clone();
        updated.quantity = current.quantity + total_added;

        fill_if_empty(&mut updated.brand, &input.brand);
        fill_if_empty(&mut updated.category, &input.category);
        fill_if_empty(&mut updated.unit, &input.unit);
        fill_if_empty(&mut updated.image_url, &input.image_url);
        if updated.price.is_none() {
            updated.price = input.price;
        }
        updated.updated_at = now_rfc3339();

        self.update_doc("products", &updated.id, &updated, &product_indexes(&updated))?;

        self.record_history(HistoryEvent::new(
            "update",
            "products",
            &updated.id,
            serde_json::to_value(&current).ok(),
            serde_json::to_value(&updated).ok(),
        ));

        Ok(updated)
    }

    /// Link every unlinked record matching `key` onto `product_id`.
    /// Records already written by the running submission are relinked
    /// silently; strays get their own feed event.
    fn promote_unlinked(
        &self,
        key: &str,
        product_id: &str,
        written_ids: &[&str],
    ) -> Result<usize, ServiceError> {
        let unlinked: Vec<InventoryRecord> = self.query_docs(
            "SELECT data FROM inventory_records
             WHERE product_id IS NULL AND name_ci = ?1 ORDER BY id",
            &[Value::Text(key.to_string())],
        )?;

        let mut promoted = 0;
        for record in unlinked {
            let mut updated = record.clone();
            updated.product_id = Some(product_id.to_string());

            self.update_doc(
                "inventory_records",
                &updated.id,
                &updated,
                &record_indexes(&updated),
            )?;

            if !written_ids.contains(&record.id.as_str()) {
                promoted += 1;
                debug!("promoted unlinked record {} onto product {}", record.id, product_id);
                self.record_history(HistoryEvent::new(
                    "update",
                    "inventory_records",
                    &updated.id,
                    serde_json::to_value(&record).ok(),
                    serde_json::to_value(&updated).ok(),
                ));
            }
        }
        Ok(promoted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::records::CreateRecordInput;
    use crate::service::testutil::test_service;

    fn entry(branch_id: &str, branch_name: &str, quantity: i64) -> BranchStockEntry {
        BranchStockEntry {
            branch_id: branch_id.into(),
            branch_name: branch_name.into(),
            quantity,
        }
    }

    fn submission(name: &str, entries: Vec<BranchStockEntry>) -> AddStockInput {
        AddStockInput {
            name: name.into(),
            brand: None,
            category: None,
            unit: None,
            price: None,
            image_url: None,
            entries,
        }
    }

    #[test]
    fn test_add_stock_creates_product_and_records() {
        let svc = test_service();

        let outcome = svc
            .add_stock(submission(
                "Argan Oil",
                vec![entry("b1", "Harbor", 5), entry("b2", "Hillside", 3)],
            ))
            .unwrap();

        assert!(outcome.created_product);
        assert_eq!(outcome.total_added, 8);
        assert_eq!(outcome.product.quantity, 8);
        assert_eq!(outcome.records.len(), 2);
        // Written records end up linked.
        for record in &outcome.records {
            let stored = svc.get_record(&record.id).unwrap();
            assert_eq!(stored.product_id.as_deref(), Some(outcome.product.id.as_str()));
        }
    }

    #[test]
    fn test_overwrite_record_additive_aggregate() {
        let svc = test_service();

        svc.add_stock(submission("Argan Oil", vec![entry("b1", "Harbor", 5)]))
            .unwrap();
        let outcome = svc
            .add_stock(submission("argan oil", vec![entry("b1", "Harbor", 3)]))
            .unwrap();

        // Record quantity is set, not added; the cached aggregate is added.
        let records = svc.list_by_branch("b1").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].quantity, 3);
        assert_eq!(outcome.product.quantity, 8);
        assert!(!outcome.created_product);
    }

    #[test]
    fn test_zero_quantity_entries_are_skipped() {
        let svc = test_service();
        let outcome = svc
            .add_stock(submission(
                "Argan Oil",
                vec![entry("b1", "Harbor", 4), entry("b2", "Hillside", 0)],
            ))
            .unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert!(svc.list_by_branch("b2").unwrap().is_empty());
        assert_eq!(outcome.total_added, 4);
    }

    #[test]
    fn test_add_stock_rejects_negative_entry() {
        let svc = test_service();
        let err = svc
            .add_stock(submission("Argan Oil", vec![entry("b1", "Harbor", -2)]))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn test_descriptive_merge_fills_gaps_only() {
        let svc = test_service();

        svc.add_stock(submission("Argan Oil", vec![entry("b1", "Harbor", 1)]))
            .unwrap();

        let mut second = submission("Argan Oil", vec![entry("b1", "Harbor", 2)]);
        second.brand = Some("Lumen".into());
        second.price = Some(18.5);
        let outcome = svc.add_stock(second).unwrap();
        assert_eq!(outcome.product.brand.as_deref(), Some("Lumen"));
        assert_eq!(outcome.product.price, Some(18.5));

        let mut third = submission("Argan Oil", vec![entry("b1", "Harbor", 3)]);
        third.brand = Some("Other".into());
        let outcome = svc.add_stock(third).unwrap();
        // Populated fields are never overwritten.
        assert_eq!(outcome.product.brand.as_deref(), Some("Lumen"));
    }

    #[test]
    fn test_promotes_stray_unlinked_records() {
        let svc = test_service();

        let stray = svc
            .create_record(CreateRecordInput {
                product_id: None,
                product_name: "Argan Oil".into(),
                branch_id: "b3".into(),
                branch_name: "Marina".into(),
                quantity: 2,
                unit: None,
                category: None,
                image_url: None,
                price: None,
            })
            .unwrap();

        let outcome = svc
            .add_stock(submission("argan oil", vec![entry("b1", "Harbor", 5)]))
            .unwrap();

        assert_eq!(outcome.promoted, 1);
        let linked = svc.get_record(&stray.id).unwrap();
        assert_eq!(linked.product_id.as_deref(), Some(outcome.product.id.as_str()));

        // The cache only saw this submission; the derivation sees the stray.
        assert_eq!(outcome.product.quantity, 5);
        assert_eq!(svc.recompute_quantity(&outcome.product.id).unwrap(), 7);
    }

    #[test]
    fn test_rename_unlinked_keeps_records_unlinked() {
        let svc = test_service();

        for branch in ["b1", "b2"] {
            svc.create_record(CreateRecordInput {
                product_id: None,
                product_name: "Argon Oil".into(),
                branch_id: branch.into(),
                branch_name: branch.to_uppercase(),
                quantity: 1,
                unit: None,
                category: None,
                image_url: None,
                price: None,
            })
            .unwrap();
        }

        let renamed = svc.rename_unlinked("argon oil", "Argan Oil").unwrap();
        assert_eq!(renamed.len(), 2);
        for record in &renamed {
            assert_eq!(record.product_name, "Argan Oil");
            assert!(record.product_id.is_none());
        }
        assert_eq!(svc.list_by_name("Argan Oil").unwrap().len(), 2);
    }

    #[test]
    fn test_rename_skips_linked_records() {
        let svc = test_service();

        // Linked record whose name matches: rename must not touch it.
        let outcome = svc
            .add_stock(submission("Argan Oil", vec![entry("b1", "Harbor", 5)]))
            .unwrap();
        let renamed = svc.rename_unlinked("Argan Oil", "Premium Argan").unwrap();
        assert!(renamed.is_empty());
        assert_eq!(
            svc.get_record(&outcome.records[0].id).unwrap().product_name,
            "Argan Oil"
        );
    }

    #[test]
    fn test_duplicate_name_branch_rows_update_first_match() {
        let svc = test_service();

        let first = svc
            .create_record(CreateRecordInput {
                product_id: None,
                product_name: "Argan Oil".into(),
                branch_id: "b1".into(),
                branch_name: "Harbor".into(),
                quantity: 1,
                unit: None,
                category: None,
                image_url: None,
                price: None,
            })
            .unwrap();
        let second = svc
            .create_record(CreateRecordInput {
                product_id: None,
                product_name: "Argan Oil".into(),
                branch_id: "b1".into(),
                branch_name: "Harbor".into(),
                quantity: 2,
                unit: None,
                category: None,
                image_url: None,
                price: None,
            })
            .unwrap();

        svc.add_stock(submission("Argan Oil", vec![entry("b1", "Harbor", 9)]))
            .unwrap();

        let (updated, untouched) = if first.id < second.id {
            (first, second)
        } else {
            (second, first)
        };
        assert_eq!(svc.get_record(&updated.id).unwrap().quantity, 9);
        // The other duplicate keeps its quantity (and still gets promoted).
        let stored = svc.get_record(&untouched.id).unwrap();
        assert_eq!(stored.quantity, untouched.quantity);
        assert!(stored.product_id.is_some());
    }
}
