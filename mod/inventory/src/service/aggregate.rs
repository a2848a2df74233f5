use std::collections::{HashMap, HashSet};

use serde::Serialize;

use salondesk_core::ServiceError;

use super::InventoryService;
use crate::branch::BranchKey;
use crate::model::{InventoryRecord, Product, ProductKey, StockStatus, name_key};

/// One row of the stock overview screen.
///
/// Linked rows come from the catalog; unlinked rows are groups of records
/// sharing a name with no canonical product. The two stay separate even
/// when names collide — only a reconciling stock submission merges them.
#[derive(Debug, Clone, Serialize)]
pub struct StockRow {
    pub key: ProductKey,
    pub display_name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub price: Option<f64>,
    pub image_url: Option<String>,
    pub quantity: i64,
    pub status: StockStatus,
    /// Unlinked groups support the rename/merge flow; linked rows don't.
    pub editable: bool,
}

struct UnlinkedGroup<'a> {
    first: &'a InventoryRecord,
    quantity: i64,
}

impl InventoryService {
    /// Produce the per-product display rows: every product with at least
    /// one linked record, plus every distinct unlinked name.
    ///
    /// `branch` restricts the summed quantities (not row membership) and
    /// may be a branch id or display name; `search` is a case-insensitive
    /// substring filter on the display name.
    pub fn stock_overview(
        &self,
        branch: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<StockRow>, ServiceError> {
        let products: Vec<Product> =
            self.query_docs("SELECT data FROM products ORDER BY name_ci, created_at", &[])?;
        let records: Vec<InventoryRecord> =
            self.query_docs("SELECT data FROM inventory_records ORDER BY id", &[])?;

        let filter = match branch {
            Some(reference) => {
                let live = self.list_branches()?;
                Some(BranchKey::resolve(reference, &live))
            }
            None => None,
        };
        let in_scope = |r: &InventoryRecord| {
            filter
                .as_ref()
                .is_none_or(|key| key.matches(&r.branch_id, &r.branch_name))
        };

        let product_ids: HashSet<&str> = products.iter().map(|p| p.id.as_str()).collect();

        let mut linked_quantity: HashMap<&str, i64> = HashMap::new();
        let mut has_records: HashSet<&str> = HashSet::new();
        let mut unlinked: HashMap<String, UnlinkedGroup<'_>> = HashMap::new();

        for record in &records {
            // A product_id pointing at a deleted product counts as unlinked.
            match record
                .product_id
                .as_deref()
                .filter(|id| product_ids.contains(id))
            {
                Some(product_id) => {
                    has_records.insert(product_id);
                    if in_scope(record) {
                        *linked_quantity.entry(product_id).or_insert(0) += record.quantity;
                    }
                }
                None => {
                    let group = unlinked
                        .entry(name_key(&record.product_name))
                        .or_insert(UnlinkedGroup {
                            first: record,
                            quantity: 0,
                        });
                    if in_scope(record) {
                        group.quantity += record.quantity;
                    }
                }
            }
        }

        let mut rows = Vec::new();
        for product in &products {
            if !has_records.contains(product.id.as_str()) {
                continue;
            }
            let quantity = linked_quantity.get(product.id.as_str()).copied().unwrap_or(0);
            rows.push(StockRow {
                key: ProductKey::Linked(product.id.clone()),
                display_name: product.name.clone(),
                brand: product.brand.clone(),
                category: product.category.clone(),
                unit: product.unit.clone(),
                price: product.price,
                image_url: product.image_url.clone(),
                quantity,
                status: StockStatus::for_quantity(quantity),
                editable: false,
            });
        }
        for group in unlinked.values() {
            rows.push(StockRow {
                key: ProductKey::Unlinked(group.first.product_name.clone()),
                display_name: group.first.product_name.clone(),
                brand: None,
                category: group.first.category.clone(),
                unit: group.first.unit.clone(),
                price: group.first.price,
                image_url: group.first.image_url.clone(),
                quantity: group.quantity,
                status: StockStatus::for_quantity(group.quantity),
                editable: true,
            });
        }

        if let Some(term) = search.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()) {
            rows.retain(|row| row.display_name.to_lowercase().contains(&term));
        }

        rows.sort_by(|a, b| name_key(&a.display_name).cmp(&name_key(&b.display_name)));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::records::CreateRecordInput;
    use crate::service::reconcile::{AddStockInput, BranchStockEntry};
    use crate::service::testutil::test_service;

    fn submission(name: &str, entries: Vec<(&str, &str, i64)>) -> AddStockInput {
        AddStockInput {
            name: name.into(),
            brand: None,
            category: None,
            unit: None,
            price: None,
            image_url: None,
            entries: entries
                .into_iter()
                .map(|(id, name, quantity)| BranchStockEntry {
                    branch_id: id.into(),
                    branch_name: name.into(),
                    quantity,
                })
                .collect(),
        }
    }

    fn unlinked_record(svc: &InventoryService, name: &str, branch: &str, quantity: i64) {
        svc.create_record(CreateRecordInput {
            product_id: None,
            product_name: name.into(),
            branch_id: branch.into(),
            branch_name: branch.to_uppercase(),
            quantity,
            unit: None,
            category: None,
            image_url: None,
            price: None,
        })
        .unwrap();
    }

    #[test]
    fn test_linked_and_unlinked_rows_stay_separate_until_merged() {
        let svc = test_service();

        svc.add_stock(submission("Argan Oil", vec![("b1", "Harbor", 3), ("b2", "Hillside", 4)]))
            .unwrap();
        // Stray entered after the submission, so it stays unlinked.
        unlinked_record(&svc, "argan oil", "b3", 2);

        let rows = svc.stock_overview(None, None).unwrap();
        assert_eq!(rows.len(), 2);
        let linked = rows.iter().find(|r| !r.editable).unwrap();
        let unlinked = rows.iter().find(|r| r.editable).unwrap();
        assert_eq!(linked.quantity, 7);
        assert_eq!(unlinked.quantity, 2);
        assert!(matches!(unlinked.key, ProductKey::Unlinked(_)));

        // The next stock submission reconciles the stray into the product.
        svc.add_stock(submission("Argan Oil", vec![("b1", "Harbor", 3)]))
            .unwrap();
        let rows = svc.stock_overview(None, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, 9);
    }

    #[test]
    fn test_branch_filter_by_id_and_name() {
        let svc = test_service();
        svc.upsert_branch("b1", "Harbor").unwrap();
        svc.upsert_branch("b2", "Hillside").unwrap();

        svc.add_stock(submission("Argan Oil", vec![("b1", "Harbor", 3), ("b2", "Hillside", 4)]))
            .unwrap();

        let by_id = svc.stock_overview(Some("b1"), None).unwrap();
        assert_eq!(by_id[0].quantity, 3);

        // A display-name reference resolves through the registry.
        let by_name = svc.stock_overview(Some("Hillside"), None).unwrap();
        assert_eq!(by_name[0].quantity, 4);
    }

    #[test]
    fn test_branch_name_matcher_covers_id_less_rows() {
        let svc = test_service();
        svc.upsert_branch("b1", "Harbor").unwrap();

        // Historical row carrying only the display name.
        svc.create_record(CreateRecordInput {
            product_id: None,
            product_name: "Clay Wax".into(),
            branch_id: "".into(),
            branch_name: "Harbor".into(),
            quantity: 6,
            unit: None,
            category: None,
            image_url: None,
            price: None,
        })
        .unwrap();

        let rows = svc.stock_overview(Some("b1"), None).unwrap();
        assert_eq!(rows[0].quantity, 6);
    }

    #[test]
    fn test_branch_filter_uses_fallback_table_when_registry_empty() {
        let svc = test_service();
        unlinked_record(&svc, "Clay Wax", "branch-downtown", 4);

        // "Downtown" only exists in the compiled-in table.
        let rows = svc.stock_overview(Some("Downtown"), None).unwrap();
        assert_eq!(rows[0].quantity, 4);
    }

    #[test]
    fn test_filtered_out_branches_zero_the_row_not_drop_it() {
        let svc = test_service();
        svc.add_stock(submission("Argan Oil", vec![("b1", "Harbor", 3)]))
            .unwrap();

        let rows = svc.stock_overview(Some("b9"), None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, 0);
        assert_eq!(rows[0].status, StockStatus::NoStock);
    }

    #[test]
    fn test_products_without_records_are_not_listed() {
        let svc = test_service();
        svc.create_product(crate::service::catalog::CreateProductInput {
            name: "Phantom".into(),
            brand: None,
            category: None,
            unit: None,
            price: None,
            image_url: None,
            quantity: 0,
        })
        .unwrap();

        assert!(svc.stock_overview(None, None).unwrap().is_empty());
    }

    #[test]
    fn test_search_filters_by_display_name_substring() {
        let svc = test_service();
        svc.add_stock(submission("Argan Oil", vec![("b1", "Harbor", 3)]))
            .unwrap();
        svc.add_stock(submission("Clay Wax", vec![("b1", "Harbor", 9)]))
            .unwrap();

        let rows = svc.stock_overview(None, Some("ARGAN")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].display_name, "Argan Oil");
    }

    #[test]
    fn test_row_status_thresholds() {
        let svc = test_service();
        svc.add_stock(submission("None Left", vec![("b1", "Harbor", 1)]))
            .unwrap();
        let record = &svc.list_by_branch("b1").unwrap()[0];
        svc.adjust(&record.id, -1, "sale", None).unwrap();
        svc.add_stock(submission("Low", vec![("b2", "Hillside", 5)]))
            .unwrap();
        svc.add_stock(submission("Plenty", vec![("b3", "Marina", 6)]))
            .unwrap();

        let rows = svc.stock_overview(None, None).unwrap();
        let status_of = |name: &str| {
            rows.iter()
                .find(|r| r.display_name == name)
                .map(|r| r.status)
                .unwrap()
        };
        assert_eq!(status_of("None Left"), StockStatus::NoStock);
        assert_eq!(status_of("Low"), StockStatus::LowStock);
        assert_eq!(status_of("Plenty"), StockStatus::InStock);
    }
}
