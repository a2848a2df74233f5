use serde::{Deserialize, Serialize};

use salondesk_core::Actor;

/// Quantities at or below this count show as "Low stock" in the overview.
/// A fixed policy constant, not configurable per product.
pub const LOW_STOCK_THRESHOLD: i64 = 5;

/// Canonical lookup key for a product name: trimmed, lowercased.
///
/// Every name-based match in this module (catalog lookups, reconciliation,
/// unlinked grouping) goes through this, so "Shampoo " and "shampoo" land
/// on the same key.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// One per-branch stock row. `product_id` is None while the record is
/// "unlinked" — created before a canonical product existed. In that state
/// `product_name` is the source of truth for identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: String,
    pub product_id: Option<String>,
    pub product_name: String,
    pub branch_id: String,
    pub branch_name: String,
    pub quantity: i64,

    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,

    pub last_updated: String,
}

/// Canonical catalog entry.
///
/// `quantity` is a cached aggregate maintained additively by the
/// reconciliation path. It is eventually consistent and never assumed
/// exact; `recompute_quantity` is the authoritative derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,

    pub quantity: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Append-only audit entry, one per quantity mutation.
///
/// Never mutated after creation. Replaying a record's entries in
/// `created_at` order from 0 reproduces every historical quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryAdjustment {
    pub id: String,
    pub record_id: String,
    pub product_id: Option<String>,
    pub branch_id: Option<String>,
    pub before: i64,
    pub after: i64,
    pub delta: i64,
    pub reason: String,
    pub created_by: Option<Actor>,
    pub created_at: String,
}

/// Identity of one stock-overview row: either a canonical product or a
/// group of unlinked records sharing a name. The two are never merged at
/// read time; only reconciliation promotes an unlinked group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ProductKey {
    Linked(String),
    Unlinked(String),
}

/// Derived stock status for an overview row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StockStatus {
    #[serde(rename = "No stock")]
    NoStock,
    #[serde(rename = "Low stock")]
    LowStock,
    #[serde(rename = "In stock")]
    InStock,
}

impl StockStatus {
    pub fn for_quantity(quantity: i64) -> Self {
        if quantity <= 0 {
            StockStatus::NoStock
        } else if quantity <= LOW_STOCK_THRESHOLD {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }

    /// Display label as shown on the stock screen.
    pub fn label(&self) -> &'static str {
        match self {
            StockStatus::NoStock => "No stock",
            StockStatus::LowStock => "Low stock",
            StockStatus::InStock => "In stock",
        }
    }
}
