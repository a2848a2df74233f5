use salondesk_core::ServiceError;
use salondesk_sql::SQLStore;

/// SQL DDL statements to initialize the inventory database schema.
///
/// Each table stores the full JSON document in a `data` TEXT column, with
/// indexed columns extracted for filtering. `name_ci` columns hold the
/// trimmed, lowercased product name used by every case-insensitive lookup.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS products (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        name TEXT,
        name_ci TEXT,
        quantity INTEGER,
        created_at TEXT,
        updated_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS inventory_records (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        product_id TEXT,
        product_name TEXT,
        name_ci TEXT,
        branch_id TEXT,
        branch_name TEXT,
        quantity INTEGER,
        last_updated TEXT
    )",
    "CREATE TABLE IF NOT EXISTS inventory_adjustments (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        record_id TEXT,
        product_id TEXT,
        branch_id TEXT,
        delta INTEGER,
        created_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS history_events (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        action TEXT,
        collection TEXT,
        doc_id TEXT,
        created_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS branches (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        name TEXT
    )",
    // Indexes
    "CREATE INDEX IF NOT EXISTS idx_rec_product ON inventory_records(product_id)",
    "CREATE INDEX IF NOT EXISTS idx_rec_name ON inventory_records(name_ci)",
    "CREATE INDEX IF NOT EXISTS idx_rec_branch ON inventory_records(branch_id)",
    "CREATE INDEX IF NOT EXISTS idx_prod_name ON products(name_ci)",
    "CREATE INDEX IF NOT EXISTS idx_adj_record ON inventory_adjustments(record_id)",
    "CREATE INDEX IF NOT EXISTS idx_adj_product ON inventory_adjustments(product_id)",
    "CREATE INDEX IF NOT EXISTS idx_adj_branch ON inventory_adjustments(branch_id)",
    "CREATE INDEX IF NOT EXISTS idx_adj_created ON inventory_adjustments(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_hist_created ON history_events(created_at)",
];

pub fn init_schema(sql: &dyn SQLStore) -> Result<(), ServiceError> {
    for stmt in SCHEMA {
        sql.exec(stmt, &[])
            .map_err(|e| ServiceError::Storage(format!("schema init failed: {}", e)))?;
    }
    Ok(())
}
