//! Common test data and constants

use backup_manager::store::{Row, Value};

/// Tables of the seeded shop database and their row counts
pub mod tables {
    pub const CUSTOMERS: &str = "customers";
    pub const ORDERS: &str = "orders";
    pub const PRODUCTS: &str = "products";

    pub const CUSTOMERS_ROWS: u64 = 10;
    pub const PRODUCTS_ROWS: u64 = 5;
    pub const ORDERS_ROWS: u64 = 8;
}

pub mod descriptions {
    pub const NIGHTLY: &str = "nightly backup";
    pub const BEFORE_MIGRATION: &str = "before schema migration";
}

/// Row with an integer `id` and a text `name`
pub fn named_row(id: i64, name: &str) -> Row {
    Row::new(
        vec!["id".to_string(), "name".to_string()],
        vec![Value::Integer(id), Value::Text(name.to_string())],
    )
}

pub fn named_rows(prefix: &str, count: i64) -> Vec<Row> {
    (1..=count)
        .map(|id| named_row(id, &format!("{}-{}", prefix, id)))
        .collect()
}

/// Rows in a stable order, for set comparison
pub fn sorted(mut rows: Vec<Row>) -> Vec<Row> {
    rows.sort_by_key(|row| format!("{:?}", row.values));
    rows
}
