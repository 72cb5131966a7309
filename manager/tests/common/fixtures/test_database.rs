//! Shop database on in-memory SQLite: customers (10), products (5), orders (8)

use anyhow::Result;
use backup_manager::store::{DataStore, Row, SqliteStore};
use sqlx::SqlitePool;

use super::test_data::sorted;

pub struct TestDatabase {
    store: SqliteStore,
}

impl TestDatabase {
    /// Create and seed a new in-memory shop database
    pub async fn new() -> Result<Self> {
        let store = SqliteStore::in_memory().await?;
        Self::run_migrations(store.pool()).await?;
        Self::seed(store.pool()).await?;
        Ok(Self { store })
    }

    pub fn pool(&self) -> &SqlitePool {
        self.store.pool()
    }

    pub fn into_store(self) -> SqliteStore {
        self.store
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE customers (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT,
                balance REAL NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE products (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                price REAL NOT NULL,
                thumbnail BLOB
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE orders (
                id INTEGER PRIMARY KEY,
                customer_id INTEGER NOT NULL,
                product_id INTEGER NOT NULL,
                quantity INTEGER NOT NULL,
                note TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn seed(pool: &SqlitePool) -> Result<()> {
        for id in 1..=10i64 {
            let email = (id % 3 != 0).then(|| format!("customer{}@example.com", id));
            sqlx::query("INSERT INTO customers (id, name, email, balance) VALUES (?, ?, ?, ?)")
                .bind(id)
                .bind(format!("Customer \"{}\"", id))
                .bind(email)
                .bind(id as f64 * 12.5)
                .execute(pool)
                .await?;
        }

        for id in 1..=5i64 {
            sqlx::query("INSERT INTO products (id, title, price, thumbnail) VALUES (?, ?, ?, ?)")
                .bind(id)
                .bind(format!("Product {}\nline two", id))
                .bind(id as f64 + 0.99)
                .bind(vec![id as u8, 0, 255, 10])
                .execute(pool)
                .await?;
        }

        for id in 1..=8i64 {
            sqlx::query(
                "INSERT INTO orders (id, customer_id, product_id, quantity, note) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind((id % 10) + 1)
            .bind((id % 5) + 1)
            .bind(id * 2)
            .bind(if id % 2 == 0 { Some("gift") } else { None })
            .execute(pool)
            .await?;
        }

        Ok(())
    }

    /// Changes every row of every table, deletes one and inserts one
    pub async fn modify_all(pool: &SqlitePool) -> Result<()> {
        sqlx::query("UPDATE customers SET name = name || ' (edited)', balance = balance + 1")
            .execute(pool)
            .await?;
        sqlx::query("UPDATE products SET price = price * 2, thumbnail = NULL")
            .execute(pool)
            .await?;
        sqlx::query("UPDATE orders SET quantity = quantity + 100, note = 'changed'")
            .execute(pool)
            .await?;
        sqlx::query("DELETE FROM customers WHERE id = 1")
            .execute(pool)
            .await?;
        sqlx::query("INSERT INTO orders (id, customer_id, product_id, quantity) VALUES (99, 2, 2, 1)")
            .execute(pool)
            .await?;
        Ok(())
    }
}

/// Every row of `table`, sorted for comparison
pub async fn table_rows<S: DataStore>(store: &S, table: &str) -> Vec<Row> {
    sorted(store.read_rows(table).await.unwrap())
}
