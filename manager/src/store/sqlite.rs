//! sqlx/SQLite implementation of [`DataStore`].

use anyhow::Result;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, SqlitePool, TypeInfo, ValueRef};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, error, info, warn};

use super::{quote_identifier, DataStore, Row, Statement, Value};
use crate::errors::{BackupError, BackupResult};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_path: &str) -> Result<Self> {
        info!("Opening live database: {}", database_path);

        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path);
        let pool = match SqlitePool::connect(&database_url).await {
            Ok(pool) => pool,
            Err(e) => {
                error!("FAILED to connect to live database {}: {}", database_url, e);
                return Err(e.into());
            }
        };

        info!("Connected to live database");
        Ok(Self { pool })
    }

    /// Single-connection in-memory store, for tests and tooling
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }
}

impl DataStore for SqliteStore {
    async fn list_tables(&self) -> BackupResult<BTreeSet<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(names.into_iter().collect())
    }

    async fn read_rows(&self, table: &str) -> BackupResult<Vec<Row>> {
        let sql = format!("SELECT * FROM {}", quote_identifier(table));
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let decoded = rows
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        debug!("Read {} rows from {}", decoded.len(), table);
        Ok(decoded)
    }

    async fn execute_in_transaction(
        &self,
        table: &str,
        statements: &[Statement],
    ) -> BackupResult<u64> {
        let quoted = quote_identifier(table);
        let apply_error = |reason: String| BackupError::Apply {
            table: table.to_string(),
            reason,
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| apply_error(format!("begin transaction: {}", e)))?;
        let mut inserted = 0u64;

        for (index, statement) in statements.iter().enumerate() {
            let result = match statement {
                Statement::ClearTable => {
                    let sql = format!("DELETE FROM {}", quoted);
                    sqlx::query(&sql).execute(&mut *tx).await
                }
                Statement::InsertRow(row) => {
                    let sql = insert_sql(&quoted, &row.columns);
                    let query = row
                        .values
                        .iter()
                        .fold(sqlx::query(&sql), |query, value| bind_value(query, value));
                    query.execute(&mut *tx).await
                }
            };

            if let Err(e) = result {
                warn!(
                    "Statement {} on {} failed, rolling back: {}",
                    index, table, e
                );
                if let Err(rollback_err) = tx.rollback().await {
                    error!("Rollback failed for {}: {}", table, rollback_err);
                }
                return Err(apply_error(format!("statement {}: {}", index, e)));
            }

            if matches!(statement, Statement::InsertRow(_)) {
                inserted += 1;
            }
        }

        tx.commit()
            .await
            .map_err(|e| apply_error(format!("commit: {}", e)))?;
        Ok(inserted)
    }

    async fn count_rows(&self, table: &str) -> BackupResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }
}

fn insert_sql(quoted_table: &str, columns: &[String]) -> String {
    let column_list = columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quoted_table, column_list, placeholders
    )
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Integer(v) => query.bind(*v),
        Value::Real(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.clone()),
        Value::Blob(v) => query.bind(v.clone()),
    }
}

// Decodes by the value's storage class, not the declared column type, so
// BOOLEAN/DATETIME columns round-trip exactly as SQLite stored them.
fn decode_row(row: &SqliteRow) -> Result<Row, sqlx::Error> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());

    for (index, column) in row.columns().iter().enumerate() {
        columns.push(column.name().to_string());

        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let storage_class = raw.type_info().name().to_string();
            match storage_class.as_str() {
                "INTEGER" | "BOOLEAN" => Value::Integer(row.try_get_unchecked::<i64, _>(index)?),
                "REAL" => Value::Real(row.try_get_unchecked::<f64, _>(index)?),
                "BLOB" => Value::Blob(row.try_get_unchecked::<Vec<u8>, _>(index)?),
                _ => Value::Text(row.try_get_unchecked::<String, _>(index)?),
            }
        };
        values.push(value);
    }

    Ok(Row::new(columns, values))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_store() -> SqliteStore {
        let store = SqliteStore::in_memory().await.unwrap();
        sqlx::query(
            "CREATE TABLE products (id INTEGER PRIMARY KEY, name TEXT NOT NULL, price REAL, image BLOB, active BOOLEAN)",
        )
        .execute(store.pool())
        .await
        .unwrap();
        sqlx::query("INSERT INTO products VALUES (1, 'lamp', 19.5, x'00ff', 1), (2, 'desk', NULL, NULL, 0)")
            .execute(store.pool())
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_read_rows_preserves_storage_classes() {
        let store = seeded_store().await;
        let rows = store.read_rows("products").await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].columns, vec!["id", "name", "price", "image", "active"]);
        assert_eq!(
            rows[0].values,
            vec![
                Value::Integer(1),
                Value::Text("lamp".to_string()),
                Value::Real(19.5),
                Value::Blob(vec![0x00, 0xff]),
                Value::Integer(1),
            ]
        );
        assert_eq!(rows[1].get("price"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_on_failed_insert() {
        let store = seeded_store().await;
        let duplicate = Row::new(
            vec!["id".to_string(), "name".to_string()],
            vec![Value::Integer(5), Value::Text("chair".to_string())],
        );

        let result = store
            .execute_in_transaction(
                "products",
                &[
                    Statement::ClearTable,
                    Statement::InsertRow(duplicate.clone()),
                    Statement::InsertRow(duplicate),
                ],
            )
            .await;

        assert!(matches!(result, Err(BackupError::Apply { .. })));
        assert_eq!(store.count_rows("products").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_list_tables_skips_internal_tables() {
        let store = seeded_store().await;
        sqlx::query("CREATE TABLE events (id INTEGER PRIMARY KEY AUTOINCREMENT, kind TEXT)")
            .execute(store.pool())
            .await
            .unwrap();

        let tables = store.list_tables().await.unwrap();
        assert_eq!(
            tables.into_iter().collect::<Vec<_>>(),
            vec!["events".to_string(), "products".to_string()]
        );
    }
}
