//! Relational data-store interface used by the backup engine.
//!
//! The engine never issues ad-hoc queries: it lists tables, reads whole
//! tables, counts rows, and applies statement batches inside a transaction
//! scoped to one table. [`SqliteStore`] implements this over sqlx; tests
//! provide in-memory fakes.

mod sqlite;

pub use sqlite::SqliteStore;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::future::Future;

use crate::errors::BackupResult;

/// A single column value as stored by the relational engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Null,
    Integer(i64),
    Real(#[serde(with = "real_repr")] f64),
    Text(String),
    Blob(Vec<u8>),
}

/// JSON has no literal for infinities or NaN, so those are written as the
/// strings `"inf"`, `"-inf"` and `"nan"`. Finite values stay plain numbers.
mod real_repr {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    const POS_INF: &str = "inf";
    const NEG_INF: &str = "-inf";
    const NAN: &str = "nan";

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str(NAN)
        } else if value.is_sign_positive() {
            serializer.serialize_str(POS_INF)
        } else {
            serializer.serialize_str(NEG_INF)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(RealVisitor)
    }

    struct RealVisitor;

    impl<'de> Visitor<'de> for RealVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "a number or one of \"{}\", \"{}\", \"{}\"", POS_INF, NEG_INF, NAN)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            match v {
                POS_INF => Ok(f64::INFINITY),
                NEG_INF => Ok(f64::NEG_INFINITY),
                NAN => Ok(f64::NAN),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }
}

/// One row with its column names, in table column order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|index| self.values.get(index))
    }
}

/// Statement applied inside a table-scoped transaction
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Remove every existing row from the table
    ClearTable,
    /// Insert one row with explicit columns
    InsertRow(Row),
}

pub trait DataStore: Send + Sync {
    /// Names of all user tables
    fn list_tables(&self) -> impl Future<Output = BackupResult<BTreeSet<String>>> + Send;

    /// Every row of `table`, in storage order
    fn read_rows(&self, table: &str) -> impl Future<Output = BackupResult<Vec<Row>>> + Send;

    /// Applies `statements` to `table` in one transaction. Either all of them
    /// take effect or the table is left untouched. Returns the number of rows
    /// inserted.
    fn execute_in_transaction(
        &self,
        table: &str,
        statements: &[Statement],
    ) -> impl Future<Output = BackupResult<u64>> + Send;

    fn count_rows(&self, table: &str) -> impl Future<Output = BackupResult<u64>> + Send;
}

/// Quotes an identifier for SQLite, doubling embedded quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
