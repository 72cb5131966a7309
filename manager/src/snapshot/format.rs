//! Snapshot wire format.
//!
//! A snapshot is a line-oriented UTF-8 stream, optionally zstd-compressed as a
//! whole:
//!
//! ```text
//! SNAPSHOT 1 backup_20250115_120000_1a2b3c4d 2025-01-15T12:00:00+00:00
//! TABLE "customers" 2
//! INSERT {"table":"customers","columns":["id","email"],"values":[...]}
//! INSERT {"table":"customers","columns":["id","email"],"values":[...]}
//! TABLE "orders" 0
//! END 2
//! ```
//!
//! Segments appear in lexicographic table order. Every `INSERT` line carries
//! its table, columns and values, so it can be replayed on its own. The `END`
//! trailer records the segment count and marks the stream as complete.

use serde::{Deserialize, Serialize};

use crate::store::{Row, Value};

pub const FORMAT_VERSION: u32 = 1;

pub const HEADER_MARKER: &str = "SNAPSHOT";
pub const TABLE_MARKER: &str = "TABLE";
pub const INSERT_MARKER: &str = "INSERT";
pub const END_MARKER: &str = "END";

/// zstd frame magic number, used to detect compressed files
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// One captured row, replayable without any other statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowStatement {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl RowStatement {
    pub fn from_row(table: &str, row: Row) -> Self {
        Self {
            table: table.to_string(),
            columns: row.columns,
            values: row.values,
        }
    }

    pub fn into_row(self) -> Row {
        Row::new(self.columns, self.values)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version: u32,
    pub backup_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotLine {
    Header(SnapshotHeader),
    Table { name: String, row_count: u64 },
    Insert(RowStatement),
    End { segment_count: u64 },
}

pub fn encode_header(header: &SnapshotHeader) -> String {
    format!(
        "{} {} {} {}",
        HEADER_MARKER, header.version, header.backup_id, header.created_at
    )
}

pub fn encode_table_marker(name: &str, row_count: u64) -> String {
    // serde_json never fails on a plain string
    let quoted = serde_json::Value::String(name.to_string()).to_string();
    format!("{} {} {}", TABLE_MARKER, quoted, row_count)
}

pub fn encode_row(statement: &RowStatement) -> Result<String, serde_json::Error> {
    Ok(format!(
        "{} {}",
        INSERT_MARKER,
        serde_json::to_string(statement)?
    ))
}

pub fn encode_end(segment_count: u64) -> String {
    format!("{} {}", END_MARKER, segment_count)
}

/// First whitespace-delimited token of a line
pub fn marker_of(line: &str) -> &str {
    line.split_once(' ').map(|(marker, _)| marker).unwrap_or(line)
}

/// Parses one line (without its trailing newline)
pub fn parse_line(line: &str) -> Result<SnapshotLine, String> {
    let (marker, rest) = line
        .split_once(' ')
        .ok_or_else(|| format!("malformed line '{}'", truncate_for_message(line)))?;

    match marker {
        HEADER_MARKER => parse_header(rest),
        TABLE_MARKER => parse_table_marker(rest),
        INSERT_MARKER => parse_row(rest).map(SnapshotLine::Insert),
        END_MARKER => rest
            .trim()
            .parse::<u64>()
            .map(|segment_count| SnapshotLine::End { segment_count })
            .map_err(|_| format!("invalid segment count '{}'", rest)),
        other => Err(format!(
            "unknown marker '{}'",
            truncate_for_message(other)
        )),
    }
}

fn parse_header(rest: &str) -> Result<SnapshotLine, String> {
    let mut parts = rest.splitn(3, ' ');
    let version = parts
        .next()
        .and_then(|v| v.parse::<u32>().ok())
        .ok_or_else(|| "invalid format version".to_string())?;
    let backup_id = parts
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| "missing backup id in header".to_string())?;
    let created_at = parts.next().unwrap_or_default();

    Ok(SnapshotLine::Header(SnapshotHeader {
        version,
        backup_id: backup_id.to_string(),
        created_at: created_at.to_string(),
    }))
}

fn parse_table_marker(rest: &str) -> Result<SnapshotLine, String> {
    let (quoted, count) = rest
        .rsplit_once(' ')
        .ok_or_else(|| "table marker without row count".to_string())?;
    let name: String = serde_json::from_str(quoted)
        .map_err(|e| format!("invalid table name {}: {}", truncate_for_message(quoted), e))?;
    if name.is_empty() {
        return Err("empty table name".to_string());
    }
    let row_count = count
        .parse::<u64>()
        .map_err(|_| format!("invalid row count '{}'", count))?;

    Ok(SnapshotLine::Table { name, row_count })
}

/// Parses the payload of an `INSERT` line into a row statement
pub fn parse_row(payload: &str) -> Result<RowStatement, String> {
    let statement: RowStatement =
        serde_json::from_str(payload).map_err(|e| format!("unparseable row statement: {}", e))?;

    if statement.columns.is_empty() {
        return Err("row statement has no columns".to_string());
    }
    if statement.columns.len() != statement.values.len() {
        return Err(format!(
            "row statement has {} columns but {} values",
            statement.columns.len(),
            statement.values.len()
        ));
    }

    Ok(statement)
}

fn truncate_for_message(text: &str) -> String {
    const LIMIT: usize = 40;
    match text.char_indices().nth(LIMIT) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}
