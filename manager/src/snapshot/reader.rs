//! Snapshot file reading.
//!
//! Compression is detected from the zstd magic number, so callers never need
//! to know how a file was stored.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::format::{marker_of, parse_line, parse_row, RowStatement, SnapshotLine, ZSTD_MAGIC};
use super::format::{END_MARKER, HEADER_MARKER, INSERT_MARKER, TABLE_MARKER};
use crate::errors::{BackupError, BackupResult, CorruptionError};

/// Opens a snapshot for line reading, decompressing if needed
pub fn open_snapshot(path: &Path) -> BackupResult<Box<dyn BufRead + Send>> {
    let file = File::open(path).map_err(|e| BackupError::io(path.display(), e))?;
    let mut reader = BufReader::new(file);

    let is_compressed = {
        let head = reader
            .fill_buf()
            .map_err(|e| BackupError::io(path.display(), e))?;
        head.starts_with(&ZSTD_MAGIC)
    };

    if is_compressed {
        let decoder = zstd::Decoder::with_buffer(reader)
            .map_err(|e| BackupError::io(path.display(), format!("zstd decoder: {}", e)))?;
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        Ok(Box::new(reader))
    }
}

/// A line of the decompressed stream with its position
#[derive(Debug)]
pub struct SnapshotLineRef {
    pub number: u64,
    pub offset: u64,
    pub text: String,
    /// False when the stream ended before the line's newline
    pub terminated: bool,
}

/// Iterates lines while tracking line numbers and byte offsets
pub struct LineCursor<R> {
    inner: R,
    number: u64,
    offset: u64,
}

impl<R: BufRead> LineCursor<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            number: 0,
            offset: 0,
        }
    }

    pub fn position(&self) -> (u64, u64) {
        (self.number, self.offset)
    }

    pub fn next_line(&mut self) -> Result<Option<SnapshotLineRef>, CorruptionError> {
        let mut buf = String::new();
        let read = self.inner.read_line(&mut buf).map_err(|e| CorruptionError {
            table: None,
            line: self.number + 1,
            offset: self.offset,
            reason: format!("unreadable snapshot data: {}", e),
        })?;

        if read == 0 {
            return Ok(None);
        }

        self.number += 1;
        let offset = self.offset;
        self.offset += read as u64;

        let terminated = buf.ends_with('\n');
        if terminated {
            buf.pop();
            if buf.ends_with('\r') {
                buf.pop();
            }
        }

        Ok(Some(SnapshotLineRef {
            number: self.number,
            offset,
            text: buf,
            terminated,
        }))
    }
}

/// Segment being collected by [`read_segments`]
struct WantedSegment {
    name: String,
    declared: u64,
    line: u64,
    offset: u64,
}

impl WantedSegment {
    fn close(self, rows: &[RowStatement]) -> Result<(), CorruptionError> {
        if rows.len() as u64 == self.declared {
            return Ok(());
        }
        Err(CorruptionError {
            reason: format!(
                "table '{}' declared {} rows but {} were found",
                self.name,
                self.declared,
                rows.len()
            ),
            table: Some(self.name),
            line: self.line,
            offset: self.offset,
        })
    }
}

/// Collects the row statements of `tables`, skipping every other segment
/// without parsing its payloads.
///
/// Each collected segment must hold exactly the rows its marker declares.
/// Segments are in lexicographic order, so reading stops at the first segment
/// past the last requested table. Otherwise the stream must end with the
/// `END` trailer.
pub fn read_segments(
    path: &Path,
    tables: &BTreeSet<String>,
) -> BackupResult<BTreeMap<String, Vec<RowStatement>>> {
    let mut cursor = LineCursor::new(open_snapshot(path)?);
    let mut segments: BTreeMap<String, Vec<RowStatement>> = BTreeMap::new();
    let mut current: Option<WantedSegment> = None;
    let last_wanted = tables.iter().next_back();

    while let Some(line) = cursor.next_line()? {
        let corruption = |table: Option<&String>, reason: String| CorruptionError {
            table: table.cloned(),
            line: line.number,
            offset: line.offset,
            reason,
        };

        match marker_of(&line.text) {
            TABLE_MARKER => {
                let (name, row_count) = match parse_line(&line.text) {
                    Ok(SnapshotLine::Table { name, row_count }) => (name, row_count),
                    Ok(_) => {
                        return Err(corruption(None, "malformed table marker".to_string()).into())
                    }
                    Err(reason) => return Err(corruption(None, reason).into()),
                };
                close_segment(current.take(), &segments)?;

                match last_wanted {
                    Some(last) if name.as_str() <= last.as_str() => {}
                    _ => return Ok(segments),
                }
                if tables.contains(&name) {
                    segments.entry(name.clone()).or_default();
                    current = Some(WantedSegment {
                        name,
                        declared: row_count,
                        line: line.number,
                        offset: line.offset,
                    });
                }
            }
            INSERT_MARKER => {
                let Some(segment) = &current else { continue };
                let table = &segment.name;
                if !line.terminated {
                    return Err(corruption(Some(table), "truncated row statement".to_string()).into());
                }
                let payload = line.text[INSERT_MARKER.len()..].trim_start();
                let statement =
                    parse_row(payload).map_err(|reason| corruption(Some(table), reason))?;
                if &statement.table != table {
                    return Err(corruption(
                        Some(table),
                        format!("row for table '{}' inside segment", statement.table),
                    )
                    .into());
                }
                if let Some(rows) = segments.get_mut(table) {
                    rows.push(statement);
                }
            }
            END_MARKER => {
                close_segment(current.take(), &segments)?;
                return Ok(segments);
            }
            HEADER_MARKER if line.number == 1 => {}
            other => {
                if let Some(segment) = &current {
                    return Err(corruption(
                        Some(&segment.name),
                        format!("unknown marker '{}'", other),
                    )
                    .into());
                }
            }
        }
    }

    let (line, offset) = cursor.position();
    Err(CorruptionError {
        table: current.map(|segment| segment.name),
        line,
        offset,
        reason: "snapshot ends without END trailer".to_string(),
    }
    .into())
}

fn close_segment(
    segment: Option<WantedSegment>,
    segments: &BTreeMap<String, Vec<RowStatement>>,
) -> Result<(), CorruptionError> {
    let Some(segment) = segment else {
        return Ok(());
    };
    let rows = segments.get(&segment.name).map(Vec::as_slice).unwrap_or_default();
    segment.close(rows)
}
