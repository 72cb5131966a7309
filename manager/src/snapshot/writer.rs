//! Streaming snapshot file writer.
//!
//! Bytes go to `<final>.tmp`; only after the trailer is written, the encoder
//! finished and the file fsynced is the temp file renamed onto the final path.
//! Dropping an unfinished writer removes the temp file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::format::{
    encode_end, encode_header, encode_row, encode_table_marker, RowStatement, SnapshotHeader,
};
use crate::constants::snapshot::{TEMP_SUFFIX, ZSTD_LEVEL};
use crate::errors::{BackupError, BackupResult};

enum Sink {
    Plain(BufWriter<File>),
    Zstd(zstd::Encoder<'static, BufWriter<File>>),
}

impl Sink {
    fn finish(self) -> std::io::Result<File> {
        let buffered = match self {
            Sink::Plain(writer) => writer,
            Sink::Zstd(encoder) => encoder.finish()?,
        };
        buffered.into_inner().map_err(|e| e.into_error())
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            Sink::Zstd(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Zstd(w) => w.flush(),
        }
    }
}

struct OpenSegment {
    table: String,
    declared: u64,
    written: u64,
}

pub struct SnapshotFileWriter {
    final_path: PathBuf,
    temp_path: PathBuf,
    sink: Option<Sink>,
    segment: Option<OpenSegment>,
    segment_count: u64,
    committed: bool,
}

/// Path of the in-progress file for `final_path`
pub fn temp_path_for(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_owned();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

impl SnapshotFileWriter {
    pub fn create(
        final_path: &Path,
        compressed: bool,
        header: &SnapshotHeader,
    ) -> BackupResult<Self> {
        let temp_path = temp_path_for(final_path);

        if final_path.exists() {
            return Err(BackupError::io(
                final_path.display(),
                "snapshot file already exists",
            ));
        }
        if temp_path.exists() {
            warn!("Removing stale temp file: {}", temp_path.display());
            let _ = fs::remove_file(&temp_path);
        }

        let file = File::create(&temp_path).map_err(|e| BackupError::io(temp_path.display(), e))?;
        let buffered = BufWriter::new(file);
        let sink = if compressed {
            let encoder = zstd::Encoder::new(buffered, ZSTD_LEVEL)
                .map_err(|e| BackupError::io(temp_path.display(), format!("zstd encoder: {}", e)))?;
            Sink::Zstd(encoder)
        } else {
            Sink::Plain(buffered)
        };

        debug!(
            "Writing snapshot to temp file {} (compressed: {})",
            temp_path.display(),
            compressed
        );

        let mut writer = Self {
            final_path: final_path.to_path_buf(),
            temp_path,
            sink: Some(sink),
            segment: None,
            segment_count: 0,
            committed: false,
        };
        writer.write_line(&encode_header(header))?;
        Ok(writer)
    }

    /// Opens the segment for `table`; exactly `row_count` rows must follow
    pub fn begin_table(&mut self, table: &str, row_count: u64) -> BackupResult<()> {
        self.close_segment()?;
        self.write_line(&encode_table_marker(table, row_count))?;
        self.segment = Some(OpenSegment {
            table: table.to_string(),
            declared: row_count,
            written: 0,
        });
        self.segment_count += 1;
        Ok(())
    }

    pub fn write_row(&mut self, statement: &RowStatement) -> BackupResult<()> {
        let segment = self
            .segment
            .as_mut()
            .ok_or_else(|| BackupError::storage("row written outside of a table segment"))?;

        if segment.table != statement.table {
            return Err(BackupError::storage(format!(
                "row for table '{}' written into segment '{}'",
                statement.table, segment.table
            )));
        }
        if segment.written >= segment.declared {
            return Err(BackupError::storage(format!(
                "segment '{}' declared {} rows",
                segment.table, segment.declared
            )));
        }
        segment.written += 1;

        let line = encode_row(statement).map_err(|e| BackupError::Capture {
            table: statement.table.clone(),
            reason: format!("row encoding: {}", e),
        })?;
        self.write_line(&line)
    }

    /// Writes the trailer, flushes, fsyncs and renames into place.
    /// Returns the size of the final file.
    pub fn finish(mut self) -> BackupResult<u64> {
        self.close_segment()?;
        self.write_line(&encode_end(self.segment_count))?;

        let sink = self
            .sink
            .take()
            .ok_or_else(|| BackupError::storage("snapshot writer already finished"))?;
        let file = sink
            .finish()
            .map_err(|e| BackupError::io(self.temp_path.display(), e))?;
        file.sync_all()
            .map_err(|e| BackupError::io(self.temp_path.display(), e))?;
        drop(file);

        fs::rename(&self.temp_path, &self.final_path)
            .map_err(|e| BackupError::io(self.final_path.display(), e))?;
        self.committed = true;

        if let Some(parent) = self.final_path.parent() {
            // Persist the rename itself; not every platform can open a directory
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        let size = fs::metadata(&self.final_path)
            .map_err(|e| BackupError::io(self.final_path.display(), e))?
            .len();

        debug!(
            "Snapshot {} written: {} segments, {} bytes",
            self.final_path.display(),
            self.segment_count,
            size
        );
        Ok(size)
    }

    /// Discards everything written so far
    pub fn abort(mut self) {
        self.discard();
    }

    fn close_segment(&mut self) -> BackupResult<()> {
        if let Some(segment) = self.segment.take() {
            if segment.written != segment.declared {
                return Err(BackupError::storage(format!(
                    "segment '{}' declared {} rows but {} were written",
                    segment.table, segment.declared, segment.written
                )));
            }
        }
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> BackupResult<()> {
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| BackupError::storage("snapshot writer already finished"))?;
        sink.write_all(line.as_bytes())
            .and_then(|_| sink.write_all(b"\n"))
            .map_err(|e| BackupError::io(self.temp_path.display(), e))
    }

    fn discard(&mut self) {
        drop(self.sink.take());
        if self.committed || !self.temp_path.exists() {
            return;
        }
        match fs::remove_file(&self.temp_path) {
            Ok(()) => debug!("Discarded temp file {}", self.temp_path.display()),
            Err(e) => warn!(
                "Failed to remove temp file {}: {}",
                self.temp_path.display(),
                e
            ),
        }
    }
}

impl Drop for SnapshotFileWriter {
    fn drop(&mut self) {
        self.discard();
    }
}
