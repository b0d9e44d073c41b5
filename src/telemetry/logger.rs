//! Rotating JSONL writer.
//!
//! Files are named `diagnostics_<UTC date>_<UTC time>_<index>.jsonl` so a
//! plain name sort is also a creation-order sort. After each rotation only
//! the newest `max_files_to_keep` files remain.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use super::types::DiagnosticsRecord;
use crate::error::Result;

const FILE_PREFIX: &str = "diagnostics_";
const FILE_SUFFIX: &str = ".jsonl";

/// JSONL diagnostics logger with size-based rotation.
#[derive(Debug)]
pub struct DiagnosticsLogger {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    current: Option<PathBuf>,
    records_in_file: usize,
    file_index: u32,
}

impl DiagnosticsLogger {
    /// Creates the log directory if needed. No file is opened until the first record.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new<P: AsRef<Path>>(dir: P, max_records_per_file: usize, max_files_to_keep: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            max_records_per_file: max_records_per_file.max(1),
            max_files_to_keep: max_files_to_keep.max(1),
            writer: None,
            current: None,
            records_in_file: 0,
            file_index: 0,
        })
    }

    /// Appends one record, rotating first if the current file is full.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or written.
    pub fn log(&mut self, record: &DiagnosticsRecord) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }
        if let Some(writer) = self.writer.as_mut() {
            serde_json::to_writer(&mut *writer, record)?;
            writer.write_all(b"\n")?;
            self.records_in_file += 1;
        }
        Ok(())
    }

    /// Flushes buffered records to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// File currently written to.
    #[must_use]
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    /// Diagnostics files in the log directory, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX))
            })
            .collect();
        files.sort();
        Ok(files)
    }

    fn rotate(&mut self) -> Result<()> {
        self.flush()?;
        self.writer = None;

        let name = format!(
            "{}{}_{:04}{}",
            FILE_PREFIX,
            Utc::now().format("%Y%m%d_%H%M%S"),
            self.file_index,
            FILE_SUFFIX
        );
        self.file_index = self.file_index.wrapping_add(1);
        let path = self.dir.join(name);
        let file = File::create(&path)?;
        debug!("Opened diagnostics file {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.current = Some(path);
        self.records_in_file = 0;

        self.prune()
    }

    fn prune(&self) -> Result<()> {
        let files = self.files()?;
        let excess = files.len().saturating_sub(self.max_files_to_keep);
        for path in files.iter().take(excess) {
            if let Err(e) = fs::remove_file(path) {
                warn!("Failed to remove old diagnostics file {}: {}", path.display(), e);
            }
        }
        Ok(())
    }
}

impl Drop for DiagnosticsLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to flush diagnostics on shutdown: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Diagnostics;
    use crate::rc::RcSnapshot;
    use crate::safety::ArmState;
    use tempfile::TempDir;

    fn record(sequence: u64) -> DiagnosticsRecord {
        let diagnostics = Diagnostics {
            output_frames: 10,
            suppressed_frames: 0,
            overruns: 1,
            jitter_events: 2,
            jitter_frames: 1,
            torn_read_retries: 3,
            torn_read_exhausted: 0,
            rx_frames: 9,
            raw_widths: [1500; 8],
            flags: 1,
            arm_state: ArmState::Armed,
        };
        DiagnosticsRecord::new(sequence, diagnostics, &RcSnapshot::default())
    }

    fn line_count(path: &Path) -> usize {
        fs::read_to_string(path).unwrap().lines().count()
    }

    #[test]
    fn test_creates_directory_lazily_opens_file() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("logs");
        let logger = DiagnosticsLogger::new(&dir, 10, 3).unwrap();

        assert!(dir.is_dir());
        assert!(logger.current_path().is_none());
        assert!(logger.files().unwrap().is_empty());
    }

    #[test]
    fn test_records_are_json_lines() {
        let tmp = TempDir::new().unwrap();
        let mut logger = DiagnosticsLogger::new(tmp.path(), 10, 3).unwrap();
        logger.log(&record(1)).unwrap();
        logger.log(&record(2)).unwrap();
        logger.flush().unwrap();

        let path = logger.current_path().unwrap().to_path_buf();
        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["sequence"], 2);
        assert_eq!(lines[0]["jitter_events"], 2);
        assert_eq!(lines[0]["arm_state"], "armed");
        assert!(lines[0]["timestamp"].is_string());
    }

    #[test]
    fn test_rotation_after_max_records() {
        let tmp = TempDir::new().unwrap();
        let mut logger = DiagnosticsLogger::new(tmp.path(), 2, 10).unwrap();
        for sequence in 0..5 {
            logger.log(&record(sequence)).unwrap();
        }
        logger.flush().unwrap();

        let files = logger.files().unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(line_count(&files[0]), 2);
        assert_eq!(line_count(&files[1]), 2);
        assert_eq!(line_count(&files[2]), 1);
    }

    #[test]
    fn test_keeps_only_newest_files() {
        let tmp = TempDir::new().unwrap();
        let mut logger = DiagnosticsLogger::new(tmp.path(), 1, 2).unwrap();
        for sequence in 0..5 {
            logger.log(&record(sequence)).unwrap();
        }
        logger.flush().unwrap();

        let files = logger.files().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files.last().map(PathBuf::as_path), logger.current_path());

        let last: serde_json::Value =
            serde_json::from_str(fs::read_to_string(&files[1]).unwrap().trim()).unwrap();
        assert_eq!(last["sequence"], 4);
    }

    #[test]
    fn test_ignores_foreign_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("notes.txt"), "keep me").unwrap();
        let mut logger = DiagnosticsLogger::new(tmp.path(), 1, 1).unwrap();
        logger.log(&record(0)).unwrap();
        logger.log(&record(1)).unwrap();

        assert!(tmp.path().join("notes.txt").exists());
        assert_eq!(logger.files().unwrap().len(), 1);
    }
}
