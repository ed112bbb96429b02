//! Append-only review log.
//!
//! Every applied rating is appended as one JSON line while holding an
//! exclusive lock on a sidecar `.lock` file. Rollup takes the same lock from
//! its read through the rename, so no append can land in a log that is
//! being archived. The log is history only: the scheduler never reads it,
//! and losing it never changes a card's schedule.

use crate::{Result, ReviewEntry};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Destination for review entries
pub trait ReviewSink {
    fn append(&mut self, entry: &ReviewEntry) -> Result<()>;
}

/// JSONL review log with file locking
pub struct JsonlReviewLog {
    path: PathBuf,
}

impl JsonlReviewLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Sidecar lock guarding appends and rollup of `log_path`
pub(crate) fn lock_path(log_path: &Path) -> PathBuf {
    let mut name = log_path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    log_path.with_file_name(name)
}

/// Run `f` while holding the exclusive writer lock for `log_path`
pub(crate) fn with_log_lock<T>(log_path: &Path, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let lock_path = lock_path(log_path);
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let lock = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)?;
    lock.lock_exclusive()?;

    let result = f();

    lock.unlock()?;
    result
}

impl ReviewSink for JsonlReviewLog {
    fn append(&mut self, entry: &ReviewEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        with_log_lock(&self.path, || {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            file.write_all(&line)?;
            Ok(())
        })?;

        tracing::debug!(
            "Logged {} for {}/{} ({})",
            entry.rating,
            entry.user_id,
            entry.card_id,
            entry.id
        );
        Ok(())
    }
}

/// Read every entry in a review log; malformed lines are skipped with a warning
pub fn read_entries(path: &Path) -> Result<Vec<ReviewEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let mut entries = Vec::new();
    for (line_num, line_result) in BufReader::new(&file).lines().enumerate() {
        let line = match line_result {
            Ok(line) => line,
            Err(e) => {
                file.unlock()?;
                return Err(e.into());
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ReviewEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!(
                    "Skipping malformed review at {:?} line {}: {}",
                    path,
                    line_num + 1,
                    e
                );
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} reviews from {:?}", entries.len(), path);
    Ok(entries)
}
