//! Review log rollup into a CSV archive.
//!
//! The log is copied into the CSV (fsynced) before it is renamed to
//! `.processed`, so a crash mid-rollup can duplicate rows but never lose
//! them. History loading de-duplicates by entry id. The log's writer lock is
//! held from the read through the rename, so appends wait for the rollup
//! and then start a fresh log.

use crate::{review_log, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

const PROCESSED_EXTENSION: &str = "processed";

/// Path a review log is renamed to once rolled up
pub fn processed_path(log_path: &Path) -> PathBuf {
    let mut name = log_path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(PROCESSED_EXTENSION);
    log_path.with_file_name(name)
}

/// Append the log's entries to `csv_path` and archive the log
///
/// Returns the number of entries rolled up. Headers are written only when
/// the CSV is new or empty.
pub fn log_to_csv_and_archive(log_path: &Path, csv_path: &Path) -> Result<usize> {
    review_log::with_log_lock(log_path, || archive_locked(log_path, csv_path))
}

fn archive_locked(log_path: &Path, csv_path: &Path) -> Result<usize> {
    let entries = review_log::read_entries(log_path)?;

    if entries.is_empty() {
        tracing::info!("No reviews in {:?} to roll up", log_path);
        return Ok(0);
    }

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;
    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);
    for entry in &entries {
        writer.serialize(entry)?;
    }
    writer.flush()?;

    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;
    tracing::info!("Wrote {} reviews to {:?}", entries.len(), csv_path);

    let archived = processed_path(log_path);
    std::fs::rename(log_path, &archived)?;
    tracing::info!("Archived review log to {:?}", archived);

    Ok(entries.len())
}

/// Delete archived logs in `dir`; returns how many were removed
pub fn cleanup_processed_logs(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map_or(false, |ext| ext == PROCESSED_EXTENSION) {
            std::fs::remove_file(&path)?;
            tracing::debug!("Removed processed log {:?}", path);
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed review logs", count);
    }
    Ok(count)
}
