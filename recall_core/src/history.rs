//! Review history loading across the live log and the CSV archive.

use crate::{review_log, Result, ReviewEntry};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::path::Path;

/// Load one user's reviews from the last `days` days
///
/// A window reaching past the earliest representable instant loads the
/// whole history. Sorted newest first.
pub fn load_recent_entries(
    log_path: &Path,
    csv_path: &Path,
    user_id: &str,
    days: u32,
    now: DateTime<Utc>,
) -> Result<Vec<ReviewEntry>> {
    let cutoff = Duration::try_days(i64::from(days))
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    load_entries_since(log_path, csv_path, user_id, cutoff)
}

/// Load every review one user has made, newest first
pub fn load_entries(log_path: &Path, csv_path: &Path, user_id: &str) -> Result<Vec<ReviewEntry>> {
    load_entries_since(log_path, csv_path, user_id, DateTime::<Utc>::MIN_UTC)
}

/// Entries present in both the log and the archive (a rollup interrupted
/// before the rename) are returned once.
fn load_entries_since(
    log_path: &Path,
    csv_path: &Path,
    user_id: &str,
    cutoff: DateTime<Utc>,
) -> Result<Vec<ReviewEntry>> {
    let mut seen_ids = HashSet::new();
    let mut entries = Vec::new();

    let mut keep = |entry: ReviewEntry, entries: &mut Vec<ReviewEntry>| -> bool {
        if entry.user_id == user_id && entry.reviewed_at >= cutoff && seen_ids.insert(entry.id) {
            entries.push(entry);
            true
        } else {
            false
        }
    };

    let mut log_count = 0;
    for entry in review_log::read_entries(log_path)? {
        if keep(entry, &mut entries) {
            log_count += 1;
        }
    }

    let mut csv_count = 0;
    for entry in load_entries_from_csv(csv_path)? {
        if keep(entry, &mut entries) {
            csv_count += 1;
        }
    }

    entries.sort_by(|a, b| b.reviewed_at.cmp(&a.reviewed_at));

    tracing::debug!(
        "Loaded {} reviews for {} since {} ({} log, {} archive)",
        entries.len(),
        user_id,
        cutoff,
        log_count,
        csv_count
    );
    Ok(entries)
}

/// Read archived reviews; rows that fail to parse are skipped
fn load_entries_from_csv(path: &Path) -> Result<Vec<ReviewEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut entries = Vec::new();
    for result in reader.deserialize::<ReviewEntry>() {
        match result {
            Ok(entry) => entries.push(entry),
            Err(e) => tracing::warn!("Skipping malformed archived review: {}", e),
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review_log::{JsonlReviewLog, ReviewSink};
    use crate::{CardKey, CardState, Rating, SchedulerConfig};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn entry(user: &str, card: &str, days_ago: i64) -> ReviewEntry {
        let at = now() - Duration::days(days_ago);
        let state = CardState::new(&SchedulerConfig::default(), at);
        ReviewEntry::new(&CardKey::new(user, card), Rating::Good, &state, &state, at)
    }

    #[test]
    fn test_window_and_user_filter() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("reviews.jsonl");
        let csv_path = temp_dir.path().join("reviews.csv");

        let mut log = JsonlReviewLog::new(&log_path);
        log.append(&entry("alice", "c1", 1)).unwrap();
        log.append(&entry("alice", "c2", 3)).unwrap();
        log.append(&entry("alice", "c3", 40)).unwrap(); // Too old
        log.append(&entry("bob", "c1", 1)).unwrap();

        let entries = load_recent_entries(&log_path, &csv_path, "alice", 30, now()).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.user_id == "alice"));
    }

    #[test]
    fn test_deduplication_across_log_and_csv() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("reviews.jsonl");
        let csv_path = temp_dir.path().join("reviews.csv");

        let review = entry("alice", "c1", 1);
        JsonlReviewLog::new(&log_path).append(&review).unwrap();
        crate::rollup::log_to_csv_and_archive(&log_path, &csv_path).unwrap();

        // Simulate an interrupted rollup: the same entry is still in the live log
        JsonlReviewLog::new(&log_path).append(&review).unwrap();

        let entries = load_recent_entries(&log_path, &csv_path, "alice", 30, now()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, review.id);
    }

    #[test]
    fn test_huge_window_loads_everything() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("reviews.jsonl");
        let csv_path = temp_dir.path().join("reviews.csv");

        JsonlReviewLog::new(&log_path).append(&entry("alice", "c1", 4000)).unwrap();

        let entries = load_recent_entries(&log_path, &csv_path, "alice", u32::MAX, now()).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_load_entries_ignores_window() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("reviews.jsonl");
        let csv_path = temp_dir.path().join("reviews.csv");

        let mut log = JsonlReviewLog::new(&log_path);
        for days_ago in 0..40 {
            log.append(&entry("alice", "c1", days_ago)).unwrap();
        }
        log.append(&entry("bob", "c1", 0)).unwrap();

        assert_eq!(load_entries(&log_path, &csv_path, "alice").unwrap().len(), 40);
        assert_eq!(
            load_recent_entries(&log_path, &csv_path, "alice", 14, now()).unwrap().len(),
            15
        );
    }

    #[test]
    fn test_sorted_newest_first() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("reviews.jsonl");
        let csv_path = temp_dir.path().join("reviews.csv");

        let mut log = JsonlReviewLog::new(&log_path);
        log.append(&entry("alice", "old", 5)).unwrap();
        log.append(&entry("alice", "new", 1)).unwrap();

        let entries = load_recent_entries(&log_path, &csv_path, "alice", 30, now()).unwrap();
        assert_eq!(entries[0].card_id, "new");
        assert_eq!(entries[1].card_id, "old");
    }
}
