//! Aggregate counts for a collection of cards.

use crate::CardState;
use chrono::{DateTime, Days, Duration, TimeZone, Utc};
use serde::Serialize;

/// Dashboard counts over a set of cards
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    /// Never reviewed
    pub new: usize,
    /// Learning or relearning, reviewed at least once
    pub learning: usize,
    /// Graduated to day-granularity intervals
    pub review: usize,
    /// Due within `now`'s calendar day
    pub due_today: usize,
    /// Due before `now`'s calendar day started
    pub overdue: usize,
    pub total: usize,
}

/// Count cards by phase and due date in a single pass
///
/// "Today" is the calendar day of `now` in `now`'s own time zone, so pass a
/// `DateTime<Local>` (or a fixed offset) to count against the learner's day.
pub fn statistics<'a, S, Tz>(states: S, now: &DateTime<Tz>) -> Statistics
where
    S: IntoIterator<Item = &'a CardState>,
    Tz: TimeZone,
{
    let (day_start, day_end) = day_bounds(now);
    let mut stats = Statistics::default();

    for state in states {
        stats.total += 1;

        if state.is_new() {
            stats.new += 1;
        } else if state.is_learning {
            stats.learning += 1;
        } else {
            stats.review += 1;
        }

        if state.due_at < day_start {
            stats.overdue += 1;
        } else if state.due_at < day_end {
            stats.due_today += 1;
        }
    }

    stats
}

/// UTC instants bounding `now`'s local calendar day, as `[start, end)`
fn day_bounds<Tz: TimeZone>(now: &DateTime<Tz>) -> (DateTime<Utc>, DateTime<Utc>) {
    let tz = now.timezone();
    let today = now.date_naive();
    let start_of = |date: chrono::NaiveDate| {
        let midnight = date.and_time(chrono::NaiveTime::MIN);
        tz.from_local_datetime(&midnight)
            .earliest()
            // Midnight skipped by a DST gap: the day starts when the gap ends
            .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
    };

    let start = start_of(today);
    let end = today
        .checked_add_days(Days::new(1))
        .map(start_of)
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    (start, end)
}
