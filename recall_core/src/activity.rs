//! Daily review activity and streaks.
//!
//! Days are calendar days in the time zone of the `now` the caller passes,
//! matching how [`crate::stats::statistics`] decides what "today" is.

use crate::{Rating, ReviewEntry};
use chrono::{DateTime, Days, NaiveDate, TimeZone};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Reviews performed on one calendar day
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub cards_reviewed: usize,
    /// Reviews rated Again
    pub lapses: usize,
}

/// Per-day review counts, oldest day first
pub fn daily_activity<'a, E, Tz>(entries: E, tz: &Tz) -> Vec<DailyActivity>
where
    E: IntoIterator<Item = &'a ReviewEntry>,
    Tz: TimeZone,
{
    let mut days: BTreeMap<NaiveDate, DailyActivity> = BTreeMap::new();

    for entry in entries {
        let date = entry.reviewed_at.with_timezone(tz).date_naive();
        let day = days.entry(date).or_insert_with(|| DailyActivity {
            date,
            cards_reviewed: 0,
            lapses: 0,
        });
        day.cards_reviewed += 1;
        if entry.rating == Rating::Again {
            day.lapses += 1;
        }
    }

    days.into_values().collect()
}

/// Per-day review counts for the last `days` calendar days, today included
///
/// The window starts at a local midnight, so the oldest day shown is always
/// a whole day. A window reaching past the earliest representable date
/// covers everything.
pub fn recent_activity<'a, E, Tz>(entries: E, now: &DateTime<Tz>, days: u32) -> Vec<DailyActivity>
where
    E: IntoIterator<Item = &'a ReviewEntry>,
    Tz: TimeZone,
{
    let first_day = now
        .date_naive()
        .checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
        .unwrap_or(NaiveDate::MIN);

    daily_activity(entries, &now.timezone())
        .into_iter()
        .filter(|day| day.date >= first_day)
        .collect()
}

/// Consecutive days with at least one review, counting back from today
///
/// A streak survives until the end of the day: if nothing has been reviewed
/// yet today, counting starts from yesterday.
pub fn current_streak<'a, E, Tz>(entries: E, now: &DateTime<Tz>) -> u32
where
    E: IntoIterator<Item = &'a ReviewEntry>,
    Tz: TimeZone,
{
    let tz = now.timezone();
    let active: HashSet<NaiveDate> = entries
        .into_iter()
        .map(|entry| entry.reviewed_at.with_timezone(&tz).date_naive())
        .collect();

    let today = now.date_naive();
    let mut day = if active.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) => yesterday,
            None => return 0,
        }
    };

    let mut streak = 0;
    while active.contains(&day) {
        streak += 1;
        match day.pred_opt() {
            Some(previous) => day = previous,
            None => break,
        }
    }
    streak
}
