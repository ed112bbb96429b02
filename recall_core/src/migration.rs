//! Conversion of pre-SM-2 progress scores.
//!
//! Before the scheduler existed, progress was a single 0-5 score per card.
//! Higher scores map to an established Review-phase card; scores below 2
//! restart in Learning.

use crate::{CardState, Error, Result, SchedulerConfig};
use chrono::{DateTime, Duration, Utc};

/// Highest score the legacy tracker produced
pub const MAX_LEGACY_SCORE: u8 = 5;

fn legacy_ease(score: u8) -> f64 {
    if score >= 4 {
        2.7
    } else if score >= 2 {
        2.5
    } else {
        2.3
    }
}

fn legacy_interval(score: u8) -> u32 {
    match score {
        0 | 1 => 0,
        2 => 1,
        3 => 3,
        4 => 7,
        _ => 30,
    }
}

impl CardState {
    /// Build the scheduler state equivalent to a legacy `score`
    ///
    /// Ease and interval are clamped into `config`'s bounds so the result
    /// always passes [`CardState::validate`].
    pub fn from_legacy_score(
        score: u8,
        last_reviewed_at: Option<DateTime<Utc>>,
        config: &SchedulerConfig,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if score > MAX_LEGACY_SCORE {
            return Err(Error::Migration(format!(
                "legacy score {} is outside 0..={}",
                score, MAX_LEGACY_SCORE
            )));
        }

        let is_learning = score < 2;
        let interval = legacy_interval(score).min(config.max_interval_days);
        let due_at = if is_learning {
            now + Duration::minutes(1)
        } else {
            now + Duration::days(i64::from(interval))
        };

        let state = CardState {
            ease_factor: legacy_ease(score).max(config.min_ease),
            interval,
            step: 0,
            is_learning,
            due_at,
            repetitions: if is_learning { 0 } else { u32::from(score) - 1 },
            last_reviewed_at,
        };

        tracing::debug!(
            score,
            interval = state.interval,
            is_learning = state.is_learning,
            "Migrated legacy score"
        );

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_score_table() {
        let config = SchedulerConfig::default();
        let expected = [
            // (score, ease, interval, learning, repetitions)
            (0, 2.3, 0, true, 0),
            (1, 2.3, 0, true, 0),
            (2, 2.5, 1, false, 1),
            (3, 2.5, 3, false, 2),
            (4, 2.7, 7, false, 3),
            (5, 2.7, 30, false, 4),
        ];

        for (score, ease, interval, learning, reps) in expected {
            let state = CardState::from_legacy_score(score, None, &config, now()).unwrap();
            assert_eq!(state.ease_factor, ease, "score {}", score);
            assert_eq!(state.interval, interval, "score {}", score);
            assert_eq!(state.is_learning, learning, "score {}", score);
            assert_eq!(state.repetitions, reps, "score {}", score);
            assert!(state.validate(&config).is_ok());
        }
    }

    #[test]
    fn test_due_dates() {
        let config = SchedulerConfig::default();

        let weak = CardState::from_legacy_score(1, None, &config, now()).unwrap();
        assert_eq!(weak.due_at, now() + Duration::minutes(1));

        let strong = CardState::from_legacy_score(4, None, &config, now()).unwrap();
        assert_eq!(strong.due_at, now() + Duration::days(7));
    }

    #[test]
    fn test_keeps_last_reviewed() {
        let config = SchedulerConfig::default();
        let reviewed = now() - Duration::days(12);

        let state = CardState::from_legacy_score(1, Some(reviewed), &config, now()).unwrap();
        assert_eq!(state.last_reviewed_at, Some(reviewed));
        assert!(!state.is_new());
    }

    #[test]
    fn test_rejects_out_of_range_score() {
        let config = SchedulerConfig::default();
        assert!(matches!(
            CardState::from_legacy_score(6, None, &config, now()),
            Err(Error::Migration(_))
        ));
    }

    #[test]
    fn test_clamps_to_config_bounds() {
        let config = SchedulerConfig {
            min_ease: 2.6,
            starting_ease: 2.6,
            max_interval_days: 10,
            ..SchedulerConfig::default()
        };

        let state = CardState::from_legacy_score(5, None, &config, now()).unwrap();
        assert_eq!(state.interval, 10);
        assert_eq!(state.ease_factor, 2.7);

        let state = CardState::from_legacy_score(0, None, &config, now()).unwrap();
        assert_eq!(state.ease_factor, 2.6);
    }
}
