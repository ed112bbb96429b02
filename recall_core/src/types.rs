//! Core domain types for the Recall scheduler.
//!
//! This module defines:
//! - Ratings (the learner's self-reported recall quality)
//! - Per-card review state
//! - Storage keys and records
//! - Review log entries

use crate::{Error, SchedulerConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Rating
// ============================================================================

/// Recall quality reported after seeing the answer, worst to best
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    /// All ratings in ascending order
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    /// Numeric grade (0..=3)
    pub fn value(self) -> u8 {
        match self {
            Rating::Again => 0,
            Rating::Hard => 1,
            Rating::Good => 2,
            Rating::Easy => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rating::Again => "again",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        }
    }
}

impl TryFrom<u8> for Rating {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Rating::Again),
            1 => Ok(Rating::Hard),
            2 => Ok(Rating::Good),
            3 => Ok(Rating::Easy),
            other => Err(Error::InvalidRating(format!(
                "{} is outside 0..=3",
                other
            ))),
        }
    }
}

impl FromStr for Rating {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "again" | "0" => Ok(Rating::Again),
            "hard" | "1" => Ok(Rating::Hard),
            "good" | "2" => Ok(Rating::Good),
            "easy" | "3" => Ok(Rating::Easy),
            other => Err(Error::InvalidRating(format!(
                "'{}' (expected again, hard, good, easy or 0-3)",
                other
            ))),
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Card State
// ============================================================================

/// Review progress for one (user, flashcard) pair
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CardState {
    pub ease_factor: f64,
    /// Days until next due once in the Review phase
    pub interval: u32,
    /// Index into the learning steps; only read while `is_learning`
    pub step: usize,
    pub is_learning: bool,
    pub due_at: DateTime<Utc>,
    /// Consecutive successful Review-phase reviews
    pub repetitions: u32,
    #[serde(default)]
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

impl CardState {
    /// State for a card the learner has never seen; due immediately
    pub fn new(config: &SchedulerConfig, now: DateTime<Utc>) -> Self {
        Self {
            ease_factor: config.starting_ease,
            interval: 0,
            step: 0,
            is_learning: true,
            due_at: now,
            repetitions: 0,
            last_reviewed_at: None,
        }
    }

    /// Never reviewed and still at the first learning step
    pub fn is_new(&self) -> bool {
        self.is_learning
            && self.step == 0
            && self.repetitions == 0
            && self.last_reviewed_at.is_none()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at <= now
    }

    /// Check every invariant the scheduler relies on
    pub fn validate(&self, config: &SchedulerConfig) -> crate::Result<()> {
        if !self.ease_factor.is_finite() || self.ease_factor < config.min_ease {
            return Err(Error::InconsistentState(format!(
                "ease factor {} is below minimum {}",
                self.ease_factor, config.min_ease
            )));
        }

        if self.interval > config.max_interval_days {
            return Err(Error::InconsistentState(format!(
                "interval {} exceeds maximum {} days",
                self.interval, config.max_interval_days
            )));
        }

        if self.is_learning && self.step >= config.learning_steps.len() {
            return Err(Error::InconsistentState(format!(
                "learning step {} out of range for {} configured steps",
                self.step,
                config.learning_steps.len()
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Storage Types
// ============================================================================

/// Storage key: a card's state is owned by exactly one user
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CardKey {
    pub user_id: String,
    pub card_id: String,
}

impl CardKey {
    pub fn new(user_id: impl Into<String>, card_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            card_id: card_id.into(),
        }
    }
}

impl fmt::Display for CardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.card_id)
    }
}

/// A persisted card state with the deck it belongs to
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CardRecord {
    pub key: CardKey,
    #[serde(default)]
    pub deck_id: Option<String>,
    pub state: CardState,
}

// ============================================================================
// Review Log
// ============================================================================

/// One applied rating, as appended to the review log
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReviewEntry {
    pub id: Uuid,
    pub user_id: String,
    pub card_id: String,
    pub rating: Rating,
    pub reviewed_at: DateTime<Utc>,
    pub was_learning: bool,
    pub interval_before: u32,
    pub interval_after: u32,
    pub ease_after: f64,
}

impl ReviewEntry {
    /// Describe the transition from `before` to `after` for `key`
    pub fn new(
        key: &CardKey,
        rating: Rating,
        before: &CardState,
        after: &CardState,
        reviewed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: key.user_id.clone(),
            card_id: key.card_id.clone(),
            rating,
            reviewed_at,
            was_learning: before.is_learning,
            interval_before: before.interval,
            interval_after: after.interval,
            ease_after: after.ease_factor,
        }
    }
}
