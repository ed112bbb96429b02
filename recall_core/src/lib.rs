#![forbid(unsafe_code)]

//! Core domain model and scheduling logic for Recall.
//!
//! This crate provides:
//! - Card review state and ratings
//! - The SM-2 transition function (pure, clock-free)
//! - Due-queue selection and dashboard statistics
//! - Persistence helpers (card store, review log, CSV rollup)
//! - Review history, daily activity and streaks

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod scheduler;
pub mod queue;
pub mod stats;
pub mod migration;
pub mod store;
pub mod review_log;
pub mod rollup;
pub mod history;
pub mod activity;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::{Config, SchedulerConfig};
pub use scheduler::{format_interval, ReviewPreview, Scheduler};
pub use queue::select_due;
pub use stats::{statistics, Statistics};
pub use store::{CardStore, JsonCardStore};
pub use review_log::{JsonlReviewLog, ReviewSink};
pub use history::{load_entries, load_recent_entries};
pub use activity::{current_streak, daily_activity, recent_activity, DailyActivity};
