//! Error types for the recall_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for recall_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration file error (missing directories, serialization)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A rating value outside Again/Hard/Good/Easy
    #[error("Invalid rating: {0}")]
    InvalidRating(String),

    /// Scheduler configuration rejected at construction time
    #[error("Invalid scheduler config: {0}")]
    InvalidConfig(String),

    /// Card state violates a scheduling invariant (never repaired)
    #[error("Inconsistent card state: {0}")]
    InconsistentState(String),

    /// Legacy score could not be mapped
    #[error("Migration error: {0}")]
    Migration(String),

    /// No stored state for the (user, card) pair
    #[error("Card not found: {card_id} for user {user_id}")]
    CardNotFound { user_id: String, card_id: String },
}
