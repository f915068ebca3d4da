//! Error types for the arena service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking and match lifecycle scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Invalid transition: {reason}")]
    InvalidTransition { reason: String },

    #[error("Duplicate result submission by {user_id} in match {match_id}")]
    DuplicateSubmission { match_id: String, user_id: String },

    #[error("Move out of sequence for {user_id} in match {match_id}: expected {expected}, got {got}")]
    SequenceError {
        match_id: String,
        user_id: String,
        expected: u32,
        got: u32,
    },

    #[error("Match not found: {match_id}")]
    MatchNotFound { match_id: String },

    #[error("Player not found: {user_id}")]
    PlayerNotFound { user_id: String },

    #[error("Queue entry not found for {user_id}")]
    QueueEntryNotFound { user_id: String },

    #[error("Invalid puzzle: {reason}")]
    InvalidPuzzle { reason: String },

    #[error("Rating calculation failed: {reason}")]
    RatingCalculationFailed { reason: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
