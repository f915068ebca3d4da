//! Utility functions for the arena service

use crate::types::{MatchId, MoveId};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique match ID of the form `match_<millis>_<suffix>`
pub fn generate_match_id() -> MatchId {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("match_{}_{}", Utc::now().timestamp_millis(), &suffix[..8])
}

/// Generate a new unique move ID
pub fn generate_move_id() -> MoveId {
    format!("move_{}", Uuid::new_v4().simple())
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Calculate the absolute difference between two ratings
pub fn rating_difference(rating1: i32, rating2: i32) -> i32 {
    (rating1 - rating2).abs()
}
