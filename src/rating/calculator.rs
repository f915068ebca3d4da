//! Rating calculator trait and implementations
//!
//! This module defines the interface for head-to-head rating calculations
//! and provides basic implementations for testing and fallback use.

use crate::types::{MatchOutcome, UserId};
use serde::{Deserialize, Serialize};

/// Applied rating change for one player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingUpdate {
    /// Player the change applies to
    pub user_id: UserId,
    /// Rating going into the game
    pub old_rating: i32,
    /// Rating after the game
    pub new_rating: i32,
    /// Outcome from this player's perspective
    pub outcome: MatchOutcome,
}

impl RatingUpdate {
    /// Signed rating change
    pub fn delta(&self) -> i32 {
        self.new_rating - self.old_rating
    }

    /// An update that leaves the rating untouched
    pub fn unchanged(user_id: &str, rating: i32, outcome: MatchOutcome) -> Self {
        Self {
            user_id: user_id.to_string(),
            old_rating: rating,
            new_rating: rating,
            outcome,
        }
    }
}

/// Trait for calculating rating changes after head-to-head games
pub trait RatingCalculator: Send + Sync {
    /// Calculate new ratings for both sides of a finished game
    ///
    /// # Arguments
    /// * `first` - (user_id, current_rating) for the first player
    /// * `second` - (user_id, current_rating) for the second player
    /// * `first_outcome` - Result from the first player's perspective
    ///
    /// # Returns
    /// Result containing one update per player, in argument order
    fn rate_pair(
        &self,
        first: (&str, i32),
        second: (&str, i32),
        first_outcome: MatchOutcome,
    ) -> crate::error::Result<(RatingUpdate, RatingUpdate)>;

    /// Get the initial rating for new players
    fn initial_rating(&self) -> i32;

    /// Get current configuration as JSON
    fn config(&self) -> serde_json::Value;
}

/// Simple rating calculator for testing or fallback
#[derive(Debug, Clone)]
pub struct NoOpRatingCalculator {
    initial_rating: i32,
}

impl NoOpRatingCalculator {
    /// Create a new no-op rating calculator
    pub fn new(initial_rating: i32) -> Self {
        Self { initial_rating }
    }
}

impl Default for NoOpRatingCalculator {
    fn default() -> Self {
        Self::new(crate::types::INITIAL_RATING)
    }
}

impl RatingCalculator for NoOpRatingCalculator {
    fn rate_pair(
        &self,
        first: (&str, i32),
        second: (&str, i32),
        first_outcome: MatchOutcome,
    ) -> crate::error::Result<(RatingUpdate, RatingUpdate)> {
        // No-op: return unchanged ratings
        Ok((
            RatingUpdate::unchanged(first.0, first.1, first_outcome),
            RatingUpdate::unchanged(second.0, second.1, first_outcome.opposite()),
        ))
    }

    fn initial_rating(&self) -> i32 {
        self.initial_rating
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "no_op",
            "initial_rating": self.initial_rating,
        })
    }
}

/// Mock rating calculator for testing
#[derive(Debug, Default)]
pub struct MockRatingCalculator {
    rate_calls: std::sync::Mutex<Vec<(UserId, UserId, MatchOutcome)>>,
    fixed_updates: std::sync::RwLock<Option<(RatingUpdate, RatingUpdate)>>,
    initial_rating: i32,
}

impl MockRatingCalculator {
    pub fn new() -> Self {
        Self {
            rate_calls: std::sync::Mutex::new(Vec::new()),
            fixed_updates: std::sync::RwLock::new(None),
            initial_rating: crate::types::INITIAL_RATING,
        }
    }

    /// Set fixed updates to return for all calculations
    pub fn set_fixed_updates(&self, updates: (RatingUpdate, RatingUpdate)) {
        if let Ok(mut fixed) = self.fixed_updates.write() {
            *fixed = Some(updates);
        }
    }

    /// Get all rating calls made (for testing)
    pub fn get_rate_calls(&self) -> Vec<(UserId, UserId, MatchOutcome)> {
        self.rate_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Clear recorded calls
    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.rate_calls.lock() {
            calls.clear();
        }
    }
}

impl RatingCalculator for MockRatingCalculator {
    fn rate_pair(
        &self,
        first: (&str, i32),
        second: (&str, i32),
        first_outcome: MatchOutcome,
    ) -> crate::error::Result<(RatingUpdate, RatingUpdate)> {
        // Record the call
        if let Ok(mut calls) = self.rate_calls.lock() {
            calls.push((first.0.to_string(), second.0.to_string(), first_outcome));
        }

        // Return fixed updates if set, otherwise leave ratings unchanged
        if let Ok(fixed) = self.fixed_updates.read() {
            if let Some(updates) = fixed.as_ref() {
                return Ok(updates.clone());
            }
        }

        Ok((
            RatingUpdate::unchanged(first.0, first.1, first_outcome),
            RatingUpdate::unchanged(second.0, second.1, first_outcome.opposite()),
        ))
    }

    fn initial_rating(&self) -> i32 {
        self.initial_rating
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "mock",
            "initial_rating": self.initial_rating,
        })
    }
}
