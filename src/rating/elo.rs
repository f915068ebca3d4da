//! Elo rating system implementation
//!
//! This module provides a concrete implementation of the rating calculator
//! using the classic Elo algorithm from the skillratings crate. Duels are
//! strictly two-player, which is exactly the shape Elo models.

use crate::rating::calculator::{RatingCalculator, RatingUpdate};
use crate::types::MatchOutcome;
use serde::{Deserialize, Serialize};
use skillratings::elo::{elo, expected_score, EloConfig, EloRating};
use skillratings::Outcomes;

/// Configuration for the Elo rating system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EloSettings {
    /// K-factor applied to every game
    pub k_factor: f64,
    /// Initial rating for new players
    pub initial_rating: i32,
}

impl Default for EloSettings {
    fn default() -> Self {
        Self {
            k_factor: 32.0,
            initial_rating: crate::types::INITIAL_RATING,
        }
    }
}

impl EloSettings {
    /// Create stable configuration (slower rating changes)
    pub fn stable() -> Self {
        Self {
            k_factor: 16.0,
            ..Self::default()
        }
    }

    /// Create provisional configuration (faster rating changes)
    pub fn provisional() -> Self {
        Self {
            k_factor: 40.0,
            ..Self::default()
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> crate::error::Result<()> {
        if !self.k_factor.is_finite() || self.k_factor <= 0.0 {
            return Err(crate::error::MatchmakingError::ConfigurationError {
                message: "K-factor must be positive".to_string(),
            }
            .into());
        }

        if self.initial_rating <= 0 {
            return Err(crate::error::MatchmakingError::ConfigurationError {
                message: "Initial rating must be positive".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Elo rating calculator implementation
#[derive(Debug)]
pub struct EloRatingCalculator {
    settings: EloSettings,
}

impl EloRatingCalculator {
    /// Create a new Elo rating calculator
    pub fn new(settings: EloSettings) -> crate::error::Result<Self> {
        settings.validate()?;

        Ok(Self { settings })
    }

    /// Win expectation for a player against one opponent (0.0 to 1.0)
    pub fn win_expectation(&self, rating: i32, opponent_rating: i32) -> f64 {
        let player = EloRating {
            rating: rating as f64,
        };
        let opponent = EloRating {
            rating: opponent_rating as f64,
        };
        let (expected, _) = expected_score(&player, &opponent);
        expected
    }

    fn elo_outcome(outcome: MatchOutcome) -> Outcomes {
        match outcome {
            MatchOutcome::Win => Outcomes::WIN,
            MatchOutcome::Loss => Outcomes::LOSS,
            MatchOutcome::Draw => Outcomes::DRAW,
        }
    }
}

impl Default for EloRatingCalculator {
    fn default() -> Self {
        // Default settings always validate
        Self {
            settings: EloSettings::default(),
        }
    }
}

impl RatingCalculator for EloRatingCalculator {
    fn rate_pair(
        &self,
        first: (&str, i32),
        second: (&str, i32),
        first_outcome: MatchOutcome,
    ) -> crate::error::Result<(RatingUpdate, RatingUpdate)> {
        let first_elo = EloRating {
            rating: first.1 as f64,
        };
        let second_elo = EloRating {
            rating: second.1 as f64,
        };
        let config = EloConfig {
            k: self.settings.k_factor,
        };

        let (new_first, new_second) = elo(
            &first_elo,
            &second_elo,
            &Self::elo_outcome(first_outcome),
            &config,
        );

        if !new_first.rating.is_finite() || !new_second.rating.is_finite() {
            return Err(crate::error::MatchmakingError::RatingCalculationFailed {
                reason: format!(
                    "Non-finite rating from inputs {} and {}",
                    first.1, second.1
                ),
            }
            .into());
        }

        Ok((
            RatingUpdate {
                user_id: first.0.to_string(),
                old_rating: first.1,
                new_rating: new_first.rating.round() as i32,
                outcome: first_outcome,
            },
            RatingUpdate {
                user_id: second.0.to_string(),
                old_rating: second.1,
                new_rating: new_second.rating.round() as i32,
                outcome: first_outcome.opposite(),
            },
        ))
    }

    fn initial_rating(&self) -> i32 {
        self.settings.initial_rating
    }

    fn config(&self) -> serde_json::Value {
        serde_json::to_value(&self.settings).unwrap_or(serde_json::Value::Null)
    }
}
