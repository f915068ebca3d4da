//! Rating system integration using the Elo algorithm
//!
//! This module provides rating calculations for finished duels and
//! integration with the skillratings crate for two-player ranking.

pub mod calculator;
pub mod elo;

// Re-export commonly used types
pub use calculator::{MockRatingCalculator, NoOpRatingCalculator, RatingCalculator, RatingUpdate};
pub use elo::{EloRatingCalculator, EloSettings};
