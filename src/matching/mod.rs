//! Periodic matchmaking over the waiting queues
//!
//! This module contains the pairing algorithms and the engine that runs
//! them on a cadence, turning waiting queue entries into created matches.

pub mod engine;
pub mod pairing;

// Re-export commonly used types
pub use engine::{EngineStats, MatchPassSummary, MatchingEngine};
pub use pairing::{AdjacentRatingPairer, PairingOutcome, PairingStrategy};
