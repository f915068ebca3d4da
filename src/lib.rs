//! Grid Arena - PvP matchmaking and match lifecycle service for sudoku duels
//!
//! This crate provides periodic queue matching with rating-adjacent pairing,
//! a per-match state machine with an append-only move log, presence tracking,
//! and post-match rating aggregation.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod matching;
pub mod metrics;
pub mod presence;
pub mod puzzle;
pub mod rating;
pub mod scheduler;
pub mod service;
pub mod stats;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use lifecycle::{MatchManager, PvpMatch};
pub use matching::MatchingEngine;
pub use store::{ArenaStore, InMemoryStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
