//! Match lifecycle management
//!
//! This module contains the match record with its state machine and the
//! manager that drives queue membership, match transitions, the Live Battle
//! move log, and post-match bookkeeping.

pub mod instance;
pub mod manager;

// Re-export commonly used types
pub use instance::PvpMatch;
pub use manager::{ManagerStats, MatchManager};
