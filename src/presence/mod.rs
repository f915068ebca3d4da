//! Player presence tracking

pub mod tracker;

// Re-export commonly used types
pub use tracker::{OpponentPresence, PresenceTracker, TrackerStats};
