//! Durable storage boundary for the arena service
//!
//! This module defines the storage traits the rest of the service is written
//! against, plus the in-memory implementation that backs the service and its
//! tests. The store's atomic write boundary is the only synchronization
//! primitive the matchmaking and lifecycle logic rely on.

pub mod matches;
pub mod memory;
pub mod presence;
pub mod queue;
pub mod stats;

// Re-export commonly used types
pub use matches::{MatchStore, MatchUpdate};
pub use memory::InMemoryStore;
pub use presence::PresenceStore;
pub use queue::QueueStore;
pub use stats::StatsStore;

/// Umbrella trait for a store backing every subsystem
pub trait ArenaStore: QueueStore + MatchStore + StatsStore + PresenceStore {}

impl<T: QueueStore + MatchStore + StatsStore + PresenceStore> ArenaStore for T {}
