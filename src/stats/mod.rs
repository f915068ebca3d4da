//! Post-match stats aggregation

pub mod aggregator;

// Re-export commonly used types
pub use aggregator::{AggregatorStats, StatsAggregator};
