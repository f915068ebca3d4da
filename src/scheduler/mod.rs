//! Periodic background sweeps

pub mod driver;

// Re-export commonly used types
pub use driver::SchedulerDriver;
