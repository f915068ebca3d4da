//! Puzzle selection and resolution
//!
//! Matches are played on a shared board drawn from a fixed ID namespace.
//! The provider trait hides where boards actually come from; the static
//! implementation serves a built-in validated pool.

pub mod provider;

// Re-export commonly used types
pub use provider::{
    format_puzzle_id, sample_puzzle_id, MockPuzzleProvider, PuzzleProvider, StaticPuzzleProvider,
    PUZZLE_NAMESPACE_SIZE,
};
