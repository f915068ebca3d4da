//! Puzzle provider traits and implementations
//!
//! Puzzles live in a fixed, densely populated namespace of
//! `puzzle_000001..puzzle_100000`. Selection samples an ID uniformly from
//! that namespace without verifying existence; resolution of an ID to a
//! full board is the provider's concern.

use crate::error::{MatchmakingError, Result};
use crate::types::{PuzzleId, PvpPuzzle};
use async_trait::async_trait;
use rand::Rng;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

/// Number of IDs in the fixed puzzle namespace
pub const PUZZLE_NAMESPACE_SIZE: u32 = 100_000;

/// Format a namespace index as a puzzle ID
pub fn format_puzzle_id(index: u32) -> PuzzleId {
    format!("puzzle_{:06}", index)
}

/// Sample a puzzle ID uniformly from the fixed namespace
pub fn sample_puzzle_id() -> PuzzleId {
    format_puzzle_id(rand::thread_rng().gen_range(1..=PUZZLE_NAMESPACE_SIZE))
}

/// Trait for resolving and selecting puzzles
#[async_trait]
pub trait PuzzleProvider: Send + Sync {
    /// Resolve a puzzle ID to a full board
    async fn get_puzzle(&self, puzzle_id: &str) -> Result<PvpPuzzle>;

    /// Pick a random puzzle ID, optionally biased to a difficulty
    async fn random_puzzle_id(&self, difficulty: Option<&str>) -> Result<PuzzleId>;
}

/// Puzzle provider backed by a fixed validated pool
///
/// Every namespace ID resolves: IDs map deterministically onto the pool, so
/// the unverified random selection upstream can never pick a dead ID.
#[derive(Debug, Clone)]
pub struct StaticPuzzleProvider {
    pool: Vec<PvpPuzzle>,
}

impl StaticPuzzleProvider {
    /// Create a provider over the built-in pool
    pub fn new() -> Self {
        Self {
            pool: default_pool(),
        }
    }

    /// Create a provider over a custom pool
    pub fn with_pool(pool: Vec<PvpPuzzle>) -> Result<Self> {
        if pool.is_empty() {
            return Err(MatchmakingError::ConfigurationError {
                message: "Puzzle pool cannot be empty".to_string(),
            }
            .into());
        }
        for puzzle in &pool {
            puzzle.validate()?;
        }
        Ok(Self { pool })
    }

    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    fn resolve(&self, puzzle_id: &str) -> &PvpPuzzle {
        let mut hasher = DefaultHasher::new();
        puzzle_id.hash(&mut hasher);
        let index = (hasher.finish() % self.pool.len() as u64) as usize;
        &self.pool[index]
    }
}

impl Default for StaticPuzzleProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PuzzleProvider for StaticPuzzleProvider {
    async fn get_puzzle(&self, puzzle_id: &str) -> Result<PvpPuzzle> {
        Ok(self.resolve(puzzle_id).clone())
    }

    async fn random_puzzle_id(&self, _difficulty: Option<&str>) -> Result<PuzzleId> {
        Ok(sample_puzzle_id())
    }
}

/// Built-in pool derived from a shifted Latin-square family
///
/// Each offset remaps the digits of a base solved grid and blanks a fixed
/// number of cells spread across the board, giving boards of increasing
/// difficulty that are consistent by construction.
fn default_pool() -> Vec<PvpPuzzle> {
    const TIERS: [(&str, usize); 4] = [
        ("easy", 30),
        ("medium", 38),
        ("hard", 46),
        ("expert", 54),
    ];

    (0..8usize)
        .map(|offset| {
            let (difficulty, blanks) = TIERS[offset % TIERS.len()];
            let solution: String = (0..81)
                .map(|i| {
                    let row = i / 9;
                    let col = i % 9;
                    let digit = (row * 3 + row / 3 + col + offset) % 9 + 1;
                    char::from_digit(digit as u32, 10).unwrap_or('1')
                })
                .collect();
            // 53 is coprime to 81, so this blanks exactly `blanks` cells
            let puzzle_string: String = solution
                .chars()
                .enumerate()
                .map(|(i, c)| {
                    if (i * 53 + offset * 17) % 81 < blanks {
                        '0'
                    } else {
                        c
                    }
                })
                .collect();
            PvpPuzzle {
                puzzle_string,
                solution,
                difficulty: difficulty.to_string(),
            }
        })
        .collect()
}

/// Recording puzzle provider for tests
///
/// Serves one fixed board, records every requested ID, and can be told to
/// fail the next N resolutions.
pub struct MockPuzzleProvider {
    puzzle: PvpPuzzle,
    requested_ids: Mutex<Vec<PuzzleId>>,
    fail_requests: Mutex<usize>,
    next_id: Mutex<u32>,
}

impl MockPuzzleProvider {
    pub fn new() -> Self {
        Self {
            puzzle: default_pool().remove(0),
            requested_ids: Mutex::new(Vec::new()),
            fail_requests: Mutex::new(0),
            next_id: Mutex::new(0),
        }
    }

    pub fn with_puzzle(puzzle: PvpPuzzle) -> Self {
        Self {
            puzzle,
            requested_ids: Mutex::new(Vec::new()),
            fail_requests: Mutex::new(0),
            next_id: Mutex::new(0),
        }
    }

    /// Fail the next `count` calls to `get_puzzle`
    pub fn fail_next_requests(&self, count: usize) {
        if let Ok(mut fail) = self.fail_requests.lock() {
            *fail = count;
        }
    }

    /// All IDs passed to `get_puzzle` so far
    pub fn requested_ids(&self) -> Vec<PuzzleId> {
        self.requested_ids
            .lock()
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }
}

impl Default for MockPuzzleProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PuzzleProvider for MockPuzzleProvider {
    async fn get_puzzle(&self, puzzle_id: &str) -> Result<PvpPuzzle> {
        let mut ids = self
            .requested_ids
            .lock()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire mock provider lock".to_string(),
            })?;
        ids.push(puzzle_id.to_string());
        drop(ids);

        let mut fail = self
            .fail_requests
            .lock()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire mock provider lock".to_string(),
            })?;
        if *fail > 0 {
            *fail -= 1;
            return Err(MatchmakingError::StoreUnavailable {
                message: format!("mock failure resolving {}", puzzle_id),
            }
            .into());
        }
        Ok(self.puzzle.clone())
    }

    async fn random_puzzle_id(&self, _difficulty: Option<&str>) -> Result<PuzzleId> {
        let mut next = self
            .next_id
            .lock()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire mock provider lock".to_string(),
            })?;
        *next += 1;
        Ok(format_puzzle_id(*next))
    }
}
