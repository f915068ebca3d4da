//! Pairing algorithms for waiting queue entries
//!
//! This module handles the logic for turning one mode's waiting queue into
//! concrete player pairs. Pairing is pure computation over a snapshot; the
//! engine owns fetching the snapshot and creating matches from the pairs.

use crate::types::QueueEntry;

/// Result of a pairing computation over one mode's waiting entries
#[derive(Debug, Clone, Default)]
pub struct PairingOutcome {
    /// Entries paired for match creation, in ascending rating order
    pub pairs: Vec<(QueueEntry, QueueEntry)>,
    /// Entries left waiting for a future pass
    pub unpaired: Vec<QueueEntry>,
}

impl PairingOutcome {
    /// Number of players placed into pairs
    pub fn paired_players(&self) -> usize {
        self.pairs.len() * 2
    }
}

/// Trait for pairing algorithms over a single mode's queue snapshot
#[cfg_attr(test, mockall::automock)]
pub trait PairingStrategy: Send + Sync {
    /// Pair waiting entries; entries without a partner come back unpaired
    fn pair_entries(&self, entries: Vec<QueueEntry>) -> PairingOutcome;
}

/// Rating-adjacency pairer
///
/// Sorts the snapshot by rating and pairs neighbors, which keeps each
/// created match as close in skill as a single pass can make it. Ties are
/// broken by enqueue time and then user ID so repeated passes over the same
/// queue produce the same pairs. With an odd snapshot the highest-rated
/// entry is left waiting for the next pass.
#[derive(Debug, Clone, Default)]
pub struct AdjacentRatingPairer;

impl AdjacentRatingPairer {
    pub fn new() -> Self {
        Self
    }
}

impl PairingStrategy for AdjacentRatingPairer {
    fn pair_entries(&self, mut entries: Vec<QueueEntry>) -> PairingOutcome {
        entries.sort_by(|a, b| {
            a.rating
                .cmp(&b.rating)
                .then_with(|| a.enqueued_at.cmp(&b.enqueued_at))
                .then_with(|| a.user_id.cmp(&b.user_id))
        });

        let mut outcome = PairingOutcome::default();
        let mut iter = entries.into_iter();
        while let Some(first) = iter.next() {
            match iter.next() {
                Some(second) => outcome.pairs.push((first, second)),
                None => outcome.unpaired.push(first),
            }
        }

        outcome
    }
}
