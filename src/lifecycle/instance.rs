//! Match instance implementation and state transitions
//!
//! This module contains the core match document and the transition rules
//! between its lifecycle states.

use crate::error::{MatchmakingError, Result};
use crate::types::{
    MatchId, MatchStatus, PlayerMatchData, PlayerResult, PlayerStatus, PvpMode, PvpPuzzle, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A head-to-head match document
///
/// `COMPLETED` and `CANCELLED` are terminal; once reached, transition methods
/// either no-op (idempotent re-entry) or reject, and never mutate the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PvpMatch {
    pub match_id: MatchId,
    pub mode: PvpMode,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Hard end time, set at start for Live Battle matches
    pub deadline_at: Option<DateTime<Utc>>,
    pub puzzle: PvpPuzzle,
    pub players: HashMap<UserId, PlayerMatchData>,
    pub winner_id: Option<UserId>,
    /// Set once the stats aggregator has claimed this match
    pub stats_applied: bool,
}

impl PvpMatch {
    /// Create a new match in the `WAITING` state
    ///
    /// A match seats at most two players, each at most once.
    pub fn new(
        match_id: impl Into<MatchId>,
        mode: PvpMode,
        puzzle: PvpPuzzle,
        players: Vec<PlayerMatchData>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let match_id = match_id.into();
        if players.len() > 2 {
            return Err(MatchmakingError::InvalidTransition {
                reason: format!(
                    "match {} cannot seat {} players (max 2)",
                    match_id,
                    players.len()
                ),
            }
            .into());
        }

        let mut seated: HashMap<UserId, PlayerMatchData> = HashMap::new();
        for player in players {
            let user_id = player.user_id.clone();
            if seated.insert(user_id.clone(), player).is_some() {
                return Err(MatchmakingError::InvalidTransition {
                    reason: format!("player {} seated twice in match {}", user_id, match_id),
                }
                .into());
            }
        }

        Ok(Self {
            match_id,
            mode,
            status: MatchStatus::Waiting,
            created_at: now,
            started_at: None,
            ended_at: None,
            deadline_at: None,
            puzzle,
            players: seated,
            winner_id: None,
            stats_applied: false,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn has_player(&self, user_id: &str) -> bool {
        self.players.contains_key(user_id)
    }

    pub fn player(&self, user_id: &str) -> Option<&PlayerMatchData> {
        self.players.get(user_id)
    }

    /// The other seated player, when there is one
    pub fn opponent_of(&self, user_id: &str) -> Option<&PlayerMatchData> {
        self.players.values().find(|p| p.user_id != user_id)
    }

    pub fn all_players_ready(&self) -> bool {
        self.players.values().all(|p| p.status == PlayerStatus::Ready)
    }

    pub fn both_results_submitted(&self) -> bool {
        self.players.len() == 2 && self.players.values().all(|p| p.result.is_some())
    }

    /// Winner decided from the submitted results
    ///
    /// Highest `final_score` wins; a tie between two submitted results is a
    /// draw; a single submitted result wins by default; none is a draw.
    pub fn winner_by_score(&self) -> Option<UserId> {
        let mut submitted: Vec<(&UserId, i64)> = self
            .players
            .values()
            .filter_map(|p| p.result.as_ref().map(|r| (&p.user_id, r.final_score)))
            .collect();
        match submitted.len() {
            0 => None,
            1 => Some(submitted[0].0.clone()),
            _ => {
                submitted.sort_by(|a, b| b.1.cmp(&a.1));
                if submitted[0].1 == submitted[1].1 {
                    None
                } else {
                    Some(submitted[0].0.clone())
                }
            }
        }
    }

    /// Transition `WAITING -> IN_PROGRESS`
    ///
    /// Requires exactly two seated players, both `READY`. Flips both players
    /// to `PLAYING` and stamps `started_at` and the optional deadline. Any
    /// violation, including a repeat call, is an `InvalidTransition`.
    pub fn mark_started(
        &mut self,
        now: DateTime<Utc>,
        deadline_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if self.status != MatchStatus::Waiting {
            return Err(MatchmakingError::InvalidTransition {
                reason: format!(
                    "match {} cannot start from status {}",
                    self.match_id, self.status
                ),
            }
            .into());
        }
        if self.players.len() != 2 {
            return Err(MatchmakingError::InvalidTransition {
                reason: format!(
                    "match {} needs 2 players to start, has {}",
                    self.match_id,
                    self.players.len()
                ),
            }
            .into());
        }
        if !self.all_players_ready() {
            return Err(MatchmakingError::InvalidTransition {
                reason: format!("match {} has players that are not ready", self.match_id),
            }
            .into());
        }

        self.status = MatchStatus::InProgress;
        self.started_at = Some(now);
        self.deadline_at = deadline_at;
        for player in self.players.values_mut() {
            player.status = PlayerStatus::Playing;
        }
        Ok(())
    }

    /// Transition `IN_PROGRESS -> COMPLETED`
    ///
    /// Returns `Ok(false)` without touching the record when the match is
    /// already `COMPLETED`; completing a `CANCELLED` or never-started match
    /// is an `InvalidTransition`.
    pub fn mark_completed(
        &mut self,
        winner_id: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        match self.status {
            MatchStatus::Completed => Ok(false),
            MatchStatus::Cancelled => Err(MatchmakingError::InvalidTransition {
                reason: format!("match {} was cancelled and cannot complete", self.match_id),
            }
            .into()),
            MatchStatus::Waiting => Err(MatchmakingError::InvalidTransition {
                reason: format!("match {} has not started", self.match_id),
            }
            .into()),
            MatchStatus::InProgress => {
                self.status = MatchStatus::Completed;
                self.ended_at = Some(now);
                self.winner_id = winner_id;
                Ok(true)
            }
        }
    }

    /// Transition `WAITING | IN_PROGRESS -> CANCELLED`
    ///
    /// When a forfeiting player is named and has an opponent, the opponent is
    /// recorded as the winner. Returns `Ok(false)` on an already-cancelled
    /// match; cancelling a `COMPLETED` match is an `InvalidTransition`.
    pub fn mark_cancelled(
        &mut self,
        forfeiting_user: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        match self.status {
            MatchStatus::Cancelled => Ok(false),
            MatchStatus::Completed => Err(MatchmakingError::InvalidTransition {
                reason: format!("match {} already completed", self.match_id),
            }
            .into()),
            MatchStatus::Waiting | MatchStatus::InProgress => {
                self.status = MatchStatus::Cancelled;
                self.ended_at = Some(now);
                if let Some(user_id) = forfeiting_user {
                    self.winner_id = self.opponent_of(user_id).map(|p| p.user_id.clone());
                }
                Ok(true)
            }
        }
    }

    /// Update one player's status within a live match
    pub fn set_player_status(&mut self, user_id: &str, status: PlayerStatus) -> Result<()> {
        if self.is_terminal() {
            return Err(MatchmakingError::InvalidTransition {
                reason: format!(
                    "match {} is {} and no longer accepts updates",
                    self.match_id, self.status
                ),
            }
            .into());
        }
        match self.players.get_mut(user_id) {
            Some(player) => {
                player.status = status;
                Ok(())
            }
            None => Err(MatchmakingError::PlayerNotFound {
                user_id: user_id.to_string(),
            }
            .into()),
        }
    }

    /// Record a player's final result, exactly once
    pub fn record_result(&mut self, user_id: &str, result: PlayerResult) -> Result<()> {
        if self.status != MatchStatus::InProgress {
            return Err(MatchmakingError::InvalidTransition {
                reason: format!(
                    "match {} is {} and cannot accept results",
                    self.match_id, self.status
                ),
            }
            .into());
        }
        match self.players.get_mut(user_id) {
            Some(player) => {
                if player.result.is_some() {
                    return Err(MatchmakingError::DuplicateSubmission {
                        match_id: self.match_id.clone(),
                        user_id: user_id.to_string(),
                    }
                    .into());
                }
                player.result = Some(result);
                player.status = PlayerStatus::Finished;
                Ok(())
            }
            None => Err(MatchmakingError::PlayerNotFound {
                user_id: user_id.to_string(),
            }
            .into()),
        }
    }
}
