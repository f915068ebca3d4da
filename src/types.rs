//! Common types used throughout the arena service

use crate::error::{MatchmakingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for users
pub type UserId = String;

/// Unique identifier for matches
pub type MatchId = String;

/// Unique identifier for puzzles
pub type PuzzleId = String;

/// Unique identifier for logged moves
pub type MoveId = String;

/// Rating assigned to users who have never played a mode
pub const INITIAL_RATING: i32 = 1000;

/// Head-to-head game mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PvpMode {
    BlindRace,
    LiveBattle,
}

impl PvpMode {
    /// All supported modes, in a stable order
    pub const ALL: [PvpMode; 2] = [PvpMode::BlindRace, PvpMode::LiveBattle];
}

impl std::fmt::Display for PvpMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PvpMode::BlindRace => write!(f, "BLIND_RACE"),
            PvpMode::LiveBattle => write!(f, "LIVE_BATTLE"),
        }
    }
}

/// Lifecycle state of a queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Waiting,
    Matched,
    Cancelled,
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueStatus::Waiting => write!(f, "waiting"),
            QueueStatus::Matched => write!(f, "matched"),
            QueueStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Lifecycle state of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Waiting,
    InProgress,
    Completed,
    Cancelled,
}

impl MatchStatus {
    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Cancelled)
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Waiting => write!(f, "WAITING"),
            MatchStatus::InProgress => write!(f, "IN_PROGRESS"),
            MatchStatus::Completed => write!(f, "COMPLETED"),
            MatchStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Per-player state within a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerStatus {
    Ready,
    Playing,
    Finished,
}

impl std::fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerStatus::Ready => write!(f, "READY"),
            PlayerStatus::Playing => write!(f, "PLAYING"),
            PlayerStatus::Finished => write!(f, "FINISHED"),
        }
    }
}

/// Connection state reported through match-scoped presence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PresenceStatus::Online => write!(f, "online"),
            PresenceStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Result of a match from one player's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    Win,
    Loss,
    Draw,
}

impl MatchOutcome {
    /// Outcome for `user_id` given the recorded winner (none = draw)
    pub fn for_player(winner_id: Option<&str>, user_id: &str) -> Self {
        match winner_id {
            Some(w) if w == user_id => MatchOutcome::Win,
            Some(_) => MatchOutcome::Loss,
            None => MatchOutcome::Draw,
        }
    }

    /// Outcome seen by the opponent
    pub fn opposite(&self) -> Self {
        match self {
            MatchOutcome::Win => MatchOutcome::Loss,
            MatchOutcome::Loss => MatchOutcome::Win,
            MatchOutcome::Draw => MatchOutcome::Draw,
        }
    }
}

impl std::fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchOutcome::Win => write!(f, "win"),
            MatchOutcome::Loss => write!(f, "loss"),
            MatchOutcome::Draw => write!(f, "draw"),
        }
    }
}

/// A user waiting to be paired in one mode
///
/// Keyed by `(user_id, mode)`; re-joining replaces the previous entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub user_id: UserId,
    pub display_name: String,
    pub mode: PvpMode,
    /// Rating snapshot taken at enqueue time
    pub rating: i32,
    pub enqueued_at: DateTime<Utc>,
    pub status: QueueStatus,
    /// Set when the entry is claimed by a match
    pub match_id: Option<MatchId>,
}

impl QueueEntry {
    /// Create a fresh waiting entry
    pub fn waiting(
        user_id: impl Into<UserId>,
        display_name: impl Into<String>,
        mode: PvpMode,
        rating: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            mode,
            rating,
            enqueued_at: now,
            status: QueueStatus::Waiting,
            match_id: None,
        }
    }
}

/// A Sudoku board shared by both players of a match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PvpPuzzle {
    /// 81 characters, `'0'` marks an empty cell
    pub puzzle_string: String,
    /// 81 characters, `'1'..='9'`
    pub solution: String,
    pub difficulty: String,
}

impl PvpPuzzle {
    /// Check board shape and that every given agrees with the solution
    pub fn validate(&self) -> Result<()> {
        if self.puzzle_string.len() != 81 {
            return Err(MatchmakingError::InvalidPuzzle {
                reason: format!("puzzle must be 81 characters, got {}", self.puzzle_string.len()),
            }
            .into());
        }
        if self.solution.len() != 81 {
            return Err(MatchmakingError::InvalidPuzzle {
                reason: format!("solution must be 81 characters, got {}", self.solution.len()),
            }
            .into());
        }
        if !self.puzzle_string.chars().all(|c| c.is_ascii_digit()) {
            return Err(MatchmakingError::InvalidPuzzle {
                reason: "puzzle may only contain digits 0-9".to_string(),
            }
            .into());
        }
        if !self.solution.chars().all(|c| ('1'..='9').contains(&c)) {
            return Err(MatchmakingError::InvalidPuzzle {
                reason: "solution may only contain digits 1-9".to_string(),
            }
            .into());
        }
        for (cell, (given, solved)) in
            self.puzzle_string.chars().zip(self.solution.chars()).enumerate()
        {
            if given != '0' && given != solved {
                return Err(MatchmakingError::InvalidPuzzle {
                    reason: format!("given at cell {} disagrees with the solution", cell),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// One player's slot within a match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerMatchData {
    pub user_id: UserId,
    pub display_name: String,
    pub status: PlayerStatus,
    pub joined_at: DateTime<Utc>,
    /// Set exactly once, when the player submits their result
    pub result: Option<PlayerResult>,
}

impl PlayerMatchData {
    /// A freshly seated player waiting for the match to start
    pub fn ready(
        user_id: impl Into<UserId>,
        display_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            status: PlayerStatus::Ready,
            joined_at: now,
            result: None,
        }
    }
}

/// Final scoring summary a player submits when they finish
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerResult {
    pub final_score: i64,
    pub base_points: i64,
    pub streak_bonus: i64,
    pub time_bonus: i64,
    pub completion_bonus: i64,
    pub max_streak: u32,
    pub total_moves: u32,
    pub correct_moves: u32,
    pub wrong_moves: u32,
    pub hints_used: u32,
    pub is_perfect_game: bool,
    pub is_first_finish: bool,
    pub completed_at: DateTime<Utc>,
    pub time_elapsed_ms: i64,
    pub accuracy: f64,
}

/// One appended entry of a Live Battle move log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PvpMove {
    pub move_id: MoveId,
    pub player_id: UserId,
    pub timestamp: DateTime<Utc>,
    pub row: u8,
    pub col: u8,
    pub value: u8,
    pub is_correct: bool,
    /// Strictly increasing per player within a match, starting at 1
    pub move_number: u32,
}

/// Move payload as submitted by a client, before the service stamps it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveSubmission {
    pub player_id: UserId,
    pub row: u8,
    pub col: u8,
    pub value: u8,
    pub is_correct: bool,
    pub move_number: u32,
}

impl PvpMove {
    /// Stamp a submission with its identity and arrival time
    pub fn from_submission(
        move_id: impl Into<MoveId>,
        submission: MoveSubmission,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            move_id: move_id.into(),
            player_id: submission.player_id,
            timestamp: now,
            row: submission.row,
            col: submission.col,
            value: submission.value,
            is_correct: submission.is_correct,
            move_number: submission.move_number,
        }
    }
}

/// Heartbeat-backed connection record, scoped to one match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub user_id: UserId,
    pub status: PresenceStatus,
    pub last_seen: DateTime<Utc>,
}

/// Aggregate record for one user across both modes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PvpStats {
    pub user_id: UserId,
    pub blind_race: ModeStats,
    pub live_battle: ModeStats,
}

impl PvpStats {
    /// Fresh record with initial ratings in both modes
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            blind_race: ModeStats::default(),
            live_battle: ModeStats::default(),
        }
    }

    pub fn for_mode(&self, mode: PvpMode) -> &ModeStats {
        match mode {
            PvpMode::BlindRace => &self.blind_race,
            PvpMode::LiveBattle => &self.live_battle,
        }
    }

    pub fn for_mode_mut(&mut self, mode: PvpMode) -> &mut ModeStats {
        match mode {
            PvpMode::BlindRace => &mut self.blind_race,
            PvpMode::LiveBattle => &mut self.live_battle,
        }
    }
}

/// Aggregate counters for one user in one mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeStats {
    pub games_played: u64,
    pub wins: u64,
    pub losses: u64,
    pub draws: u64,
    pub average_time_ms: f64,
    pub average_score: f64,
    pub rating: i32,
}

impl Default for ModeStats {
    fn default() -> Self {
        Self {
            games_played: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            average_time_ms: 0.0,
            average_score: 0.0,
            rating: INITIAL_RATING,
        }
    }
}

impl ModeStats {
    /// Fold one finished game into the counters
    ///
    /// Rolling averages weight by the games played so far, and only fold when
    /// the player actually submitted a result. Rating changes are applied
    /// separately by the rating calculator.
    pub fn apply_game(&mut self, outcome: MatchOutcome, result: Option<&PlayerResult>) {
        if let Some(result) = result {
            let played = self.games_played as f64;
            self.average_time_ms =
                (self.average_time_ms * played + result.time_elapsed_ms as f64) / (played + 1.0);
            self.average_score =
                (self.average_score * played + result.final_score as f64) / (played + 1.0);
        }
        self.games_played += 1;
        match outcome {
            MatchOutcome::Win => self.wins += 1,
            MatchOutcome::Loss => self.losses += 1,
            MatchOutcome::Draw => self.draws += 1,
        }
    }
}
