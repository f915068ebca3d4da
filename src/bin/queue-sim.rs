//! Queue Simulation CLI Tool
//!
//! Command-line tool for exercising the matchmaking stack in-process with
//! simulated players. No external services are required.
//!
//! Usage:
//!   cargo run --bin queue-sim -- --help
//!   cargo run --bin queue-sim match-pass --players 9 --mode live-battle
//!   cargo run --bin queue-sim lifecycle --players 8 --rounds 3
//!   cargo run --bin queue-sim soak --players 40 --duration 10

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use grid_arena::config::{MatchSettings, PresenceSettings, SchedulerSettings};
use grid_arena::lifecycle::MatchManager;
use grid_arena::matching::MatchingEngine;
use grid_arena::presence::PresenceTracker;
use grid_arena::puzzle::{PuzzleProvider, StaticPuzzleProvider};
use grid_arena::rating::{EloRatingCalculator, EloSettings};
use grid_arena::scheduler::SchedulerDriver;
use grid_arena::stats::StatsAggregator;
use grid_arena::store::{ArenaStore, InMemoryStore, MatchStore, QueueStore, StatsStore};
use grid_arena::types::{MatchStatus, MoveSubmission, PlayerResult, PvpMode, PvpStats};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "queue-sim")]
#[command(about = "In-process matchmaking simulator for the grid-arena service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed players and run a single matching pass
    MatchPass {
        /// Number of players to seed
        #[arg(short, long, default_value = "9")]
        players: usize,
        /// Mode to queue into (blind-race or live-battle)
        #[arg(short, long, default_value = "blind-race")]
        mode: String,
        /// Rating spread around the initial rating
        #[arg(short, long, default_value = "400")]
        spread: u32,
    },
    /// Run full match lifecycles and print the resulting leaderboard
    Lifecycle {
        /// Number of players to seed
        #[arg(short, long, default_value = "8")]
        players: usize,
        /// Mode to queue into (blind-race or live-battle)
        #[arg(short, long, default_value = "live-battle")]
        mode: String,
        /// Number of queue-and-play rounds
        #[arg(short, long, default_value = "3")]
        rounds: usize,
    },
    /// Run the real scheduler loops under a steady trickle of joins
    Soak {
        /// Number of players to trickle in
        #[arg(short, long, default_value = "40")]
        players: usize,
        /// How long to run in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,
    },
}

struct SimStack {
    store: Arc<dyn ArenaStore>,
    manager: Arc<MatchManager>,
    engine: Arc<MatchingEngine>,
    scheduler: Arc<SchedulerDriver>,
}

fn build_stack(scheduler_settings: SchedulerSettings) -> Result<SimStack> {
    let store: Arc<dyn ArenaStore> = Arc::new(InMemoryStore::new());

    let calculator = Arc::new(EloRatingCalculator::new(EloSettings::default())?);
    let aggregator = Arc::new(StatsAggregator::new(store.clone(), calculator));
    let puzzles: Arc<dyn PuzzleProvider> = Arc::new(StaticPuzzleProvider::new());
    let manager = Arc::new(MatchManager::new(
        store.clone(),
        puzzles,
        aggregator,
        MatchSettings::default(),
    ));
    let engine = Arc::new(MatchingEngine::new(store.clone(), manager.clone()));
    let tracker = Arc::new(PresenceTracker::new(
        store.clone(),
        PresenceSettings::default(),
    ));
    let scheduler = Arc::new(SchedulerDriver::new(
        engine.clone(),
        manager.clone(),
        tracker,
        scheduler_settings,
    ));

    Ok(SimStack {
        store,
        manager,
        engine,
        scheduler,
    })
}

fn parse_mode(mode: &str) -> Result<PvpMode> {
    match mode.to_lowercase().as_str() {
        "blind" | "blind-race" | "blind_race" => Ok(PvpMode::BlindRace),
        "live" | "live-battle" | "live_battle" => Ok(PvpMode::LiveBattle),
        _ => Err(anyhow::anyhow!(
            "Invalid mode. Use 'blind-race' or 'live-battle'"
        )),
    }
}

/// Seed stats records so players enter the queue with distinct ratings
async fn seed_players(
    stack: &SimStack,
    count: usize,
    mode: PvpMode,
    spread: u32,
) -> Result<Vec<String>> {
    let mut rng = rand::thread_rng();
    let mut user_ids = Vec::with_capacity(count);

    for i in 0..count {
        let user_id = format!("player-{:03}", i + 1);
        let rating = 1000 + rng.gen_range(0..=spread as i32) - spread as i32 / 2;

        let mut stats = PvpStats::new(user_id.as_str());
        stats.for_mode_mut(mode).rating = rating.max(100);
        stack.store.upsert_stats(stats).await?;

        stack
            .manager
            .join_matchmaking(&user_id, &format!("Player {}", i + 1), mode)
            .await?;
        user_ids.push(user_id);
    }

    Ok(user_ids)
}

/// Collect the match ids assigned to the given users after a pass
async fn assigned_matches(
    stack: &SimStack,
    user_ids: &[String],
    mode: PvpMode,
) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut match_ids = Vec::new();

    for user_id in user_ids {
        if let Some(entry) = stack.store.get_entry(user_id, mode).await? {
            if let Some(match_id) = entry.match_id {
                if seen.insert(match_id.clone()) {
                    match_ids.push(match_id);
                }
            }
        }
    }

    Ok(match_ids)
}

/// Play one match to completion with random scores
async fn play_match(stack: &SimStack, match_id: &str, mode: PvpMode) -> Result<()> {
    let mut rng = rand::thread_rng();

    stack.manager.start_match(match_id).await?;

    let record = stack
        .store
        .get_match(match_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Match {} vanished mid-simulation", match_id))?;
    let mut player_ids: Vec<String> = record.players.keys().cloned().collect();
    player_ids.sort();

    // Live battles stream a few moves before results come in
    if mode == PvpMode::LiveBattle {
        for (i, player_id) in player_ids.iter().enumerate() {
            for move_number in 1..=3u32 {
                let submission = MoveSubmission {
                    player_id: player_id.clone(),
                    row: rng.gen_range(0..9),
                    col: rng.gen_range(0..9),
                    value: rng.gen_range(1..=9),
                    is_correct: (move_number + i as u32) % 3 != 0,
                    move_number,
                };
                stack.manager.submit_move(match_id, submission).await?;
            }
        }
    }

    for player_id in &player_ids {
        let score = rng.gen_range(500..3000);
        let result = PlayerResult {
            final_score: score,
            base_points: score / 2,
            streak_bonus: 0,
            time_bonus: score / 4,
            completion_bonus: score / 4,
            max_streak: rng.gen_range(0..10),
            total_moves: 81,
            correct_moves: rng.gen_range(60..=81),
            wrong_moves: rng.gen_range(0..10),
            hints_used: 0,
            is_perfect_game: false,
            is_first_finish: false,
            completed_at: Utc::now(),
            time_elapsed_ms: rng.gen_range(60_000..480_000),
            accuracy: rng.gen_range(70.0..100.0),
        };
        stack
            .manager
            .submit_player_result(match_id, player_id, result)
            .await?;
    }

    Ok(())
}

async fn run_match_pass(players: usize, mode: PvpMode, spread: u32) -> Result<()> {
    let stack = build_stack(SchedulerSettings::default())?;

    println!(
        "🎲 Seeding {} players into {} (rating spread ±{})",
        players,
        mode,
        spread / 2
    );
    let user_ids = seed_players(&stack, players, mode, spread).await?;

    let summary = stack.engine.run_pass().await?;
    println!("📊 Matching pass summary:");
    println!("  Examined:        {}", summary.examined);
    println!("  Matches created: {}", summary.matches_created);
    println!("  Players matched: {}", summary.players_matched);
    println!("  Left waiting:    {}", summary.left_waiting);
    println!("  Pair failures:   {}", summary.pair_failures);

    let match_ids = assigned_matches(&stack, &user_ids, mode).await?;
    for match_id in &match_ids {
        if let Some(record) = stack.store.get_match(match_id).await? {
            let mut seats: Vec<_> = record
                .players
                .values()
                .map(|p| p.user_id.clone())
                .collect();
            seats.sort();
            println!("  ⚔️  {} -> {:?}", match_id, seats);
        }
    }

    let waiting = stack.store.waiting_entries(mode).await?;
    if !waiting.is_empty() {
        let mut names: Vec<_> = waiting.iter().map(|e| e.user_id.clone()).collect();
        names.sort();
        println!("  ⏳ Still waiting: {:?}", names);
    }

    Ok(())
}

async fn run_lifecycle(players: usize, mode: PvpMode, rounds: usize) -> Result<()> {
    let stack = build_stack(SchedulerSettings::default())?;

    println!(
        "🧪 Running {} rounds of {}-player lifecycles in {}",
        rounds, players, mode
    );
    let user_ids = seed_players(&stack, players, mode, 400).await?;

    for round in 1..=rounds {
        // Everyone re-queues after the first round
        if round > 1 {
            for (i, user_id) in user_ids.iter().enumerate() {
                stack
                    .manager
                    .join_matchmaking(user_id, &format!("Player {}", i + 1), mode)
                    .await?;
            }
        }

        let summary = stack.engine.run_pass().await?;
        let match_ids = assigned_matches(&stack, &user_ids, mode).await?;
        println!(
            "  Round {}: {} matches created, {} players left waiting",
            round, summary.matches_created, summary.left_waiting
        );

        for match_id in &match_ids {
            play_match(&stack, match_id, mode).await?;
            let record = stack
                .store
                .get_match(match_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Match {} vanished mid-simulation", match_id))?;
            if record.status != MatchStatus::Completed {
                println!(
                    "  ⚠️  Match {} did not complete: {}",
                    match_id, record.status
                );
            }
        }
    }

    println!("\n🏆 Final leaderboard:");
    let mut rows = Vec::new();
    for user_id in &user_ids {
        if let Some(stats) = stack.store.get_stats(user_id).await? {
            let mode_stats = stats.for_mode(mode);
            rows.push((
                mode_stats.rating,
                user_id.clone(),
                mode_stats.wins,
                mode_stats.losses,
                mode_stats.draws,
                mode_stats.games_played,
            ));
        }
    }
    rows.sort_by(|a, b| b.0.cmp(&a.0));
    for (i, (rating, user_id, wins, losses, draws, games)) in rows.iter().enumerate() {
        println!(
            "  {:>2}. {:<12} rating {:>4}  {}W/{}L/{}D over {} games",
            i + 1,
            user_id,
            rating,
            wins,
            losses,
            draws,
            games
        );
    }

    let manager_stats = stack.manager.get_stats()?;
    println!(
        "\n📊 Totals: {} matches created, {} completed, {} moves recorded",
        manager_stats.matches_created, manager_stats.matches_completed, manager_stats.moves_recorded
    );

    Ok(())
}

async fn run_soak(players: usize, duration: u64) -> Result<()> {
    let settings = SchedulerSettings {
        matching_interval_seconds: 1,
        cleanup_interval_seconds: 5,
        queue_staleness_seconds: 30,
        deadline_sweep_interval_seconds: 2,
        presence_sweep_interval_seconds: 2,
    };
    let stack = build_stack(settings)?;

    println!(
        "🔥 Soak: trickling {} players over {}s with 1s matching cadence",
        players, duration
    );

    let handles = stack.scheduler.start().await;

    let join_interval = Duration::from_millis((duration * 1000 / players.max(1) as u64).max(50));
    let mut rng = rand::thread_rng();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(duration);

    let mut joined = 0usize;
    while tokio::time::Instant::now() < deadline && joined < players {
        let user_id = format!("soak-{:03}", joined + 1);
        let mode = if rng.gen_bool(0.5) {
            PvpMode::BlindRace
        } else {
            PvpMode::LiveBattle
        };
        stack
            .manager
            .join_matchmaking(&user_id, &user_id, mode)
            .await?;
        joined += 1;
        tokio::time::sleep(join_interval).await;
    }

    // Let the last pass catch the stragglers
    tokio::time::sleep(Duration::from_secs(2)).await;

    stack.scheduler.stop().await;
    for handle in handles {
        let _ = handle.await;
    }

    let engine_stats = stack.engine.get_stats()?;
    let active = stack.store.count_active_matches().await?;
    println!("📊 Soak results:");
    println!("  Players joined:  {}", joined);
    println!("  Matches created: {}", engine_stats.matches_created);
    println!("  Players matched: {}", engine_stats.players_matched);
    println!("  Active matches:  {}", active);

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::MatchPass {
            players,
            mode,
            spread,
        } => {
            let mode = parse_mode(&mode)?;
            run_match_pass(players, mode, spread).await?;
        }
        Commands::Lifecycle {
            players,
            mode,
            rounds,
        } => {
            let mode = parse_mode(&mode)?;
            run_lifecycle(players, mode, rounds).await?;
        }
        Commands::Soak { players, duration } => {
            run_soak(players, duration).await?;
        }
    }

    Ok(())
}
