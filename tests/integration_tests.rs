//! Integration tests for the grid-arena matchmaking service
//!
//! These tests validate the entire system working together, including:
//! - Complete match lifecycle workflows in both modes
//! - Rating-adjacent pairing and queue semantics
//! - Deadline enforcement and stale-queue cleanup
//! - Presence tracking alongside running matches
//! - Concurrent queue handling

// Modules for organizing tests
mod fixtures;

use chrono::{Duration as ChronoDuration, Utc};
use fixtures::{result_with_score, ArenaTestSystem};
use futures::future::join_all;
use grid_arena::config::{MatchSettings, SchedulerSettings};
use grid_arena::error::MatchmakingError;
use grid_arena::store::{MatchStore, QueueStore, StatsStore};
use grid_arena::types::{
    MatchStatus, MoveSubmission, PresenceStatus, PvpMode, QueueEntry, QueueStatus,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio_stream::StreamExt;

fn move_sub(player_id: &str, move_number: u32) -> MoveSubmission {
    MoveSubmission {
        player_id: player_id.to_string(),
        row: 4,
        col: 4,
        value: 5,
        is_correct: true,
        move_number,
    }
}

#[tokio::test]
async fn test_complete_blind_race_lifecycle() {
    let system = ArenaTestSystem::new();

    // Step 1: both players queue
    system.join("alice", PvpMode::BlindRace).await;
    system.join("bob", PvpMode::BlindRace).await;

    // Step 2: the matching pass pairs them
    let summary = system.engine.run_pass().await.unwrap();
    assert_eq!(summary.matches_created, 1);
    assert_eq!(summary.players_matched, 2);

    let match_id = system
        .assigned_match("alice", PvpMode::BlindRace)
        .await
        .unwrap();
    assert_eq!(
        system.assigned_match("bob", PvpMode::BlindRace).await,
        Some(match_id.clone())
    );

    let entry = system
        .store
        .get_entry("alice", PvpMode::BlindRace)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.status, QueueStatus::Matched);

    // Step 3: the match starts; blind races carry no deadline
    let started = system.manager.start_match(&match_id).await.unwrap();
    assert_eq!(started.status, MatchStatus::InProgress);
    assert!(started.deadline_at.is_none());

    // Blind races do not relay moves
    let err = system
        .manager
        .submit_move(&match_id, move_sub("alice", 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MatchmakingError>().unwrap(),
        MatchmakingError::InvalidTransition { .. }
    ));

    // Step 4: results complete the match
    let now = Utc::now();
    system
        .manager
        .submit_player_result(&match_id, "alice", result_with_score(2500, now))
        .await
        .unwrap();
    let after_first = system.manager.get_match(&match_id).await.unwrap().unwrap();
    assert_eq!(after_first.status, MatchStatus::InProgress);

    let finished = system
        .manager
        .submit_player_result(&match_id, "bob", result_with_score(1800, now))
        .await
        .unwrap();
    assert_eq!(finished.status, MatchStatus::Completed);
    assert_eq!(finished.winner_id.as_deref(), Some("alice"));

    // Step 5: ratings settled exactly once
    let alice = system.store.get_stats("alice").await.unwrap().unwrap();
    let bob = system.store.get_stats("bob").await.unwrap().unwrap();
    assert_eq!(alice.blind_race.rating, 1016);
    assert_eq!(alice.blind_race.wins, 1);
    assert_eq!(bob.blind_race.rating, 984);
    assert_eq!(bob.blind_race.losses, 1);
    assert_eq!(system.aggregator.get_stats().unwrap().matches_applied, 1);

    println!("✅ Complete blind race lifecycle test passed");
}

#[tokio::test]
async fn test_live_battle_move_relay() {
    let system = ArenaTestSystem::new();

    system.join("alice", PvpMode::LiveBattle).await;
    system.join("bob", PvpMode::LiveBattle).await;
    system.engine.run_pass().await.unwrap();

    let match_id = system
        .assigned_match("alice", PvpMode::LiveBattle)
        .await
        .unwrap();
    let started = system.manager.start_match(&match_id).await.unwrap();

    // Live battles get the configured completion deadline
    let deadline = started.deadline_at.unwrap();
    assert_eq!(
        deadline - started.started_at.unwrap(),
        ChronoDuration::seconds(600)
    );

    // Subscribe before any move lands
    let (snapshot, mut updates) = system.manager.observe_moves(&match_id).await.unwrap();
    assert!(snapshot.is_empty());

    system
        .manager
        .submit_move(&match_id, move_sub("alice", 1))
        .await
        .unwrap();
    system
        .manager
        .submit_move(&match_id, move_sub("alice", 2))
        .await
        .unwrap();
    // Opponent numbering is independent
    system
        .manager
        .submit_move(&match_id, move_sub("bob", 1))
        .await
        .unwrap();

    for expected in [("alice", 1), ("alice", 2), ("bob", 1)] {
        let received = tokio::time::timeout(Duration::from_secs(1), updates.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.player_id, expected.0);
        assert_eq!(received.move_number, expected.1);
    }

    // A gap in the per-player sequence is rejected
    let err = system
        .manager
        .submit_move(&match_id, move_sub("alice", 4))
        .await
        .unwrap_err();
    match err.downcast_ref::<MatchmakingError>() {
        Some(MatchmakingError::SequenceError { expected, got, .. }) => {
            assert_eq!(*expected, 3);
            assert_eq!(*got, 4);
        }
        other => panic!("expected SequenceError, got {:?}", other),
    }

    let (log, _) = system.manager.observe_moves(&match_id).await.unwrap();
    assert_eq!(log.len(), 3);

    println!("✅ Live battle move relay test passed");
}

#[tokio::test]
async fn test_rating_adjacent_pairing() {
    let system = ArenaTestSystem::new();

    system.seed_rating("carol", PvpMode::LiveBattle, 800).await;
    system.seed_rating("alice", PvpMode::LiveBattle, 1000).await;
    system.seed_rating("dave", PvpMode::LiveBattle, 1200).await;
    system.seed_rating("bob", PvpMode::LiveBattle, 2000).await;

    for user in ["alice", "bob", "carol", "dave"] {
        system.join(user, PvpMode::LiveBattle).await;
    }

    let summary = system.engine.run_pass().await.unwrap();
    assert_eq!(summary.matches_created, 2);
    assert_eq!(summary.left_waiting, 0);

    // Sorted by rating: carol(800)-alice(1000), dave(1200)-bob(2000)
    let carol_match = system.assigned_match("carol", PvpMode::LiveBattle).await;
    let alice_match = system.assigned_match("alice", PvpMode::LiveBattle).await;
    let dave_match = system.assigned_match("dave", PvpMode::LiveBattle).await;
    let bob_match = system.assigned_match("bob", PvpMode::LiveBattle).await;

    assert_eq!(carol_match, alice_match);
    assert_eq!(dave_match, bob_match);
    assert_ne!(carol_match, dave_match);

    println!("✅ Rating adjacent pairing test passed");
}

#[tokio::test]
async fn test_odd_player_out_waits() {
    let system = ArenaTestSystem::new();

    system.seed_rating("low", PvpMode::BlindRace, 900).await;
    system.seed_rating("mid", PvpMode::BlindRace, 1000).await;
    system.seed_rating("high", PvpMode::BlindRace, 1100).await;
    for user in ["low", "mid", "high"] {
        system.join(user, PvpMode::BlindRace).await;
    }

    let summary = system.engine.run_pass().await.unwrap();
    assert_eq!(summary.matches_created, 1);
    assert_eq!(summary.left_waiting, 1);

    // The highest-rated player is the one left over
    assert!(system
        .assigned_match("low", PvpMode::BlindRace)
        .await
        .is_some());
    assert!(system
        .assigned_match("mid", PvpMode::BlindRace)
        .await
        .is_some());
    assert!(system
        .assigned_match("high", PvpMode::BlindRace)
        .await
        .is_none());

    let waiting = system.store.waiting_entries(PvpMode::BlindRace).await.unwrap();
    assert_eq!(waiting.len(), 1);
    assert_eq!(waiting[0].user_id, "high");

    // A lone player keeps waiting across passes until company arrives
    let summary = system.engine.run_pass().await.unwrap();
    assert_eq!(summary.matches_created, 0);

    system.join("late", PvpMode::BlindRace).await;
    let summary = system.engine.run_pass().await.unwrap();
    assert_eq!(summary.matches_created, 1);
    assert!(system
        .assigned_match("high", PvpMode::BlindRace)
        .await
        .is_some());

    println!("✅ Odd player out test passed");
}

#[tokio::test]
async fn test_modes_never_mix() {
    let system = ArenaTestSystem::new();

    system.join("alice", PvpMode::BlindRace).await;
    system.join("bob", PvpMode::LiveBattle).await;

    let summary = system.engine.run_pass().await.unwrap();
    assert_eq!(summary.matches_created, 0);
    assert_eq!(summary.left_waiting, 2);

    // The same player can wait in both modes under separate entries
    system.join("alice", PvpMode::LiveBattle).await;
    let summary = system.engine.run_pass().await.unwrap();
    assert_eq!(summary.matches_created, 1);

    assert!(system
        .assigned_match("alice", PvpMode::LiveBattle)
        .await
        .is_some());
    let blind_entry = system
        .store
        .get_entry("alice", PvpMode::BlindRace)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(blind_entry.status, QueueStatus::Waiting);

    println!("✅ Mode isolation test passed");
}

#[tokio::test]
async fn test_forfeit_cancels_without_stats_and_allows_requeue() {
    let system = ArenaTestSystem::new();

    system.join("alice", PvpMode::LiveBattle).await;
    system.join("bob", PvpMode::LiveBattle).await;
    system.engine.run_pass().await.unwrap();
    let match_id = system
        .assigned_match("alice", PvpMode::LiveBattle)
        .await
        .unwrap();
    system.manager.start_match(&match_id).await.unwrap();

    // Bob forfeits
    let cancelled = system
        .manager
        .cancel_match(&match_id, Some("bob"))
        .await
        .unwrap();
    assert_eq!(cancelled.status, MatchStatus::Cancelled);
    assert_eq!(cancelled.winner_id.as_deref(), Some("alice"));

    // Cancelled matches never reach the aggregator
    assert!(system.store.get_stats("alice").await.unwrap().is_none());
    assert_eq!(system.aggregator.get_stats().unwrap().matches_applied, 0);

    // And cannot be completed afterwards
    let err = system
        .manager
        .end_match(&match_id, Some("alice"))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MatchmakingError>().unwrap(),
        MatchmakingError::InvalidTransition { .. }
    ));

    // Both players can queue again and get a fresh match
    system.join("alice", PvpMode::LiveBattle).await;
    system.join("bob", PvpMode::LiveBattle).await;
    let summary = system.engine.run_pass().await.unwrap();
    assert_eq!(summary.matches_created, 1);
    let rematch_id = system
        .assigned_match("alice", PvpMode::LiveBattle)
        .await
        .unwrap();
    assert_ne!(rematch_id, match_id);

    println!("✅ Forfeit cancellation test passed");
}

#[tokio::test]
async fn test_deadline_sweep_ends_overdue_live_battles() {
    let system = ArenaTestSystem::with_settings(
        MatchSettings {
            live_battle_duration_seconds: 0,
        },
        SchedulerSettings::default(),
    );

    system.join("alice", PvpMode::LiveBattle).await;
    system.join("bob", PvpMode::LiveBattle).await;
    system.engine.run_pass().await.unwrap();
    let match_id = system
        .assigned_match("alice", PvpMode::LiveBattle)
        .await
        .unwrap();
    system.manager.start_match(&match_id).await.unwrap();

    // Only one player files a result before time runs out
    system
        .manager
        .submit_player_result(&match_id, "alice", result_with_score(2100, Utc::now()))
        .await
        .unwrap();

    let ended = system
        .manager
        .force_end_overdue(Utc::now() + ChronoDuration::seconds(1))
        .await
        .unwrap();
    assert_eq!(ended, 1);

    let record = system.manager.get_match(&match_id).await.unwrap().unwrap();
    assert_eq!(record.status, MatchStatus::Completed);
    assert_eq!(record.winner_id.as_deref(), Some("alice"));
    assert!(record.stats_applied);

    let alice = system.store.get_stats("alice").await.unwrap().unwrap();
    assert_eq!(alice.live_battle.wins, 1);

    // A second sweep finds nothing left to end
    let ended = system
        .manager
        .force_end_overdue(Utc::now() + ChronoDuration::seconds(2))
        .await
        .unwrap();
    assert_eq!(ended, 0);

    println!("✅ Deadline sweep test passed");
}

#[tokio::test]
async fn test_stale_queue_cleanup_boundary() {
    let system = ArenaTestSystem::new();

    let stale = QueueEntry::waiting(
        "sleeper",
        "Sleeper",
        PvpMode::BlindRace,
        1000,
        Utc::now() - ChronoDuration::minutes(31),
    );
    system.store.upsert_entry(stale).await.unwrap();
    system.join("fresh", PvpMode::BlindRace).await;

    let cleaned = system
        .manager
        .cleanup_stale_queue_entries(Utc::now() - ChronoDuration::minutes(30))
        .await
        .unwrap();
    assert_eq!(cleaned, 1);

    assert!(system
        .store
        .get_entry("sleeper", PvpMode::BlindRace)
        .await
        .unwrap()
        .is_none());
    assert!(system
        .store
        .get_entry("fresh", PvpMode::BlindRace)
        .await
        .unwrap()
        .is_some());

    println!("✅ Stale queue cleanup test passed");
}

#[tokio::test]
async fn test_presence_runs_alongside_match_without_touching_it() {
    let system = ArenaTestSystem::new();

    system.join("alice", PvpMode::LiveBattle).await;
    system.join("bob", PvpMode::LiveBattle).await;
    system.engine.run_pass().await.unwrap();
    let match_id = system
        .assigned_match("alice", PvpMode::LiveBattle)
        .await
        .unwrap();
    system.manager.start_match(&match_id).await.unwrap();

    system.tracker.start_presence(&match_id, "alice").await.unwrap();
    system.tracker.start_presence(&match_id, "bob").await.unwrap();

    let (snapshot, mut updates) = system
        .tracker
        .observe_opponent(&match_id, "alice")
        .await
        .unwrap();
    let opponent = snapshot.unwrap();
    assert_eq!(opponent.user_id, "bob");
    assert_eq!(opponent.status, PresenceStatus::Online);
    assert!(opponent.is_live);

    // Bob drops; alice sees it on the live feed
    system.tracker.stop_presence(&match_id, "bob").await.unwrap();
    let event = tokio::time::timeout(Duration::from_secs(1), updates.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.user_id, "bob");
    assert_eq!(event.status, PresenceStatus::Offline);
    assert!(!event.is_live);

    // The sweep flips alice's stale record and leaves the match alone
    let expired = system
        .tracker
        .sweep_stale(Utc::now() + ChronoDuration::seconds(60))
        .await
        .unwrap();
    assert_eq!(expired, 1);

    let record = system.manager.get_match(&match_id).await.unwrap().unwrap();
    assert_eq!(record.status, MatchStatus::InProgress);
    assert!(record.winner_id.is_none());

    println!("✅ Presence isolation test passed");
}

#[tokio::test]
async fn test_concurrent_joins_pair_everyone_once() {
    let system = ArenaTestSystem::new();

    let joins = (0..20).map(|i| {
        let manager = system.manager.clone();
        async move {
            let user_id = format!("player_{:02}", i);
            manager
                .join_matchmaking(&user_id, &user_id, PvpMode::BlindRace)
                .await
                .unwrap();
        }
    });
    join_all(joins).await;

    let summary = system.engine.run_pass().await.unwrap();
    assert_eq!(summary.examined, 20);
    assert_eq!(summary.matches_created, 10);
    assert_eq!(summary.players_matched, 20);
    assert_eq!(summary.left_waiting, 0);

    // Every match id is assigned to exactly two players
    let mut seats: HashMap<String, usize> = HashMap::new();
    for i in 0..20 {
        let user_id = format!("player_{:02}", i);
        let match_id = system
            .assigned_match(&user_id, PvpMode::BlindRace)
            .await
            .expect("every player should be seated");
        *seats.entry(match_id).or_default() += 1;
    }
    assert_eq!(seats.len(), 10);
    assert!(seats.values().all(|&count| count == 2));

    assert_eq!(system.store.count_active_matches().await.unwrap(), 10);

    println!("✅ Concurrent joins test passed");
}

#[tokio::test]
async fn test_puzzle_failure_only_loses_one_pair() {
    let system = ArenaTestSystem::new();

    system.seed_rating("ann", PvpMode::BlindRace, 900).await;
    system.seed_rating("ben", PvpMode::BlindRace, 950).await;
    system.seed_rating("cho", PvpMode::BlindRace, 1100).await;
    system.seed_rating("dee", PvpMode::BlindRace, 1150).await;
    for user in ["ann", "ben", "cho", "dee"] {
        system.join(user, PvpMode::BlindRace).await;
    }

    // First pair processed is the lowest-rated; its puzzle fetch fails
    system.puzzles.fail_next_requests(1);

    let summary = system.engine.run_pass().await.unwrap();
    assert_eq!(summary.matches_created, 1);
    assert_eq!(summary.pair_failures, 1);

    assert!(system.assigned_match("ann", PvpMode::BlindRace).await.is_none());
    assert!(system.assigned_match("ben", PvpMode::BlindRace).await.is_none());
    assert!(system.assigned_match("cho", PvpMode::BlindRace).await.is_some());
    assert!(system.assigned_match("dee", PvpMode::BlindRace).await.is_some());

    // The failed pair is still waiting and pairs on the next pass
    let summary = system.engine.run_pass().await.unwrap();
    assert_eq!(summary.matches_created, 1);
    assert_eq!(summary.pair_failures, 0);
    assert_eq!(
        system.assigned_match("ann", PvpMode::BlindRace).await,
        system.assigned_match("ben", PvpMode::BlindRace).await
    );
    assert!(system.assigned_match("ann", PvpMode::BlindRace).await.is_some());

    println!("✅ Puzzle failure isolation test passed");
}
