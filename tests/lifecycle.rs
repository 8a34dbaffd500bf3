//! End-to-end lifecycle through the public API.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use tank_arena::core::rng::DeterministicRng;
use tank_arena::game::bot::BotId;
use tank_arena::game::intent::{Intent, IntentMap, IntentOutcome};
use tank_arena::game::resolve::HoldResolver;
use tank_arena::game::state::{GameState, TurnKey};
use tank_arena::network::{GameSession, SessionEvent};
use tank_arena::{ConfigurationError, EnginePhase, SessionError, Setup, TurnEngine};

fn bots(n: u32) -> Vec<BotId> {
    (1..=n).map(BotId).collect()
}

/// `next` keeps every round and turn of `previous` and adds exactly one turn.
fn assert_strict_extension(previous: &GameState, next: &GameState) {
    assert_eq!(next.turn_count(), previous.turn_count() + 1);
    assert!(next.round_count() == previous.round_count() || next.round_count() == previous.round_count() + 1);

    for (index, old_round) in previous.rounds().enumerate() {
        let new_round = next.round_at(index).expect("round kept");
        assert_eq!(old_round.number(), new_round.number());
        for (t, old_turn) in old_round.turns().enumerate() {
            assert_eq!(old_turn, new_round.turn_at(t).expect("turn kept").as_ref());
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_full_game_across_rounds() {
    let setup = Setup::new("classic", 400, 300, bots(3))
        .with_rounds(3)
        .with_turn_timeout(Duration::from_millis(50));
    let session = GameSession::with_seed(setup, HoldResolver::with_turn_limit(4), 11).unwrap();
    let mut events = session.subscribe();

    for bot in bots(3) {
        session.mark_ready(bot).await.unwrap();
    }
    let mut previous = session.start().await.unwrap();

    while let Some(key) = session.open_turn().await {
        for bot in bots(3) {
            assert_eq!(
                session.submit_intent(bot, key, Intent::with_speed(2.0)).await,
                IntentOutcome::Accepted
            );
        }
        let next = session.close_turn(key, IntentMap::new()).await.unwrap().unwrap();
        assert_strict_extension(&previous, &next);
        assert_eq!(next.latest_key(), Some(key));
        previous = next;
    }

    assert_eq!(session.phase().await, EnginePhase::GameOver);
    assert_eq!(previous.round_count(), 3);
    for round in previous.rounds() {
        let numbers: Vec<u32> = round.turns().map(|t| t.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    let mut game_over = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SessionEvent::GameOver { .. }) {
            game_over += 1;
        }
    }
    assert_eq!(game_over, 1);

    let summary = session.summary().await;
    assert!(summary.finished);
    assert_eq!(summary.turns_played, 12);
}

#[tokio::test(start_paused = true)]
async fn test_silent_bots_never_stall_a_round() {
    let setup = Setup::new("classic", 800, 600, bots(2))
        .with_rounds(1)
        .with_turn_timeout(Duration::from_millis(100));
    let session = GameSession::with_seed(setup, HoldResolver::with_turn_limit(5), 2).unwrap();

    session.advance(IntentMap::new()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    let state = session.state().await;
    assert_eq!(state.turn_count(), 5);
    assert!(session.is_over().await);
    assert!(!session.deadline_armed().await);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_triggers_close_each_turn_once() {
    let setup = Setup::new("classic", 800, 600, bots(2)).with_turn_timeout(Duration::from_millis(10));
    let session = GameSession::with_seed(setup, HoldResolver::default(), 9).unwrap();
    session.advance(IntentMap::new()).await.unwrap();

    let mut closers = Vec::new();
    for _ in 0..4 {
        let session = session.clone();
        closers.push(tokio::spawn(async move {
            let mut closed = 0;
            for _ in 0..20 {
                if let Some(key) = session.open_turn().await {
                    if session.close_turn(key, IntentMap::new()).await.unwrap().is_some() {
                        closed += 1;
                    }
                }
                tokio::time::sleep(Duration::from_millis(7)).await;
            }
            closed
        }));
    }

    let mut explicit = 0;
    for closer in closers {
        explicit += closer.await.unwrap();
    }

    session.game_over().await;
    let state = session.state().await;

    // Turn numbers have no gaps or repeats, whoever closed them
    let numbers: Vec<u32> = state.current_round().unwrap().turns().map(|t| t.number()).collect();
    let expected: Vec<u32> = (1..=numbers.len() as u32).collect();
    assert_eq!(numbers, expected);
    assert!(state.turn_count() > explicit);
}

#[tokio::test(start_paused = true)]
async fn test_session_history_matches_bare_engine() {
    let setup = Setup::new("classic", 600, 600, bots(5)).with_rounds(2);
    let session = GameSession::from_parts(
        [7; 16],
        setup.clone(),
        HoldResolver::with_turn_limit(3),
        DeterministicRng::new(1234),
        None,
    )
    .unwrap();

    let mut engine = TurnEngine::new(setup, HoldResolver::with_turn_limit(3), DeterministicRng::new(1234)).unwrap();

    let mut from_session: Arc<GameState> = session.state().await;
    while !session.is_over().await {
        from_session = session.advance(IntentMap::new()).await.unwrap();
        engine.advance(&IntentMap::new()).unwrap();
    }

    assert_eq!(from_session.state_hash(), engine.state().state_hash());
    assert_eq!(*from_session, *engine.state());
}

#[test]
fn test_lone_bot_rounds_last_one_turn() {
    let setup = Setup::new("classic", 500, 500, bots(1)).with_rounds(3);
    let mut engine = TurnEngine::new(setup, HoldResolver::with_turn_limit(4), DeterministicRng::new(0)).unwrap();

    while !engine.is_over() {
        engine.advance(&IntentMap::new()).unwrap();
    }

    let state = engine.state();
    assert_eq!(state.round_count(), 3);
    for round in state.rounds() {
        assert_eq!(round.turn_count(), 1);
    }
}

#[tokio::test]
async fn test_crowded_arena_never_starts() {
    let setup = Setup::new("classic", 50, 50, bots(3));
    let result = GameSession::new(setup, HoldResolver::default());
    assert!(matches!(
        result,
        Err(SessionError::Configuration(ConfigurationError::ArenaTooSmall { .. }))
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_history_only_grows(
        seed in any::<u64>(),
        bot_count in 1u32..6,
        turn_limit in 1u32..5,
        rounds in 1u32..4,
        advances in 1usize..30,
    ) {
        let setup = Setup::new("classic", 500, 500, bots(bot_count)).with_rounds(rounds);
        let mut engine = TurnEngine::new(
            setup,
            HoldResolver::with_turn_limit(turn_limit),
            DeterministicRng::new(seed),
        )
        .unwrap();

        let mut previous = engine.state();
        for _ in 0..advances {
            let open = engine.open_turn();
            let next = engine.advance(&IntentMap::new()).unwrap();

            match open {
                Some(key) => {
                    assert_strict_extension(&previous, &next);
                    prop_assert_eq!(next.latest_key(), Some(key));
                }
                None => prop_assert!(Arc::ptr_eq(&previous, &next)),
            }
            previous = next;
        }

        // A lone bot is already the last one standing, so its rounds last one turn
        let turns_per_round = if bot_count == 1 { 1 } else { turn_limit };
        let max_turns = (turns_per_round * rounds) as usize;
        prop_assert_eq!(previous.turn_count(), advances.min(max_turns));
    }

    #[test]
    fn prop_turn_keys_are_monotonic(seed in any::<u64>(), advances in 1usize..40) {
        let setup = Setup::new("classic", 300, 300, bots(4)).with_rounds(5);
        let mut engine = TurnEngine::new(setup, HoldResolver::with_turn_limit(6), DeterministicRng::new(seed)).unwrap();

        let mut last: Option<TurnKey> = None;
        for _ in 0..advances {
            let state = engine.advance(&IntentMap::new()).unwrap();
            let key = state.latest_key();
            prop_assert!(key > last);
            last = key;
            if engine.is_over() {
                break;
            }
        }
    }
}
