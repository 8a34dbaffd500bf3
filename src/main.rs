//! Tank Arena Server
//!
//! Runs one game end to end through a `GameSession`, then replays it on a
//! bare `TurnEngine` to check that the history is reproducible.
//!
//! Usage: `tank-arena-server [setup.json]`. `TANK_ARENA_SEED` fixes the seed.

use anyhow::{bail, Context};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tank_arena::{
    VERSION,
    core::rng::{derive_game_seed, DeterministicRng},
    game::{
        bot::BotId,
        intent::{Intent, IntentMap},
        resolve::HoldResolver,
        setup::Setup,
        state::TurnKey,
    },
    network::{GameSession, SessionEvent},
    TurnEngine,
};

/// Turns per round in the demo.
const DEMO_ROUND_TURNS: u32 = 15;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Tank Arena Server v{}", VERSION);

    let setup = load_setup()?;
    info!(
        "Arena {}x{}, {} rounds, {} ms turns, {} bots",
        setup.arena_width,
        setup.arena_height,
        setup.number_of_rounds,
        setup.turn_timeout_ms,
        setup.participants.len()
    );

    demo_game(setup).await
}

/// Setup from the path in argv, or a small default game.
fn load_setup() -> anyhow::Result<Setup> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read setup file {}", path))?;
            Setup::from_json(&json).with_context(|| format!("Invalid setup in {}", path))
        }
        None => Ok(Setup::new("classic", 800, 600, (1..=4).map(BotId)).with_rounds(3)),
    }
}

/// Intents the demo bots send for `key`.
///
/// The last bot only speaks up every fifth turn; the other turns are closed
/// by the deadline.
fn demo_intents(key: TurnKey, participants: &[BotId]) -> IntentMap {
    let everyone = key.turn % 5 == 0;

    participants
        .iter()
        .enumerate()
        .filter(|(i, _)| everyone || i + 1 < participants.len())
        .map(|(i, &bot)| {
            let intent = Intent {
                turn_rate: Some(((key.turn as usize * (i + 1) * 7) % 20) as f64 - 10.0),
                ..Intent::with_speed(4.0)
            };
            (bot, intent)
        })
        .collect()
}

async fn demo_game(setup: Setup) -> anyhow::Result<()> {
    info!("=== Starting Demo Game ===");

    let game_id = uuid::Uuid::new_v4().into_bytes();
    let seed = match std::env::var("TANK_ARENA_SEED") {
        Ok(raw) => raw.parse::<u64>().context("TANK_ARENA_SEED must be an unsigned integer")?,
        Err(_) => derive_game_seed(&game_id, &setup.participants),
    };

    info!("Game ID: {}", uuid::Uuid::from_bytes(game_id));
    info!("RNG Seed: {}", seed);

    let participants = setup.participants.clone();
    let resolver = HoldResolver::with_turn_limit(DEMO_ROUND_TURNS);
    let session = GameSession::from_parts(
        game_id,
        setup.clone(),
        resolver,
        DeterministicRng::new(seed),
        None,
    )?;
    let mut events = session.subscribe();

    for &bot in &participants {
        session.mark_ready(bot).await?;
    }
    session.start().await?;

    let mut deadline_turns = 0;
    while let Some(key) = session.open_turn().await {
        let intents = demo_intents(key, &participants);
        for (&bot, &intent) in &intents {
            session.submit_intent(bot, key, intent).await;
        }

        if session.intents_complete().await {
            session.close_turn(key, IntentMap::new()).await?;
        } else {
            wait_for_close(&mut events, key).await?;
            deadline_turns += 1;
        }
    }

    // Print final results
    info!("=== Game Results ===");
    let summary = session.summary().await;
    info!(
        "{} rounds, {} turns ({} closed by deadline)",
        summary.rounds_played, summary.turns_played, deadline_turns
    );
    info!("Final State Hash: {}", summary.state_hash);
    info!("Summary: {}", serde_json::to_string(&summary)?);

    // Verify determinism by replaying
    info!("=== Verifying Determinism ===");
    let mut engine = TurnEngine::new(setup, resolver, DeterministicRng::new(seed))?;
    while let Some(key) = engine.open_turn() {
        // The first turn is closed by start() without intents
        let intents = if key == TurnKey::new(1, 1) {
            IntentMap::new()
        } else {
            demo_intents(key, &participants)
        };
        engine.advance(&intents)?;
    }

    let replay_hash = hex::encode(engine.state().state_hash());
    info!("Replay State Hash: {}", replay_hash);

    if replay_hash == summary.state_hash {
        info!("DETERMINISM VERIFIED: Hashes match!");
    } else {
        warn!("DETERMINISM FAILURE: Hashes differ!");
    }

    Ok(())
}

/// Wait until turn `key` has been closed.
async fn wait_for_close(
    events: &mut broadcast::Receiver<SessionEvent>,
    key: TurnKey,
) -> anyhow::Result<()> {
    loop {
        match events.recv().await {
            Ok(SessionEvent::TurnClosed { key: closed, .. }) if closed == key => return Ok(()),
            Ok(SessionEvent::GameOver { .. }) => return Ok(()),
            Ok(SessionEvent::GameFailed { key, error, .. }) => {
                bail!("Game failed at round {} turn {}: {}", key.round, key.turn, error)
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!("Event receiver lagged by {}", skipped),
            Err(RecvError::Closed) => bail!("Session event channel closed"),
        }
    }
}
