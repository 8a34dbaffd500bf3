//! Turn Engine
//!
//! The game → round → turn lifecycle as a plain synchronous state machine.
//!
//! ```text
//! Uninitialized ──advance──► RoundActive ──round over──► RoundEnded
//!                                 ▲                          │
//!                                 └────────advance───────────┘
//!        any state ──game over / last round ended──► GameOver
//! ```
//!
//! The engine owns no timer and takes no locks; `network::session` wraps it
//! in the critical section shared by the explicit-advance and deadline paths.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::core::geometry::normalize_degrees;
use crate::core::rng::DeterministicRng;
use crate::game::bot::{BotId, BotSnapshot};
use crate::game::events::TurnEvent;
use crate::game::intent::IntentMap;
use crate::game::placement::Placer;
use crate::game::resolve::{ResolveContext, ResolveError, TurnResolver};
use crate::game::setup::{Arena, ConfigurationError, Setup};
use crate::game::state::{GameState, Turn, TurnKey};

/// Lifecycle phase of a game.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnginePhase {
    /// Constructed, no round started yet.
    Uninitialized,
    /// A round is being played.
    RoundActive,
    /// The last round ended; the next advance starts a new one.
    RoundEnded,
    /// Terminal. No further turns are produced.
    GameOver,
}

/// Engine errors.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The resolver failed or returned an unusable turn.
    #[error("Resolution of turn {key:?} failed: {source}")]
    Resolution {
        /// Turn being resolved
        key: TurnKey,
        /// Underlying error
        #[source]
        source: ResolveError,
    },

    /// Round initialization could not seat the participants.
    #[error("Placement failed: {0}")]
    Placement(#[from] ConfigurationError),
}

/// Synchronous turn/round/game state machine.
pub struct TurnEngine {
    setup: Setup,
    arena: Arena,
    resolver: Box<dyn TurnResolver>,
    rng: DeterministicRng,
    phase: EnginePhase,
    round_number: u32,
    turn_number: u32,
    /// Reference state for the next resolution (turn 0 right after placement)
    previous: Arc<Turn>,
    state: Arc<GameState>,
    idle_turns: BTreeMap<BotId, u32>,
}

impl std::fmt::Debug for TurnEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnEngine")
            .field("phase", &self.phase)
            .field("round_number", &self.round_number)
            .field("turn_number", &self.turn_number)
            .field("turns", &self.state.turn_count())
            .finish_non_exhaustive()
    }
}

impl TurnEngine {
    /// Create an engine for a validated setup.
    ///
    /// Fails if the setup is inconsistent, including an arena with fewer
    /// placement cells than participants.
    pub fn new(
        setup: Setup,
        resolver: impl TurnResolver + 'static,
        rng: DeterministicRng,
    ) -> Result<Self, ConfigurationError> {
        setup.validate()?;
        let arena = setup.arena();

        Ok(Self {
            setup,
            arena,
            resolver: Box::new(resolver),
            rng,
            phase: EnginePhase::Uninitialized,
            round_number: 0,
            turn_number: 0,
            previous: Arc::new(Turn::initial(Vec::new())),
            state: Arc::new(GameState::new(arena)),
            idle_turns: BTreeMap::new(),
        })
    }

    /// Current phase.
    #[inline]
    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// Check whether the game is over.
    #[inline]
    pub fn is_over(&self) -> bool {
        self.phase == EnginePhase::GameOver
    }

    /// The setup the engine was built with.
    pub fn setup(&self) -> &Setup {
        &self.setup
    }

    /// Arena bounds.
    pub fn arena(&self) -> Arena {
        self.arena
    }

    /// History so far.
    pub fn state(&self) -> Arc<GameState> {
        Arc::clone(&self.state)
    }

    /// Key the next `advance` will produce, or `None` once the game is over.
    pub fn open_turn(&self) -> Option<TurnKey> {
        match self.phase {
            EnginePhase::GameOver => None,
            EnginePhase::Uninitialized | EnginePhase::RoundEnded => {
                Some(TurnKey::new(self.round_number + 1, 1))
            }
            EnginePhase::RoundActive => Some(TurnKey::new(self.round_number, self.turn_number + 1)),
        }
    }

    /// Close the open turn with `intents` and return the new history.
    ///
    /// Starts a round first if none is active. After game over this is a
    /// no-op returning the last state. On failure nothing is appended and
    /// the engine is over.
    pub fn advance(&mut self, intents: &IntentMap) -> Result<Arc<GameState>, GameError> {
        if self.is_over() {
            debug!("advance after game over ignored");
            return Ok(self.state());
        }

        if matches!(self.phase, EnginePhase::Uninitialized | EnginePhase::RoundEnded) {
            if let Err(e) = self.start_round() {
                error!(round = self.round_number, error = %e, "Round initialization failed");
                self.phase = EnginePhase::GameOver;
                return Err(e);
            }
        }

        self.turn_number += 1;
        let key = TurnKey::new(self.round_number, self.turn_number);
        self.track_idle(intents);

        let (turn, round_over, game_over) = match self.resolve(key, intents) {
            Ok(resolved) => resolved,
            Err(source) => {
                error!(round = key.round, turn = key.turn, error = %source, "Turn resolution failed");
                self.phase = EnginePhase::GameOver;
                return Err(GameError::Resolution { key, source });
            }
        };

        let alive = turn.alive_count();

        #[cfg(feature = "debug-tracing")]
        for bot in turn.bots() {
            tracing::trace!(
                bot = %bot.id,
                energy = bot.energy,
                x = bot.position.x,
                y = bot.position.y,
                direction = bot.direction,
                "bot state"
            );
        }

        let turn = Arc::new(turn);
        self.state = Arc::new(self.state.with_turn(self.round_number, Arc::clone(&turn)));
        self.previous = turn;

        debug!(round = key.round, turn = key.turn, alive, "Turn closed");

        if round_over {
            info!(round = key.round, turns = key.turn, "Round over");
            self.phase = EnginePhase::RoundEnded;
        }

        if game_over || (round_over && self.round_number >= self.setup.number_of_rounds) {
            self.game_over();
        }

        Ok(self.state())
    }

    /// Enter `GameOver`. Returns `false` if the game was already over.
    pub fn game_over(&mut self) -> bool {
        if self.is_over() {
            return false;
        }

        self.phase = EnginePhase::GameOver;
        info!(
            rounds = self.state.round_count(),
            turns = self.state.turn_count(),
            "Game over"
        );
        true
    }

    /// Run the resolver and seal its output into a turn.
    fn resolve(&mut self, key: TurnKey, intents: &IntentMap) -> Result<(Turn, bool, bool), ResolveError> {
        let ctx = ResolveContext {
            key,
            previous: &self.previous,
            intents,
            arena: self.arena,
            idle_turns: &self.idle_turns,
            inactivity_limit: self.setup.inactivity_turns,
            number_of_rounds: self.setup.number_of_rounds,
        };

        let resolution = self.resolver.resolve(&ctx)?;
        let bots = self.checked_bots(resolution.bots)?;

        let mut events = Vec::with_capacity(resolution.events.len() + 1);
        if key.turn == 1 {
            events.push(TurnEvent::round_started(key.turn, key.round, self.setup.participants.clone()));
        }
        events.extend(resolution.events);

        let bots = bots.into_iter().filter(BotSnapshot::is_alive);
        let turn = Turn::new(key.turn, bots, events);

        Ok((turn, resolution.round_over, resolution.game_over))
    }

    /// Check resolver output against the previous turn and the arena.
    ///
    /// Every bot of the previous turn must be reported exactly once and no
    /// other bot may appear; dead bots report zero energy rather than going
    /// missing. Positions must lie in the arena and every number must be
    /// finite. Headings are normalized into [0, 360).
    fn checked_bots(&self, bots: Vec<BotSnapshot>) -> Result<Vec<BotSnapshot>, ResolveError> {
        let mut seen = BTreeSet::new();
        let mut checked = Vec::with_capacity(bots.len());

        for mut bot in bots {
            let id = bot.id;

            if self.previous.bot(id).is_none() {
                let message = if self.setup.participants.contains(&id) {
                    "resolver brought back a bot that already left the round"
                } else {
                    "resolver produced a bot that is not a participant"
                };
                return Err(ResolveError::for_bot(id, message));
            }
            if !seen.insert(id) {
                return Err(ResolveError::for_bot(id, "resolver produced a bot twice"));
            }
            if !self.arena.contains(bot.position) {
                return Err(ResolveError::for_bot(
                    id,
                    format!("position {:?} is outside the arena", bot.position),
                ));
            }
            if !bot.energy.is_finite() || !bot.speed.is_finite() || !bot.scan_arc.radius.is_finite() {
                return Err(ResolveError::for_bot(id, "energy, speed or scan radius is not finite"));
            }

            for angle in [
                &mut bot.direction,
                &mut bot.turret_direction,
                &mut bot.radar_direction,
                &mut bot.scan_arc.start_angle,
            ] {
                if !angle.is_finite() {
                    return Err(ResolveError::for_bot(id, "heading is not finite"));
                }
                *angle = normalize_degrees(*angle);
            }

            checked.push(bot);
        }

        if let Some(missing) = self.previous.bots().iter().find(|b| !seen.contains(&b.id)) {
            return Err(ResolveError::for_bot(missing.id, "resolver dropped a bot that is still in the round"));
        }

        Ok(checked)
    }

    /// Begin the next round: new counters, fresh placement.
    fn start_round(&mut self) -> Result<(), GameError> {
        self.round_number += 1;
        self.turn_number = 0;

        let bots = self.initial_bots()?;
        self.previous = Arc::new(Turn::initial(bots));
        self.idle_turns = self.setup.participants.iter().map(|&id| (id, 0)).collect();
        self.phase = EnginePhase::RoundActive;

        info!(
            round = self.round_number,
            of = self.setup.number_of_rounds,
            bots = self.setup.participants.len(),
            "Round started"
        );
        Ok(())
    }

    /// Seat every participant and draw its headings.
    ///
    /// Draw order per bot is position, body, turret, radar.
    fn initial_bots(&mut self) -> Result<Vec<BotSnapshot>, ConfigurationError> {
        let participants = &self.setup.participants;
        let mut placer = Placer::new(self.arena, participants.len())?;
        let mut bots = Vec::with_capacity(participants.len());

        for &id in participants {
            let position = placer.next_position(&mut self.rng).ok_or(ConfigurationError::ArenaTooSmall {
                width: self.arena.width(),
                height: self.arena.height(),
                capacity: self.arena.cell_capacity(),
                participants: participants.len(),
            })?;
            let direction = self.rng.random_direction();
            let turret = self.rng.random_direction();
            let radar = self.rng.random_direction();

            bots.push(BotSnapshot::spawn(id, position, direction, turret, radar));
        }

        Ok(bots)
    }

    /// Count consecutive turns without an intent, per participant.
    fn track_idle(&mut self, intents: &IntentMap) {
        for (id, idle) in self.idle_turns.iter_mut() {
            if intents.contains_key(id) {
                *idle = 0;
            } else {
                *idle = idle.saturating_add(1);
            }
        }
    }
}
