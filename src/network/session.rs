//! Game Session
//!
//! Runs one game on behalf of the (out of scope) server layer: collects
//! intents, owns the turn deadline and serializes every turn close.
//!
//! Two triggers close a turn: an explicit advance (typically "all intents
//! received") and the deadline timer. Both go through
//! `SessionInner::close` while holding the session lock, and the deadline
//! path first claims its timer generation. Whichever trigger gets the lock
//! first closes the turn; the other one finds the timer cancelled (deadline
//! path) or the open turn moved on (`close_turn`) and does nothing.

use std::collections::BTreeSet;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, error, info, instrument, warn};

use crate::core::rng::DeterministicRng;
use crate::game::bot::BotId;
use crate::game::engine::{EnginePhase, GameError, TurnEngine};
use crate::game::intent::{Intent, IntentBuffer, IntentMap, IntentOutcome};
use crate::game::resolve::TurnResolver;
use crate::game::setup::{ConfigurationError, Setup};
use crate::game::state::{GameState, TurnKey};
use crate::network::clock::DeadlineTimer;
use crate::network::notify::{DeadlineSink, SessionEvent};

/// Unique game identifier.
pub type GameId = [u8; 16];

/// Session errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Setup rejected.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The engine failed; the game is over.
    #[error(transparent)]
    Game(#[from] Arc<GameError>),

    /// Not every participant reported ready in time.
    #[error("Participants not ready before timeout: {missing:?}")]
    ReadyTimeout {
        /// Participants that never reported ready
        missing: Vec<BotId>,
    },

    /// Bot is not part of this game.
    #[error("Unknown participant {0}")]
    UnknownParticipant(BotId),

    /// The game has already started.
    #[error("Session is not waiting for participants")]
    NotReadyPhase,

    /// Sessions spawn their deadline onto the current tokio runtime.
    #[error("No tokio runtime available")]
    NoRuntime,
}

/// What closed a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CloseTrigger {
    Explicit,
    Deadline,
}

/// Post-game summary.
#[derive(Debug, Clone, Serialize)]
pub struct GameSummary {
    /// Game identifier (UUID)
    pub game_id: String,
    /// Game type from the setup
    pub game_type: String,
    /// When the session was created
    pub started_at: DateTime<Utc>,
    /// Rounds begun
    pub rounds_played: usize,
    /// Turns closed across all rounds
    pub turns_played: usize,
    /// Whether the game is over
    pub finished: bool,
    /// Hex state hash of the history
    pub state_hash: String,
}

struct SessionInner {
    engine: TurnEngine,
    timer: DeadlineTimer,
    intents: IntentBuffer,
}

struct Shared {
    id: GameId,
    setup: Setup,
    started_at: DateTime<Utc>,
    inner: Mutex<SessionInner>,
    events: broadcast::Sender<SessionEvent>,
    sink: Arc<dyn DeadlineSink>,
    ready: watch::Sender<BTreeSet<BotId>>,
}

/// A running game. Cheap to clone; clones share the same game.
#[derive(Clone)]
pub struct GameSession {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("id", &uuid::Uuid::from_bytes(self.shared.id))
            .field("game_type", &self.shared.setup.game_type)
            .finish_non_exhaustive()
    }
}

impl GameSession {
    /// Create a session with a fresh id, seeding randomness from the id and
    /// participants. Deadline notifications go to [`GameSession::subscribe`].
    pub fn new(setup: Setup, resolver: impl TurnResolver + 'static) -> Result<Self, SessionError> {
        let id = uuid::Uuid::new_v4().into_bytes();
        let rng = DeterministicRng::for_game(&id, &setup.participants);
        Self::from_parts(id, setup, resolver, rng, None)
    }

    /// Create a session with a fixed seed.
    pub fn with_seed(
        setup: Setup,
        resolver: impl TurnResolver + 'static,
        seed: u64,
    ) -> Result<Self, SessionError> {
        let id = uuid::Uuid::new_v4().into_bytes();
        Self::from_parts(id, setup, resolver, DeterministicRng::new(seed), None)
    }

    /// Create a session from explicit parts.
    ///
    /// `sink` defaults to the session's own event channel.
    pub fn from_parts(
        id: GameId,
        setup: Setup,
        resolver: impl TurnResolver + 'static,
        rng: DeterministicRng,
        sink: Option<Arc<dyn DeadlineSink>>,
    ) -> Result<Self, SessionError> {
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;
        let engine = TurnEngine::new(setup.clone(), resolver, rng)?;

        let (events, _) = broadcast::channel(256);
        let sink = sink.unwrap_or_else(|| Arc::new(events.clone()) as Arc<dyn DeadlineSink>);
        let (ready, _) = watch::channel(BTreeSet::new());

        info!(
            game = %uuid::Uuid::from_bytes(id),
            game_type = %setup.game_type,
            participants = setup.participants.len(),
            "Session created"
        );

        let inner = SessionInner {
            engine,
            timer: DeadlineTimer::new(runtime),
            intents: IntentBuffer::new(setup.participants.iter().copied()),
        };

        Ok(Self {
            shared: Arc::new(Shared {
                id,
                setup,
                started_at: Utc::now(),
                inner: Mutex::new(inner),
                events,
                sink,
                ready,
            }),
        })
    }

    /// Game identifier.
    pub fn id(&self) -> GameId {
        self.shared.id
    }

    /// The setup this game runs with.
    pub fn setup(&self) -> &Setup {
        &self.shared.setup
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// History so far.
    pub async fn state(&self) -> Arc<GameState> {
        self.shared.inner.lock().await.engine.state()
    }

    /// Lifecycle phase.
    pub async fn phase(&self) -> EnginePhase {
        self.shared.inner.lock().await.engine.phase()
    }

    /// Check whether the game is over.
    pub async fn is_over(&self) -> bool {
        self.shared.inner.lock().await.engine.is_over()
    }

    /// Key of the turn the next close will produce.
    pub async fn open_turn(&self) -> Option<TurnKey> {
        self.shared.inner.lock().await.engine.open_turn()
    }

    /// Check whether every participant has an intent buffered for the open turn.
    pub async fn intents_complete(&self) -> bool {
        self.shared.inner.lock().await.intents.is_complete()
    }

    /// Check whether a turn deadline is pending.
    pub async fn deadline_armed(&self) -> bool {
        self.shared.inner.lock().await.timer.is_armed()
    }

    /// Mark a participant as ready to start.
    pub async fn mark_ready(&self, bot: BotId) -> Result<(), SessionError> {
        if !self.shared.setup.participants.contains(&bot) {
            return Err(SessionError::UnknownParticipant(bot));
        }
        if self.phase().await != EnginePhase::Uninitialized {
            return Err(SessionError::NotReadyPhase);
        }

        self.shared.ready.send_modify(|ready| {
            ready.insert(bot);
        });
        debug!(%bot, "Participant ready");
        Ok(())
    }

    /// Wait for every participant to report ready, then close the first turn.
    ///
    /// If the ready timeout elapses first the game is over and the missing
    /// participants are reported.
    #[instrument(skip(self), fields(game = %uuid::Uuid::from_bytes(self.shared.id)))]
    pub async fn start(&self) -> Result<Arc<GameState>, SessionError> {
        if self.phase().await != EnginePhase::Uninitialized {
            return Err(SessionError::NotReadyPhase);
        }

        let participants = &self.shared.setup.participants;
        let mut ready = self.shared.ready.subscribe();

        let all_ready = tokio::time::timeout(
            self.shared.setup.ready_timeout(),
            ready.wait_for(|set| participants.iter().all(|id| set.contains(id))),
        )
        .await
        .map(|waited| waited.is_ok())
        .unwrap_or(false);

        if !all_ready {
            if self.phase().await != EnginePhase::Uninitialized {
                return Err(SessionError::NotReadyPhase);
            }

            let missing: Vec<BotId> = {
                let ready = self.shared.ready.borrow();
                participants.iter().filter(|id| !ready.contains(id)).copied().collect()
            };
            warn!(?missing, "Ready timeout elapsed; aborting game");
            self.game_over().await;
            return Err(SessionError::ReadyTimeout { missing });
        }

        info!("All participants ready");

        // Another start, or an explicit advance, may have closed turn 1 while we waited
        self.close_turn(TurnKey::new(1, 1), IntentMap::new())
            .await?
            .ok_or(SessionError::NotReadyPhase)
    }

    /// Submit an intent from `bot` for turn `target`.
    pub async fn submit_intent(&self, bot: BotId, target: TurnKey, intent: Intent) -> IntentOutcome {
        let mut inner = self.shared.inner.lock().await;

        match inner.engine.open_turn() {
            Some(open) => inner.intents.submit(bot, target, intent, open),
            None => {
                debug!(%bot, ?target, "Intent after game over discarded");
                IntentOutcome::Discarded
            }
        }
    }

    /// Close the open turn now.
    ///
    /// `intents` are laid over whatever was buffered for the turn. After
    /// game over this returns the final state unchanged.
    pub async fn advance(&self, intents: IntentMap) -> Result<Arc<GameState>, SessionError> {
        let mut inner = self.shared.inner.lock().await;
        Ok(inner.close(&self.shared, CloseTrigger::Explicit, intents)?)
    }

    /// Close turn `expected` if it is still the open one.
    ///
    /// Returns `None` when another trigger already closed it.
    pub async fn close_turn(
        &self,
        expected: TurnKey,
        intents: IntentMap,
    ) -> Result<Option<Arc<GameState>>, SessionError> {
        let mut inner = self.shared.inner.lock().await;

        if inner.engine.open_turn() != Some(expected) {
            debug!(round = expected.round, turn = expected.turn, "Turn already closed");
            return Ok(None);
        }

        Ok(Some(inner.close(&self.shared, CloseTrigger::Explicit, intents)?))
    }

    /// End the game. Returns `false` if it was already over.
    pub async fn game_over(&self) -> bool {
        let mut inner = self.shared.inner.lock().await;
        inner.timer.cancel();

        if !inner.engine.game_over() {
            return false;
        }

        let _ = self.shared.events.send(SessionEvent::GameOver {
            state: inner.engine.state(),
        });
        true
    }

    /// Summary of the game so far.
    pub async fn summary(&self) -> GameSummary {
        let inner = self.shared.inner.lock().await;
        let state = inner.engine.state();

        GameSummary {
            game_id: uuid::Uuid::from_bytes(self.shared.id).to_string(),
            game_type: self.shared.setup.game_type.clone(),
            started_at: self.shared.started_at,
            rounds_played: state.round_count(),
            turns_played: state.turn_count(),
            finished: inner.engine.is_over(),
            state_hash: hex::encode(state.state_hash()),
        }
    }
}

impl Shared {
    /// Deadline path. Runs on the timer task.
    async fn on_deadline(self: Arc<Self>, generation: u64) {
        let mut inner = self.inner.lock().await;

        if !inner.timer.fired(generation) {
            debug!(generation, "Stale deadline suppressed");
            return;
        }

        let Some(key) = inner.engine.open_turn() else {
            return;
        };

        debug!(round = key.round, turn = key.turn, "Turn deadline elapsed");
        self.sink.turn_deadline(key);

        if let Err(e) = inner.close(&self, CloseTrigger::Deadline, IntentMap::new()) {
            error!(round = key.round, turn = key.turn, error = %e, "Deadline close failed");
        }
    }
}

impl SessionInner {
    /// The single turn-closing path. Caller holds the session lock.
    fn close(
        &mut self,
        shared: &Arc<Shared>,
        trigger: CloseTrigger,
        extra: IntentMap,
    ) -> Result<Arc<GameState>, Arc<GameError>> {
        self.timer.cancel();

        let Some(closing) = self.engine.open_turn() else {
            debug!(?trigger, "Close after game over ignored");
            return Ok(self.engine.state());
        };

        let mut intents = self.intents.drain_for(closing);
        for (bot, intent) in extra {
            let merged = match intents.get(&bot) {
                Some(buffered) => buffered.merged_with(intent),
                None => intent,
            };
            intents.insert(bot, merged);
        }

        match self.engine.advance(&intents) {
            Ok(state) => {
                debug!(
                    ?trigger,
                    round = closing.round,
                    turn = closing.turn,
                    intents = intents.len(),
                    "Turn closed"
                );

                let _ = shared.events.send(SessionEvent::TurnClosed {
                    key: closing,
                    state: Arc::clone(&state),
                });

                if self.engine.is_over() {
                    let _ = shared.events.send(SessionEvent::GameOver {
                        state: Arc::clone(&state),
                    });
                } else {
                    self.arm_deadline(shared);
                }

                Ok(state)
            }
            Err(e) => {
                let error = Arc::new(e);
                let _ = shared.events.send(SessionEvent::GameFailed {
                    key: closing,
                    error: Arc::clone(&error),
                    state: self.engine.state(),
                });
                Err(error)
            }
        }
    }

    fn arm_deadline(&mut self, shared: &Arc<Shared>) {
        let weak = Arc::downgrade(shared);

        self.timer.arm(shared.setup.turn_timeout(), move |generation| async move {
            if let Some(shared) = weak.upgrade() {
                shared.on_deadline(generation).await;
            }
        });
    }
}
