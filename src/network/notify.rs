//! Session Notifications
//!
//! Events the session publishes to the surrounding server layer, and the
//! sink that is told when a turn's intent window has closed.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::game::engine::GameError;
use crate::game::state::{GameState, TurnKey};

/// Something observable happened in a session.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// A turn was appended to the history.
    TurnClosed {
        /// Key of the new turn
        key: TurnKey,
        /// History including the new turn
        state: Arc<GameState>,
    },
    /// The deadline of a turn elapsed before it was closed explicitly.
    DeadlineElapsed {
        /// Turn whose window closed
        key: TurnKey,
    },
    /// The game is over.
    GameOver {
        /// Final history
        state: Arc<GameState>,
    },
    /// A turn could not be produced and the game ended on it. Sent instead
    /// of `GameOver`.
    GameFailed {
        /// Turn that failed
        key: TurnKey,
        /// Why it failed
        error: Arc<GameError>,
        /// History up to the last good turn
        state: Arc<GameState>,
    },
}

/// Receives turn-deadline notifications.
///
/// Called from inside the turn-closing critical section, so implementations
/// must not block.
pub trait DeadlineSink: Send + Sync {
    /// The intent window for `key` closed on its deadline.
    fn turn_deadline(&self, key: TurnKey);
}

impl DeadlineSink for broadcast::Sender<SessionEvent> {
    fn turn_deadline(&self, key: TurnKey) {
        // No subscribers is fine
        if self.send(SessionEvent::DeadlineElapsed { key }).is_err() {
            debug!(round = key.round, turn = key.turn, "Deadline elapsed with no subscribers");
        }
    }
}

/// Sink that drops every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DeadlineSink for NullSink {
    fn turn_deadline(&self, _key: TurnKey) {}
}
