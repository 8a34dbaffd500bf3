//! Network Layer
//!
//! The async boundary between the turn engine and the server that talks to
//! bots. Wall-clock time lives here; `game/` never reads a clock.

pub mod clock;
pub mod notify;
pub mod session;

pub use clock::DeadlineTimer;
pub use notify::{DeadlineSink, NullSink, SessionEvent};
pub use session::{GameId, GameSession, GameSummary, SessionError};
