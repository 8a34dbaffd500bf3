//! Game Logic Module
//!
//! The turn engine. Deterministic given a seed and the intents of each turn.
//!
//! ## Module Structure
//!
//! - `setup`: Arena and game configuration
//! - `bot`: Bot identifiers and per-turn bot snapshots
//! - `intent`: Bot intents and the per-turn intent buffer
//! - `events`: Events attached to turns
//! - `state`: Turn, round and game history
//! - `placement`: Non-overlapping initial placement
//! - `resolve`: Pluggable per-turn resolution
//! - `engine`: Game/round/turn lifecycle

pub mod setup;
pub mod bot;
pub mod intent;
pub mod events;
pub mod state;
pub mod placement;
pub mod resolve;
pub mod engine;

// Re-export key types
pub use setup::{Arena, Setup, ConfigurationError};
pub use bot::{BotId, BotSnapshot, Score};
pub use intent::{Intent, IntentMap, IntentOutcome};
pub use events::{TurnEvent, TurnEventData};
pub use state::{Turn, Round, GameState, TurnKey};
pub use placement::place_bots;
pub use resolve::{TurnResolver, ResolveContext, Resolution, ResolveError, HoldResolver};
pub use engine::{TurnEngine, EnginePhase, GameError};
