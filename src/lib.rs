//! # Tank Arena Server
//!
//! Authoritative turn engine for a multi-bot tank arena.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TANK ARENA SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── geometry.rs - Positions, sizes, footprints              │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - State hashing for verification            │
//! │                                                              │
//! │  game/           - Turn engine (deterministic)               │
//! │  ├── setup.rs    - Arena and game configuration              │
//! │  ├── bot.rs      - Bot snapshots                             │
//! │  ├── intent.rs   - Bot intents and buffering                 │
//! │  ├── events.rs   - Turn events                               │
//! │  ├── state.rs    - Turn / round / game history               │
//! │  ├── placement.rs- Non-overlapping initial placement         │
//! │  ├── resolve.rs  - Pluggable turn resolution                 │
//! │  └── engine.rs   - Game/round/turn lifecycle                 │
//! │                                                              │
//! │  network/        - Async boundary (non-deterministic)        │
//! │  ├── clock.rs    - Cancellable turn deadline                 │
//! │  ├── notify.rs   - Deadline sink and session events          │
//! │  └── session.rs  - Serialized turn closing                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! `core/` and `game/` never read a clock and draw all randomness from a
//! seeded Xorshift128+. Given the same seed and the same intents per turn,
//! the engine produces the same history and the same state hash.
//! Only *when* a turn closes depends on wall-clock time, and that lives in
//! `network/`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use game::setup::{Arena, Setup, ConfigurationError};
pub use game::state::{GameState, Round, Turn, TurnKey};
pub use game::engine::{TurnEngine, EnginePhase, GameError};
pub use network::session::{GameSession, SessionError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Energy every bot starts a round with
pub const INITIAL_ENERGY: f64 = 100.0;

/// Radar scan radius
pub const RADAR_RADIUS: f64 = 1200.0;

/// Bot body width in arena units
pub const BOT_WIDTH: u32 = 36;

/// Bot body height in arena units
pub const BOT_HEIGHT: u32 = 36;

/// Edge length of a placement grid cell
pub const GRID_CELL_SIZE: u32 = 100;

/// Edge length of a bot's footprint: the body diagonal, rounded down, plus one.
/// Covers the body at any heading.
pub const BOT_FOOTPRINT: u32 = 51;
