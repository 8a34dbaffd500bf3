//! Game Setup
//!
//! Immutable configuration for one game and the arena it is played in.
//! A `Setup` is validated once, when the engine is constructed; after that
//! it is only ever read.

use std::collections::BTreeSet;
use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::core::geometry::{Position, Size};
use crate::game::bot::BotId;
use crate::GRID_CELL_SIZE;

// =============================================================================
// ARENA
// =============================================================================

/// Rectangular bounds of the battlefield, fixed for the game's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Arena {
    /// Arena dimensions
    pub size: Size,
}

impl Arena {
    /// Create an arena of the given dimensions.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { size: Size::new(width, height) }
    }

    /// Arena width.
    #[inline]
    pub const fn width(&self) -> u32 {
        self.size.width
    }

    /// Arena height.
    #[inline]
    pub const fn height(&self) -> u32 {
        self.size.height
    }

    /// Check whether `position` lies within `[0, width) × [0, height)`.
    ///
    /// NaN coordinates are never inside.
    pub fn contains(&self, position: Position) -> bool {
        (0.0..self.size.width as f64).contains(&position.x)
            && (0.0..self.size.height as f64).contains(&position.y)
    }

    /// Number of placement cells along each axis.
    #[inline]
    pub const fn grid_dimensions(&self) -> (u32, u32) {
        (self.size.width / GRID_CELL_SIZE, self.size.height / GRID_CELL_SIZE)
    }

    /// Number of placement cells, i.e. the most bots a round can seat.
    pub fn cell_capacity(&self) -> u64 {
        let (gw, gh) = self.grid_dimensions();
        gw as u64 * gh as u64
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Setup is inconsistent; the game cannot start.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// No participants.
    #[error("Setup has no participants")]
    NoParticipants,

    /// Participant listed twice.
    #[error("Participant {0} is listed more than once")]
    DuplicateParticipant(BotId),

    /// Zero width or height.
    #[error("Arena size ({width},{height}) must be positive in both dimensions")]
    InvalidArena {
        /// Configured width
        width: u32,
        /// Configured height
        height: u32,
    },

    /// Too few placement cells for the participants.
    #[error("Arena size ({width},{height}) is too small to contain {participants} bots ({capacity} cells)")]
    ArenaTooSmall {
        /// Configured width
        width: u32,
        /// Configured height
        height: u32,
        /// Grid cell capacity
        capacity: u64,
        /// Participant count
        participants: usize,
    },

    /// Zero rounds.
    #[error("Number of rounds must be at least 1")]
    NoRounds,

    /// Zero turn timeout.
    #[error("Turn timeout must be positive")]
    ZeroTurnTimeout,

    /// Setup document could not be parsed.
    #[error("Failed to parse setup: {0}")]
    Parse(#[from] serde_json::Error),
}

// =============================================================================
// SETUP
// =============================================================================

/// Truncate to milliseconds, saturating at `u64::MAX`.
fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Configuration for one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Setup {
    /// Game type identifier (e.g. "classic", "melee")
    pub game_type: String,
    /// Arena width in arena units
    pub arena_width: u32,
    /// Arena height in arena units
    pub arena_height: u32,
    /// Rounds to play before the game is over
    pub number_of_rounds: u32,
    /// Turn deadline in milliseconds
    pub turn_timeout_ms: u64,
    /// Time participants get to report ready, in milliseconds
    pub ready_timeout_ms: u64,
    /// Consecutive turns without intents before a bot counts as inactive
    pub inactivity_turns: u32,
    /// Participating bot ids
    pub participants: Vec<BotId>,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            game_type: "classic".to_string(),
            arena_width: 800,
            arena_height: 600,
            number_of_rounds: 10,
            turn_timeout_ms: 100,
            ready_timeout_ms: 10_000,
            inactivity_turns: 450,
            participants: Vec::new(),
        }
    }
}

impl Setup {
    /// Create a setup with default timing for the given arena and participants.
    pub fn new(
        game_type: impl Into<String>,
        arena_width: u32,
        arena_height: u32,
        participants: impl IntoIterator<Item = BotId>,
    ) -> Self {
        Self {
            game_type: game_type.into(),
            arena_width,
            arena_height,
            participants: participants.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Set the number of rounds.
    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.number_of_rounds = rounds;
        self
    }

    /// Set the turn deadline.
    ///
    /// Timeouts are kept in whole milliseconds. Anything under 1ms becomes
    /// zero, which `validate` rejects.
    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout_ms = whole_millis(timeout);
        self
    }

    /// Set the ready timeout, in whole milliseconds.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout_ms = whole_millis(timeout);
        self
    }

    /// Set the inactivity limit.
    pub fn with_inactivity_turns(mut self, turns: u32) -> Self {
        self.inactivity_turns = turns;
        self
    }

    /// Parse a setup from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        let setup: Setup = serde_json::from_str(json)?;
        setup.validate()?;
        Ok(setup)
    }

    /// The arena this setup describes.
    pub const fn arena(&self) -> Arena {
        Arena::new(self.arena_width, self.arena_height)
    }

    /// Turn deadline.
    pub const fn turn_timeout(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_ms)
    }

    /// Ready timeout.
    pub const fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Check the setup for consistency.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.participants.is_empty() {
            return Err(ConfigurationError::NoParticipants);
        }

        let mut seen = BTreeSet::new();
        for id in &self.participants {
            if !seen.insert(*id) {
                return Err(ConfigurationError::DuplicateParticipant(*id));
            }
        }

        if self.arena_width == 0 || self.arena_height == 0 {
            return Err(ConfigurationError::InvalidArena {
                width: self.arena_width,
                height: self.arena_height,
            });
        }

        let capacity = self.arena().cell_capacity();
        if capacity < self.participants.len() as u64 {
            return Err(ConfigurationError::ArenaTooSmall {
                width: self.arena_width,
                height: self.arena_height,
                capacity,
                participants: self.participants.len(),
            });
        }

        if self.number_of_rounds == 0 {
            return Err(ConfigurationError::NoRounds);
        }

        if self.turn_timeout_ms == 0 {
            return Err(ConfigurationError::ZeroTurnTimeout);
        }

        Ok(())
    }
}
