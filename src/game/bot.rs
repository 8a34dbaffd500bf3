//! Bot Snapshots
//!
//! One bot's complete observable state at a turn boundary. Snapshots are
//! plain values: a new turn produces new snapshots, it never edits old ones.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::geometry::{BoundingBox, Position, ScanArc, normalize_degrees};
use crate::core::hash::StateHasher;
use crate::{BOT_FOOTPRINT, INITIAL_ENERGY, RADAR_RADIUS};

// =============================================================================
// BOT ID
// =============================================================================

/// Participant identifier, unique within a game.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BotId(pub u32);

impl fmt::Display for BotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bot#{}", self.0)
    }
}

impl From<u32> for BotId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

// =============================================================================
// SCORE
// =============================================================================

/// Cumulative score of a bot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Points for outliving other bots
    pub survival: f64,
    /// Points for bullet damage dealt
    pub bullet_damage: f64,
    /// Points for ramming damage dealt
    pub ram_damage: f64,
    /// Bonus for finishing the last bot
    pub last_survivor_bonus: f64,
}

impl Score {
    /// Sum of all score components.
    pub fn total(&self) -> f64 {
        self.survival + self.bullet_damage + self.ram_damage + self.last_survivor_bonus
    }
}

// =============================================================================
// BOT SNAPSHOT
// =============================================================================

/// State of a single bot at the end of a turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BotSnapshot {
    /// Bot identifier
    pub id: BotId,
    /// Remaining energy
    pub energy: f64,
    /// Current speed
    pub speed: f64,
    /// Position of the footprint's lower-left corner
    pub position: Position,
    /// Body heading in degrees, [0, 360)
    pub direction: f64,
    /// Turret heading in degrees, [0, 360)
    pub turret_direction: f64,
    /// Radar heading in degrees, [0, 360)
    pub radar_direction: f64,
    /// Current radar sweep
    pub scan_arc: ScanArc,
    /// Cumulative score
    pub score: Score,
}

impl BotSnapshot {
    /// Fresh bot at the start of a round.
    ///
    /// Energy is `INITIAL_ENERGY`, speed zero, the radar arc starts at 0
    /// with `RADAR_RADIUS`. Headings are normalized into [0, 360).
    pub fn spawn(
        id: BotId,
        position: Position,
        direction: f64,
        turret_direction: f64,
        radar_direction: f64,
    ) -> Self {
        Self {
            id,
            energy: INITIAL_ENERGY,
            speed: 0.0,
            position,
            direction: normalize_degrees(direction),
            turret_direction: normalize_degrees(turret_direction),
            radar_direction: normalize_degrees(radar_direction),
            scan_arc: ScanArc::new(0.0, RADAR_RADIUS),
            score: Score::default(),
        }
    }

    /// Space the bot occupies regardless of body rotation.
    pub fn footprint(&self) -> BoundingBox {
        BoundingBox::square(self.position, BOT_FOOTPRINT as f64)
    }

    /// A bot with energy left is still in the round.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.energy > 0.0
    }

    /// Hash this bot's state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.id.0);
        hasher.update_f64(self.energy);
        hasher.update_f64(self.speed);
        hasher.update_position(self.position);
        hasher.update_f64(self.direction);
        hasher.update_f64(self.turret_direction);
        hasher.update_f64(self.radar_direction);
        hasher.update_f64(self.scan_arc.start_angle);
        hasher.update_f64(self.scan_arc.radius);
        hasher.update_f64(self.score.survival);
        hasher.update_f64(self.score.bullet_damage);
        hasher.update_f64(self.score.ram_damage);
        hasher.update_f64(self.score.last_survivor_bonus);
    }
}
