//! Turn Events
//!
//! Transient things that happened during a turn. Events are attached to the
//! turn that produced them and are never carried over to the next one.

use serde::{Serialize, Deserialize};
use crate::core::geometry::Position;
use crate::core::hash::StateHasher;
use crate::game::bot::BotId;

/// Turn event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TurnEventData {
    /// A new round began with these bots
    RoundStarted {
        round: u32,
        participants: Vec<BotId>,
    },

    /// Bot ran out of energy
    BotDeath {
        victim: BotId,
    },

    /// Bot collided with another bot
    BotHitBot {
        bot: BotId,
        victim: BotId,
        rammed: bool,
    },

    /// Bot drove into the arena wall
    BotHitWall {
        bot: BotId,
    },

    /// Bot's radar swept over another bot
    ScannedBot {
        scanned_by: BotId,
        scanned: BotId,
        position: Position,
    },

    /// Resolver-specific event
    Custom {
        kind: String,
        detail: String,
    },
}

/// An event with the turn it belongs to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnEvent {
    /// Turn number within the round
    pub turn: u32,

    /// Bot the event is primarily about (for filtering)
    pub bot: Option<BotId>,

    /// Event data
    pub data: TurnEventData,
}

impl TurnEvent {
    /// Create a new event.
    pub fn new(turn: u32, data: TurnEventData) -> Self {
        let bot = match &data {
            TurnEventData::BotDeath { victim } => Some(*victim),
            TurnEventData::BotHitBot { bot, .. } => Some(*bot),
            TurnEventData::BotHitWall { bot } => Some(*bot),
            TurnEventData::ScannedBot { scanned_by, .. } => Some(*scanned_by),
            TurnEventData::RoundStarted { .. } | TurnEventData::Custom { .. } => None,
        };

        Self { turn, bot, data }
    }

    /// Create round started event.
    pub fn round_started(turn: u32, round: u32, participants: Vec<BotId>) -> Self {
        Self::new(turn, TurnEventData::RoundStarted { round, participants })
    }

    /// Create bot death event.
    pub fn bot_death(turn: u32, victim: BotId) -> Self {
        Self::new(turn, TurnEventData::BotDeath { victim })
    }

    /// Create wall collision event.
    pub fn bot_hit_wall(turn: u32, bot: BotId) -> Self {
        Self::new(turn, TurnEventData::BotHitWall { bot })
    }

    /// Create bot collision event.
    pub fn bot_hit_bot(turn: u32, bot: BotId, victim: BotId, rammed: bool) -> Self {
        Self::new(turn, TurnEventData::BotHitBot { bot, victim, rammed })
    }

    /// Create scan event.
    pub fn scanned_bot(turn: u32, scanned_by: BotId, scanned: BotId, position: Position) -> Self {
        Self::new(turn, TurnEventData::ScannedBot { scanned_by, scanned, position })
    }

    /// Short name of the event kind, for logs.
    pub fn kind(&self) -> &str {
        match &self.data {
            TurnEventData::RoundStarted { .. } => "round_started",
            TurnEventData::BotDeath { .. } => "bot_death",
            TurnEventData::BotHitBot { .. } => "bot_hit_bot",
            TurnEventData::BotHitWall { .. } => "bot_hit_wall",
            TurnEventData::ScannedBot { .. } => "scanned_bot",
            TurnEventData::Custom { kind, .. } => kind,
        }
    }

    /// Hash this event, payload included.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.turn);
        hasher.update_str(self.kind());

        match &self.data {
            TurnEventData::RoundStarted { round, participants } => {
                hasher.update_u32(*round);
                hasher.update_u32(participants.len() as u32);
                for id in participants {
                    hasher.update_u32(id.0);
                }
            }
            TurnEventData::BotDeath { victim } => hasher.update_u32(victim.0),
            TurnEventData::BotHitBot { bot, victim, rammed } => {
                hasher.update_u32(bot.0);
                hasher.update_u32(victim.0);
                hasher.update_bool(*rammed);
            }
            TurnEventData::BotHitWall { bot } => hasher.update_u32(bot.0),
            TurnEventData::ScannedBot { scanned_by, scanned, position } => {
                hasher.update_u32(scanned_by.0);
                hasher.update_u32(scanned.0);
                hasher.update_position(*position);
            }
            // Kind is already in
            TurnEventData::Custom { detail, .. } => hasher.update_str(detail),
        }
    }
}
