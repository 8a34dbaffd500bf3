//! Bot Intents
//!
//! What a bot asks to do in the upcoming turn, and the buffer that collects
//! intents between two turn closes.
//!
//! Every field of an [`Intent`] is optional: `None` means "keep doing what
//! you did last turn". How that is applied is up to the resolver.

use std::collections::{BTreeMap, BTreeSet};
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::game::bot::BotId;
use crate::game::state::TurnKey;

// =============================================================================
// INTENT
// =============================================================================

/// Requested actions of one bot for one turn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Desired speed (negative = reverse)
    pub target_speed: Option<f64>,
    /// Body turn rate in degrees per turn
    pub turn_rate: Option<f64>,
    /// Turret turn rate in degrees per turn
    pub gun_turn_rate: Option<f64>,
    /// Radar turn rate in degrees per turn
    pub radar_turn_rate: Option<f64>,
    /// Fire with this power, if any
    pub firepower: Option<f64>,
}

impl Intent {
    /// An intent that changes nothing.
    pub const fn hold() -> Self {
        Self {
            target_speed: None,
            turn_rate: None,
            gun_turn_rate: None,
            radar_turn_rate: None,
            firepower: None,
        }
    }

    /// Intent that only sets speed.
    pub const fn with_speed(target_speed: f64) -> Self {
        Self {
            target_speed: Some(target_speed),
            ..Self::hold()
        }
    }

    /// Check whether the intent requests nothing.
    #[inline]
    pub fn is_hold(&self) -> bool {
        *self == Self::hold()
    }

    /// Overlay `other` on top of this intent; fields set in `other` win.
    pub fn merged_with(self, other: Intent) -> Intent {
        Intent {
            target_speed: other.target_speed.or(self.target_speed),
            turn_rate: other.turn_rate.or(self.turn_rate),
            gun_turn_rate: other.gun_turn_rate.or(self.gun_turn_rate),
            radar_turn_rate: other.radar_turn_rate.or(self.radar_turn_rate),
            firepower: other.firepower.or(self.firepower),
        }
    }
}

/// Intents for one turn, keyed by bot (BTreeMap for deterministic order).
pub type IntentMap = BTreeMap<BotId, Intent>;

// =============================================================================
// INTENT BUFFER
// =============================================================================

/// What happened to a submitted intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntentOutcome {
    /// Buffered for the open turn.
    Accepted,
    /// Targeted a turn that already closed; dropped.
    Discarded,
    /// Targeted a turn after the open one; dropped.
    TooEarly,
    /// Sender is not a participant of this game.
    UnknownBot,
}

/// Intents collected since the last turn close.
///
/// Only intents for the currently open turn are kept. A later submission
/// from the same bot replaces the earlier one.
#[derive(Clone, Debug, Default)]
pub struct IntentBuffer {
    participants: BTreeSet<BotId>,
    pending: BTreeMap<BotId, (TurnKey, Intent)>,
}

impl IntentBuffer {
    /// Create a buffer that accepts intents from `participants`.
    pub fn new(participants: impl IntoIterator<Item = BotId>) -> Self {
        Self {
            participants: participants.into_iter().collect(),
            pending: BTreeMap::new(),
        }
    }

    /// Submit an intent from `bot` for turn `target`, given the turn that is
    /// currently open.
    pub fn submit(&mut self, bot: BotId, target: TurnKey, intent: Intent, open: TurnKey) -> IntentOutcome {
        if !self.participants.contains(&bot) {
            return IntentOutcome::UnknownBot;
        }

        if target < open {
            debug!(%bot, ?target, ?open, "Discarding late intent");
            return IntentOutcome::Discarded;
        }

        if target > open {
            debug!(%bot, ?target, ?open, "Rejecting intent for future turn");
            return IntentOutcome::TooEarly;
        }

        self.pending.insert(bot, (target, intent));
        IntentOutcome::Accepted
    }

    /// Remove and return every intent targeting `closing`.
    ///
    /// Anything left for an older turn is dropped.
    pub fn drain_for(&mut self, closing: TurnKey) -> IntentMap {
        let pending = std::mem::take(&mut self.pending);

        pending
            .into_iter()
            .filter_map(|(bot, (target, intent))| {
                if target == closing {
                    Some((bot, intent))
                } else {
                    debug!(%bot, ?target, ?closing, "Dropping stale buffered intent");
                    None
                }
            })
            .collect()
    }

    /// Number of buffered intents.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Check whether every participant has an intent buffered.
    pub fn is_complete(&self) -> bool {
        self.participants.iter().all(|bot| self.pending.contains_key(bot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(round: u32, turn: u32) -> TurnKey {
        TurnKey { round, turn }
    }

    #[test]
    fn test_merge_prefers_newer_fields() {
        let base = Intent { target_speed: Some(4.0), turn_rate: Some(10.0), ..Intent::hold() };
        let newer = Intent { turn_rate: Some(-5.0), firepower: Some(1.0), ..Intent::hold() };

        let merged = base.merged_with(newer);
        assert_eq!(merged.target_speed, Some(4.0));
        assert_eq!(merged.turn_rate, Some(-5.0));
        assert_eq!(merged.firepower, Some(1.0));
    }

    #[test]
    fn test_buffer_accepts_open_turn_only() {
        let mut buffer = IntentBuffer::new([BotId(1), BotId(2)]);
        let open = key(1, 5);

        assert_eq!(buffer.submit(BotId(1), key(1, 4), Intent::with_speed(1.0), open), IntentOutcome::Discarded);
        assert_eq!(buffer.submit(BotId(1), key(1, 6), Intent::with_speed(1.0), open), IntentOutcome::TooEarly);
        assert_eq!(buffer.submit(BotId(9), open, Intent::with_speed(1.0), open), IntentOutcome::UnknownBot);
        assert_eq!(buffer.submit(BotId(1), open, Intent::with_speed(1.0), open), IntentOutcome::Accepted);

        assert_eq!(buffer.len(), 1);
        assert!(!buffer.is_complete());
    }

    #[test]
    fn test_last_submission_wins() {
        let mut buffer = IntentBuffer::new([BotId(1)]);
        let open = key(2, 1);

        buffer.submit(BotId(1), open, Intent::with_speed(1.0), open);
        buffer.submit(BotId(1), open, Intent::with_speed(8.0), open);
        assert!(buffer.is_complete());

        let drained = buffer.drain_for(open);
        assert_eq!(drained.get(&BotId(1)), Some(&Intent::with_speed(8.0)));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_drops_stale_entries() {
        let mut buffer = IntentBuffer::new([BotId(1), BotId(2)]);

        buffer.submit(BotId(1), key(1, 3), Intent::with_speed(2.0), key(1, 3));
        buffer.submit(BotId(2), key(1, 3), Intent::with_speed(3.0), key(1, 3));

        let drained = buffer.drain_for(key(2, 1));
        assert!(drained.is_empty());
        assert!(buffer.is_empty());
    }
}
