//! Game History
//!
//! Immutable, append-only snapshots: turns within rounds within a game.
//!
//! Each level owns the level below it through `Arc`, so appending a turn
//! copies a vector of pointers and shares every sealed turn and round with
//! the previous `GameState`. Nothing reachable from a `GameState` is ever
//! mutated after construction, so values handed out earlier stay valid and
//! can be read from any thread without locking.

use std::sync::Arc;
use serde::{Serialize, Deserialize};

use crate::core::hash::{StateHash, StateHasher};
use crate::game::bot::{BotId, BotSnapshot};
use crate::game::events::TurnEvent;
use crate::game::setup::Arena;

// =============================================================================
// TURN KEY
// =============================================================================

/// Position of a turn in the game: `(round, turn)`, ordered lexicographically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TurnKey {
    /// Round number, starting at 1
    pub round: u32,
    /// Turn number within the round, starting at 1
    pub turn: u32,
}

impl TurnKey {
    /// Create a new key.
    pub const fn new(round: u32, turn: u32) -> Self {
        Self { round, turn }
    }
}

// =============================================================================
// TURN
// =============================================================================

/// One sealed simulation step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    number: u32,
    bots: Vec<BotSnapshot>,
    events: Vec<TurnEvent>,
}

impl Turn {
    /// Seal a turn. Bots are stored sorted by id.
    pub fn new(
        number: u32,
        bots: impl IntoIterator<Item = BotSnapshot>,
        events: impl IntoIterator<Item = TurnEvent>,
    ) -> Self {
        let mut bots: Vec<BotSnapshot> = bots.into_iter().collect();
        bots.sort_by_key(|b| b.id);

        Self {
            number,
            bots,
            events: events.into_iter().collect(),
        }
    }

    /// The reference state a round starts from (turn 0, no events).
    pub fn initial(bots: impl IntoIterator<Item = BotSnapshot>) -> Self {
        Self::new(0, bots, Vec::new())
    }

    /// Turn number within its round.
    #[inline]
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Bots still in the round, sorted by id.
    #[inline]
    pub fn bots(&self) -> &[BotSnapshot] {
        &self.bots
    }

    /// Look up a bot.
    pub fn bot(&self, id: BotId) -> Option<&BotSnapshot> {
        self.bots
            .binary_search_by_key(&id, |b| b.id)
            .ok()
            .and_then(|idx| self.bots.get(idx))
    }

    /// Events that happened during this turn.
    #[inline]
    pub fn events(&self) -> &[TurnEvent] {
        &self.events
    }

    /// Number of bots with energy left.
    pub fn alive_count(&self) -> usize {
        self.bots.iter().filter(|b| b.is_alive()).count()
    }

    /// Hash this turn for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.number);
        hasher.update_u32(self.bots.len() as u32);
        for bot in &self.bots {
            bot.hash_into(hasher);
        }
        hasher.update_u32(self.events.len() as u32);
        for event in &self.events {
            event.hash_into(hasher);
        }
    }
}

// =============================================================================
// ROUND
// =============================================================================

/// One play-through from placement to round over.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Round {
    number: u32,
    turns: Vec<Arc<Turn>>,
}

impl Round {
    /// An empty round.
    pub fn new(number: u32) -> Self {
        Self { number, turns: Vec::new() }
    }

    /// A new round value with `turn` appended. `self` is left untouched.
    pub fn with_turn(&self, turn: Arc<Turn>) -> Self {
        let mut turns = Vec::with_capacity(self.turns.len() + 1);
        turns.extend(self.turns.iter().cloned());
        turns.push(turn);

        Self { number: self.number, turns }
    }

    /// Round number within the game.
    #[inline]
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Turns in order.
    pub fn turns(&self) -> impl ExactSizeIterator<Item = &Turn> + '_ {
        self.turns.iter().map(|t| t.as_ref())
    }

    /// Shared handle to a turn by index.
    pub fn turn_at(&self, index: usize) -> Option<&Arc<Turn>> {
        self.turns.get(index)
    }

    /// Most recent turn.
    pub fn last_turn(&self) -> Option<&Arc<Turn>> {
        self.turns.last()
    }

    /// Number of turns played.
    #[inline]
    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }
}

// =============================================================================
// GAME STATE
// =============================================================================

/// Full history of a game: the arena plus every round played so far.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    arena: Arena,
    rounds: Vec<Arc<Round>>,
}

impl GameState {
    /// A game with no rounds yet.
    pub fn new(arena: Arena) -> Self {
        Self { arena, rounds: Vec::new() }
    }

    /// A new state with `turn` appended to round `round_number`.
    ///
    /// If `round_number` is the current round its turns are extended,
    /// otherwise a new round is begun and the old one is left intact.
    pub fn with_turn(&self, round_number: u32, turn: Arc<Turn>) -> Self {
        let mut rounds = self.rounds.clone();

        match rounds.last_mut() {
            Some(last) if last.number() == round_number => {
                *last = Arc::new(last.with_turn(turn));
            }
            _ => {
                rounds.push(Arc::new(Round::new(round_number).with_turn(turn)));
            }
        }

        Self { arena: self.arena, rounds }
    }

    /// Arena bounds.
    #[inline]
    pub fn arena(&self) -> Arena {
        self.arena
    }

    /// Rounds in order.
    pub fn rounds(&self) -> impl ExactSizeIterator<Item = &Round> + '_ {
        self.rounds.iter().map(|r| r.as_ref())
    }

    /// Shared handle to a round by index.
    pub fn round_at(&self, index: usize) -> Option<&Arc<Round>> {
        self.rounds.get(index)
    }

    /// Round currently being played (or the last one played).
    pub fn current_round(&self) -> Option<&Round> {
        self.rounds.last().map(|r| r.as_ref())
    }

    /// Most recent turn of the game.
    pub fn latest_turn(&self) -> Option<&Turn> {
        self.current_round()
            .and_then(|r| r.last_turn())
            .map(|t| t.as_ref())
    }

    /// Key of the most recent turn.
    pub fn latest_key(&self) -> Option<TurnKey> {
        let round = self.current_round()?;
        let turn = round.last_turn()?;
        Some(TurnKey::new(round.number(), turn.number()))
    }

    /// Number of rounds begun.
    #[inline]
    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    /// Total turns across all rounds.
    pub fn turn_count(&self) -> usize {
        self.rounds.iter().map(|r| r.turn_count()).sum()
    }

    /// Deterministic hash of the full history.
    pub fn state_hash(&self) -> StateHash {
        let mut hasher = StateHasher::for_game_state();
        hasher.update_u32(self.arena.width());
        hasher.update_u32(self.arena.height());
        hasher.update_u32(self.rounds.len() as u32);

        for round in &self.rounds {
            hasher.update_u32(round.number());
            hasher.update_u32(round.turn_count() as u32);
            for turn in round.turns() {
                turn.hash_into(&mut hasher);
            }
        }

        hasher.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Position;

    fn bot(id: u32, x: f64) -> BotSnapshot {
        BotSnapshot::spawn(BotId(id), Position::new(x, 0.0), 0.0, 0.0, 0.0)
    }

    fn turn(number: u32) -> Arc<Turn> {
        Arc::new(Turn::new(number, vec![bot(2, 10.0), bot(1, 20.0)], Vec::new()))
    }

    #[test]
    fn test_turn_sorts_bots() {
        let t = turn(1);
        let ids: Vec<BotId> = t.bots().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![BotId(1), BotId(2)]);
        assert_eq!(t.bot(BotId(2)).map(|b| b.position.x), Some(10.0));
        assert!(t.bot(BotId(3)).is_none());
    }

    #[test]
    fn test_turn_key_ordering() {
        assert!(TurnKey::new(1, 9) < TurnKey::new(2, 1));
        assert!(TurnKey::new(2, 1) < TurnKey::new(2, 2));
    }

    #[test]
    fn test_with_turn_leaves_previous_state_intact() {
        let s0 = GameState::new(Arena::new(800, 600));
        let s1 = s0.with_turn(1, turn(1));
        let s2 = s1.with_turn(1, turn(2));

        assert_eq!(s0.turn_count(), 0);
        assert_eq!(s1.turn_count(), 1);
        assert_eq!(s2.turn_count(), 2);
        assert_eq!(s2.round_count(), 1);

        // The sealed turn is shared, not copied
        let first_in_s1 = s1.round_at(0).and_then(|r| r.turn_at(0)).unwrap();
        let first_in_s2 = s2.round_at(0).and_then(|r| r.turn_at(0)).unwrap();
        assert!(Arc::ptr_eq(first_in_s1, first_in_s2));
    }

    #[test]
    fn test_new_round_keeps_old_round() {
        let s1 = GameState::new(Arena::new(800, 600))
            .with_turn(1, turn(1))
            .with_turn(1, turn(2));
        let s2 = s1.with_turn(2, turn(1));

        assert_eq!(s2.round_count(), 2);
        assert!(Arc::ptr_eq(s1.round_at(0).unwrap(), s2.round_at(0).unwrap()));
        assert_eq!(s2.latest_key(), Some(TurnKey::new(2, 1)));
        assert_eq!(s2.current_round().map(|r| r.turn_count()), Some(1));
    }

    #[test]
    fn test_state_hash_tracks_history() {
        let s1 = GameState::new(Arena::new(800, 600)).with_turn(1, turn(1));
        let s1_again = GameState::new(Arena::new(800, 600)).with_turn(1, turn(1));
        let s2 = s1.with_turn(1, turn(2));

        assert_eq!(s1.state_hash(), s1_again.state_hash());
        assert_ne!(s1.state_hash(), s2.state_hash());
    }

    #[test]
    fn test_state_hash_covers_event_payload() {
        let with_death = |victim: u32| {
            let turn = Turn::new(1, vec![bot(1, 20.0)], vec![TurnEvent::bot_death(1, BotId(victim))]);
            GameState::new(Arena::new(800, 600)).with_turn(1, Arc::new(turn))
        };

        assert_ne!(with_death(2).state_hash(), with_death(3).state_hash());
    }
}
