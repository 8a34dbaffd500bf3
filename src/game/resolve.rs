//! Turn Resolution
//!
//! The engine does not know the rules of combat. Every turn it hands the
//! previous turn and the collected intents to a [`TurnResolver`], which
//! returns the bots and events of the next turn plus the round/game flags.
//!
//! Missing intents mean "hold previous action"; applying that policy is the
//! resolver's job.

use std::collections::BTreeMap;

use crate::game::bot::{BotId, BotSnapshot};
use crate::game::events::TurnEvent;
use crate::game::intent::IntentMap;
use crate::game::setup::Arena;
use crate::game::state::{Turn, TurnKey};

/// Everything a resolver may look at for one turn.
#[derive(Debug)]
pub struct ResolveContext<'a> {
    /// Key of the turn being produced
    pub key: TurnKey,
    /// Previous turn of this round (turn 0 = initial placement)
    pub previous: &'a Turn,
    /// Intents received for this turn
    pub intents: &'a IntentMap,
    /// Arena bounds
    pub arena: Arena,
    /// Consecutive turns each bot has gone without sending an intent,
    /// including this one
    pub idle_turns: &'a BTreeMap<BotId, u32>,
    /// Idle turns after which a bot counts as inactive
    pub inactivity_limit: u32,
    /// Rounds configured for the game
    pub number_of_rounds: u32,
}

impl ResolveContext<'_> {
    /// Check whether `bot` has been idle for at least the inactivity limit.
    pub fn is_inactive(&self, bot: BotId) -> bool {
        self.idle_turns
            .get(&bot)
            .is_some_and(|idle| *idle >= self.inactivity_limit)
    }
}

/// Outcome of resolving one turn.
#[derive(Clone, Debug, Default)]
pub struct Resolution {
    /// Bot states at the end of the turn, one per bot of the previous turn.
    /// Bots without energy are dropped from the sealed turn.
    pub bots: Vec<BotSnapshot>,
    /// Events that happened during the turn
    pub events: Vec<TurnEvent>,
    /// The round is over after this turn
    pub round_over: bool,
    /// The game is over after this turn
    pub game_over: bool,
}

/// Resolver failed; the turn is not appended.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ResolveError {
    /// What went wrong
    pub message: String,
    /// Bot involved, if any
    pub bot: Option<BotId>,
}

impl ResolveError {
    /// Create an error.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), bot: None }
    }

    /// Create an error about one bot.
    pub fn for_bot(bot: BotId, message: impl Into<String>) -> Self {
        Self { message: message.into(), bot: Some(bot) }
    }
}

/// Per-turn physics, collision and scoring.
pub trait TurnResolver: Send {
    /// Produce the next turn from the previous one.
    fn resolve(&mut self, ctx: &ResolveContext<'_>) -> Result<Resolution, ResolveError>;
}

impl<F> TurnResolver for F
where
    F: FnMut(&ResolveContext<'_>) -> Result<Resolution, ResolveError> + Send,
{
    fn resolve(&mut self, ctx: &ResolveContext<'_>) -> Result<Resolution, ResolveError> {
        self(ctx)
    }
}

/// Resolver that carries every bot forward unchanged.
///
/// A round ends when at most one bot is left or, if configured, when the
/// round reaches `turn_limit` turns.
#[derive(Clone, Copy, Debug, Default)]
pub struct HoldResolver {
    /// Turns after which a round ends regardless of survivors
    pub turn_limit: Option<u32>,
}

impl HoldResolver {
    /// Resolver whose rounds last `turns` turns.
    pub const fn with_turn_limit(turns: u32) -> Self {
        Self { turn_limit: Some(turns) }
    }
}

impl TurnResolver for HoldResolver {
    fn resolve(&mut self, ctx: &ResolveContext<'_>) -> Result<Resolution, ResolveError> {
        let bots = ctx.previous.bots().to_vec();
        let alive = bots.iter().filter(|b| b.is_alive()).count();

        let limit_reached = self.turn_limit.is_some_and(|limit| ctx.key.turn >= limit);

        Ok(Resolution {
            bots,
            events: Vec::new(),
            round_over: alive <= 1 || limit_reached,
            game_over: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Position;

    fn previous() -> Turn {
        Turn::initial(vec![
            BotSnapshot::spawn(BotId(1), Position::new(0.0, 0.0), 0.0, 0.0, 0.0),
            BotSnapshot::spawn(BotId(2), Position::new(100.0, 0.0), 0.0, 0.0, 0.0),
        ])
    }

    #[test]
    fn test_hold_resolver_carries_bots() {
        let prev = previous();
        let intents = IntentMap::new();
        let idle = BTreeMap::new();
        let ctx = ResolveContext {
            key: TurnKey::new(1, 1),
            previous: &prev,
            intents: &intents,
            arena: Arena::new(800, 600),
            idle_turns: &idle,
            inactivity_limit: 450,
            number_of_rounds: 1,
        };

        let mut resolver = HoldResolver::default();
        let res = resolver.resolve(&ctx).unwrap();
        assert_eq!(res.bots, prev.bots().to_vec());
        assert!(!res.round_over);

        let mut limited = HoldResolver::with_turn_limit(1);
        assert!(limited.resolve(&ctx).unwrap().round_over);
    }

    #[test]
    fn test_closure_resolver_and_inactivity() {
        let prev = previous();
        let intents = IntentMap::new();
        let idle: BTreeMap<BotId, u32> = [(BotId(1), 3), (BotId(2), 1)].into_iter().collect();
        let ctx = ResolveContext {
            key: TurnKey::new(1, 4),
            previous: &prev,
            intents: &intents,
            arena: Arena::new(800, 600),
            idle_turns: &idle,
            inactivity_limit: 3,
            number_of_rounds: 1,
        };

        assert!(ctx.is_inactive(BotId(1)));
        assert!(!ctx.is_inactive(BotId(2)));

        let mut failing = |_: &ResolveContext<'_>| -> Result<Resolution, ResolveError> {
            Err(ResolveError::for_bot(BotId(2), "bullet left the arena"))
        };
        let err = failing.resolve(&ctx).unwrap_err();
        assert_eq!(err.bot, Some(BotId(2)));
    }
}
