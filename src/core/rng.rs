//! Deterministic Random Number Generator
//!
//! Uses Xorshift128+ algorithm for fast, high-quality, deterministic randomness.
//! Every random draw the engine makes (placement cells, jitter, initial
//! directions) goes through one of these, so a game is reproducible from its seed.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

use crate::game::bot::BotId;

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use tank_arena::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Create RNG for a game from its id and participants.
    pub fn for_game(game_id: &[u8; 16], participants: &[BotId]) -> Self {
        Self::new(derive_game_seed(game_id, participants))
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a random integer in range [0, max).
    ///
    /// Modulo reduction - slight bias for very large max, irrelevant for
    /// grid sizes the engine works with.
    #[inline]
    pub fn next_int(&mut self, max: u64) -> u64 {
        if max == 0 {
            return 0;
        }
        self.next_u64() % max
    }

    /// Generate a random f64 in [0, 1).
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        // 53 high bits fill the mantissa exactly
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Generate a random f64 in [min, max).
    ///
    /// Returns `min` when the range is empty.
    #[inline]
    pub fn next_f64_range(&mut self, min: f64, max: f64) -> f64 {
        if min >= max {
            return min;
        }
        min + self.next_f64() * (max - min)
    }

    /// Generate a random heading in degrees, uniform in [0, 360).
    #[inline]
    pub fn random_direction(&mut self) -> f64 {
        self.next_f64() * 360.0
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive a game seed from the game id and its participants.
///
/// Participant order does not matter; ids are sorted before hashing.
pub fn derive_game_seed(game_id: &[u8; 16], participants: &[BotId]) -> u64 {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"TANK_ARENA_SEED_V1");
    hasher.update(game_id);

    let mut ids: Vec<BotId> = participants.to_vec();
    ids.sort_unstable();
    for id in ids {
        hasher.update(id.0.to_le_bytes());
    }

    let hash = hasher.finalize();

    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// TESTS
// =============================================================================
