//! State Hashing for Verification
//!
//! Deterministic hashing of game history, used to compare two runs of the
//! same seed and to fingerprint a finished game in logs.

use sha2::{Sha256, Digest};
use super::geometry::Position;

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Deterministic hasher for game state.
///
/// Wraps SHA-256 with helpers for the engine's value types.
/// Order of updates is critical for determinism.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for game state.
    pub fn for_game_state() -> Self {
        Self::new(b"TANK_ARENA_STATE_V1")
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an f64 by its bit pattern.
    ///
    /// `-0.0` and `0.0` hash differently; the engine never produces `-0.0`
    /// for stored angles because they go through `normalize_degrees`.
    #[inline]
    pub fn update_f64(&mut self, value: f64) {
        self.update_u64(value.to_bits());
    }

    /// Update with a Position.
    #[inline]
    pub fn update_position(&mut self, value: Position) {
        self.update_f64(value.x);
        self.update_f64(value.y);
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Update with a length-prefixed string, so adjacent strings cannot
    /// run into each other.
    pub fn update_str(&mut self, value: &str) {
        self.update_u64(value.len() as u64);
        self.update_bytes(value.as_bytes());
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_hasher_determinism() {
        let make_hash = || {
            let mut hasher = StateHasher::for_game_state();
            hasher.update_u32(100);
            hasher.update_u64(12345);
            hasher.update_f64(5.5);
            hasher.update_position(Position::new(1.0, 2.0));
            hasher.update_bool(true);
            hasher.finalize()
        };

        assert_eq!(make_hash(), make_hash());
    }

    #[test]
    fn test_hash_order_matters() {
        let hash1 = {
            let mut h = StateHasher::new(b"test");
            h.update_u32(1);
            h.update_u32(2);
            h.finalize()
        };

        let hash2 = {
            let mut h = StateHasher::new(b"test");
            h.update_u32(2);
            h.update_u32(1);
            h.finalize()
        };

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_domain_separation() {
        let mut a = StateHasher::new(b"DOMAIN_A");
        let mut b = StateHasher::new(b"DOMAIN_B");
        a.update_u32(7);
        b.update_u32(7);
        assert_ne!(a.finalize(), b.finalize());
    }

    #[test]
    fn test_strings_are_length_prefixed() {
        let hash = |parts: &[&str]| {
            let mut h = StateHasher::for_game_state();
            for part in parts {
                h.update_str(part);
            }
            h.finalize()
        };

        assert_ne!(hash(&["ab", "c"]), hash(&["a", "bc"]));
    }
}
