//! Core deterministic primitives.
//!
//! Everything the engine draws at random or compares across runs is built
//! on these types.

pub mod geometry;
pub mod rng;
pub mod hash;

// Re-export core types
pub use geometry::{Position, Size, BoundingBox, ScanArc, normalize_degrees};
pub use rng::DeterministicRng;
pub use hash::{StateHash, StateHasher};
