//! Arena Geometry
//!
//! Plain value types for positions, sizes and footprints. Coordinates are
//! arena units with the origin in the bottom-left corner.

use std::fmt;
use serde::{Serialize, Deserialize};

/// A point in the arena.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Position {
    /// Origin
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a new position.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// Width and height in arena units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Size {
    /// Create a new size.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned box, half-open on both axes: `[min_x, max_x) × [min_y, max_y)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub min_x: f64,
    /// Bottom edge
    pub min_y: f64,
    /// Right edge (exclusive)
    pub max_x: f64,
    /// Top edge (exclusive)
    pub max_y: f64,
}

impl BoundingBox {
    /// Square footprint of side `extent` anchored at `origin`.
    pub fn square(origin: Position, extent: f64) -> Self {
        Self {
            min_x: origin.x,
            min_y: origin.y,
            max_x: origin.x + extent,
            max_y: origin.y + extent,
        }
    }

    /// Check whether two boxes share any area.
    ///
    /// Boxes that only touch along an edge do not intersect.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }

    /// Check whether this box lies within `[0, width) × [0, height)`.
    pub fn within(&self, size: Size) -> bool {
        self.min_x >= 0.0
            && self.min_y >= 0.0
            && self.max_x <= size.width as f64
            && self.max_y <= size.height as f64
    }
}

/// Radar scan arc.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanArc {
    /// Start angle in degrees
    pub start_angle: f64,
    /// Scan radius in arena units
    pub radius: f64,
}

impl ScanArc {
    /// Create a new arc.
    pub const fn new(start_angle: f64, radius: f64) -> Self {
        Self { start_angle, radius }
    }
}

/// Normalize an angle in degrees into [0, 360).
#[inline]
pub fn normalize_degrees(angle: f64) -> f64 {
    let a = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if a >= 360.0 { 0.0 } else { a }
}
