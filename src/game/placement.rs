//! Initial Placement
//!
//! Seats every bot of a round at a position where no two footprints overlap.
//!
//! The arena is cut into a grid of `GRID_CELL_SIZE` cells. Each bot claims a
//! distinct random cell (rejection sampling against the cells already taken),
//! then gets a uniformly random offset inside that cell, shrunk by the
//! footprint so the bot cannot reach into a neighbouring cell. Distinct cells
//! plus the shrunk offset make overlap impossible, and the offset keeps bots
//! from lining up on the grid.

use std::collections::BTreeSet;

use crate::core::geometry::Position;
use crate::core::rng::DeterministicRng;
use crate::game::bot::BotId;
use crate::game::setup::{Arena, ConfigurationError};
use crate::BOT_FOOTPRINT;

/// Grid the arena is partitioned into.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementGrid {
    columns: u64,
    rows: u64,
    cell_width: f64,
    cell_height: f64,
}

impl PlacementGrid {
    /// Partition `arena` into placement cells.
    ///
    /// Fails when the arena has fewer cells than `bot_count`; this is a
    /// configuration problem, never something to retry.
    pub fn new(arena: Arena, bot_count: usize) -> Result<Self, ConfigurationError> {
        let (columns, rows) = arena.grid_dimensions();
        let capacity = arena.cell_capacity();

        if columns == 0 || rows == 0 || capacity < bot_count as u64 {
            return Err(ConfigurationError::ArenaTooSmall {
                width: arena.width(),
                height: arena.height(),
                capacity,
                participants: bot_count,
            });
        }

        Ok(Self {
            columns: columns as u64,
            rows: rows as u64,
            cell_width: (arena.width() / columns) as f64,
            cell_height: (arena.height() / rows) as f64,
        })
    }

    /// Number of cells.
    #[inline]
    pub fn cell_count(&self) -> u64 {
        self.columns * self.rows
    }

    /// Lower-left corner of a cell.
    #[inline]
    pub fn cell_origin(&self, cell: u64) -> Position {
        let row = cell / self.columns;
        let column = cell % self.columns;
        Position::new(column as f64 * self.cell_width, row as f64 * self.cell_height)
    }

    /// Random position inside `cell` whose footprint stays inside the cell.
    fn jittered_position(&self, cell: u64, rng: &mut DeterministicRng) -> Position {
        let origin = self.cell_origin(cell);
        let footprint = BOT_FOOTPRINT as f64;

        Position::new(
            origin.x + rng.next_f64_range(0.0, self.cell_width - footprint),
            origin.y + rng.next_f64_range(0.0, self.cell_height - footprint),
        )
    }
}

/// Claims cells for bots one at a time.
///
/// Used by round initialization so that position and heading draws for a
/// bot stay adjacent in the random stream.
#[derive(Debug)]
pub struct Placer {
    grid: PlacementGrid,
    occupied: BTreeSet<u64>,
}

impl Placer {
    /// Create a placer for `bot_count` bots.
    pub fn new(arena: Arena, bot_count: usize) -> Result<Self, ConfigurationError> {
        Ok(Self {
            grid: PlacementGrid::new(arena, bot_count)?,
            occupied: BTreeSet::new(),
        })
    }

    /// Claim a free cell and return a position in it.
    ///
    /// Returns `None` once every cell is taken.
    pub fn next_position(&mut self, rng: &mut DeterministicRng) -> Option<Position> {
        let cell_count = self.grid.cell_count();
        if self.occupied.len() as u64 >= cell_count {
            return None;
        }

        // Pool of free cells shrinks by one per claim, so this terminates
        let cell = loop {
            let candidate = rng.next_int(cell_count);
            if self.occupied.insert(candidate) {
                break candidate;
            }
        };

        Some(self.grid.jittered_position(cell, rng))
    }
}

/// Place all `bots` in `arena`.
///
/// Returns one position per bot, in the order given.
pub fn place_bots(
    arena: Arena,
    bots: &[BotId],
    rng: &mut DeterministicRng,
) -> Result<Vec<(BotId, Position)>, ConfigurationError> {
    let mut placer = Placer::new(arena, bots.len())?;
    let mut placed = Vec::with_capacity(bots.len());

    for &id in bots {
        let position = placer.next_position(rng).ok_or(ConfigurationError::ArenaTooSmall {
            width: arena.width(),
            height: arena.height(),
            capacity: arena.cell_capacity(),
            participants: bots.len(),
        })?;
        placed.push((id, position));
    }

    Ok(placed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::BoundingBox;
    use proptest::prelude::*;

    fn ids(n: u32) -> Vec<BotId> {
        (1..=n).map(BotId).collect()
    }

    fn assert_valid(arena: Arena, placed: &[(BotId, Position)]) {
        let boxes: Vec<BoundingBox> = placed
            .iter()
            .map(|(_, p)| BoundingBox::square(*p, BOT_FOOTPRINT as f64))
            .collect();

        for (i, a) in boxes.iter().enumerate() {
            assert!(a.within(arena.size), "footprint {:?} leaves arena", a);
            for b in boxes.iter().skip(i + 1) {
                assert!(!a.intersects(b), "footprints {:?} and {:?} overlap", a, b);
            }
        }
    }

    #[test]
    fn test_two_bots_small_arena() {
        let arena = Arena::new(200, 100);
        let mut rng = DeterministicRng::new(1);

        let placed = place_bots(arena, &ids(2), &mut rng).unwrap();
        assert_eq!(placed.len(), 2);
        assert_valid(arena, &placed);

        for (_, p) in &placed {
            assert!((0.0..200.0).contains(&p.x));
            assert!((0.0..100.0).contains(&p.y));
        }
    }

    #[test]
    fn test_arena_too_small() {
        let mut rng = DeterministicRng::new(1);
        let err = place_bots(Arena::new(50, 50), &ids(3), &mut rng).unwrap_err();
        assert!(matches!(err, ConfigurationError::ArenaTooSmall { capacity: 0, participants: 3, .. }));
    }

    #[test]
    fn test_full_grid_uses_every_cell() {
        let arena = Arena::new(300, 300);
        let mut rng = DeterministicRng::new(99);

        let placed = place_bots(arena, &ids(9), &mut rng).unwrap();
        assert_valid(arena, &placed);

        let mut cells: Vec<(u64, u64)> = placed
            .iter()
            .map(|(_, p)| ((p.x / 100.0) as u64, (p.y / 100.0) as u64))
            .collect();
        cells.sort_unstable();
        cells.dedup();
        assert_eq!(cells.len(), 9);
    }

    #[test]
    fn test_placer_exhausts() {
        let mut placer = Placer::new(Arena::new(100, 100), 1).unwrap();
        let mut rng = DeterministicRng::new(3);

        assert!(placer.next_position(&mut rng).is_some());
        assert!(placer.next_position(&mut rng).is_none());
    }

    #[test]
    fn test_uneven_cells_use_integer_cell_size() {
        // 250 / 2 columns = 125 wide cells
        let grid = PlacementGrid::new(Arena::new(250, 100), 2).unwrap();
        assert_eq!(grid.cell_count(), 2);
        assert_eq!(grid.cell_origin(1), Position::new(125.0, 0.0));
    }

    #[test]
    fn test_placement_determinism() {
        let arena = Arena::new(800, 600);
        let a = place_bots(arena, &ids(10), &mut DeterministicRng::new(42)).unwrap();
        let b = place_bots(arena, &ids(10), &mut DeterministicRng::new(42)).unwrap();
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn prop_placements_never_overlap(
            width in 100u32..1500,
            height in 100u32..1500,
            seed in any::<u64>(),
            fill in 0.0f64..=1.0,
        ) {
            let arena = Arena::new(width, height);
            let capacity = arena.cell_capacity() as u32;
            let n = ((capacity as f64 * fill).ceil() as u32).clamp(1, capacity);

            let mut rng = DeterministicRng::new(seed);
            let placed = place_bots(arena, &ids(n), &mut rng).unwrap();

            prop_assert_eq!(placed.len(), n as usize);
            assert_valid(arena, &placed);
        }

        #[test]
        fn prop_overfull_arena_is_rejected(
            width in 1u32..800,
            height in 1u32..800,
            extra in 1u32..5,
        ) {
            let arena = Arena::new(width, height);
            let n = arena.cell_capacity() as u32 + extra;
            let mut rng = DeterministicRng::new(0);

            let is_too_small = matches!(
                place_bots(arena, &ids(n), &mut rng),
                Err(ConfigurationError::ArenaTooSmall { .. })
            );
            prop_assert!(is_too_small);
        }
    }
}
