//! Grid primitives and the spatial index for building placement, adjacency,
//! and collision queries.
//!
//! Everything here is keyed by whole grid cells. The index maps each occupied
//! cell to an occupant handle `T` and each occupant back to the rectangle it
//! covers, so both "what is at this cell" and "where is this occupant" are
//! O(1) lookups.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A position on the 2D grid. `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The adjacent cell one step in `dir`.
    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.offset();
        Self::new(self.x + dx, self.y + dy)
    }

    /// The adjacent cell one step against `dir`.
    pub fn step_back(self, dir: Direction) -> Self {
        self.step(dir.opposite())
    }

    /// Manhattan distance to another position.
    pub fn manhattan_distance(&self, other: &GridPosition) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    /// Direction of a single orthogonal step from `self` to `other`, if the
    /// two cells are 4-adjacent.
    pub fn direction_to(&self, other: &GridPosition) -> Option<Direction> {
        Direction::from_offset(other.x - self.x, other.y - self.y)
    }
}

impl std::fmt::Display for GridPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cardinal directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// All four cardinal directions, clockwise from north.
    pub fn all() -> [Direction; 4] {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
    }

    /// Offset for this direction.
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    /// Unit offset back to a direction. Anything that is not a unit
    /// orthogonal step yields `None`.
    pub fn from_offset(dx: i32, dy: i32) -> Option<Direction> {
        match (dx, dy) {
            (0, -1) => Some(Direction::North),
            (1, 0) => Some(Direction::East),
            (0, 1) => Some(Direction::South),
            (-1, 0) => Some(Direction::West),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Rotate 90 degrees counter-clockwise.
    pub fn turn_left(self) -> Self {
        match self {
            Direction::North => Direction::West,
            Direction::East => Direction::North,
            Direction::South => Direction::East,
            Direction::West => Direction::South,
        }
    }

    /// Rotate 90 degrees clockwise.
    pub fn turn_right(self) -> Self {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }

    pub fn is_opposite_of(self, other: Direction) -> bool {
        self.opposite() == other
    }
}

/// The footprint (size) of a building on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    pub width: u32,
    pub height: u32,
}

impl Footprint {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A 1x1 footprint.
    pub fn single() -> Self {
        Self::new(1, 1)
    }

    /// Iterate over all tiles covered at the given origin, row-major.
    /// Origin is the top-left corner.
    pub fn tiles(&self, origin: GridPosition) -> impl Iterator<Item = GridPosition> {
        let w = self.width as i32;
        let h = self.height as i32;
        let ox = origin.x;
        let oy = origin.y;
        (0..h).flat_map(move |dy| (0..w).map(move |dx| GridPosition::new(ox + dx, oy + dy)))
    }
}

/// An axis-aligned rectangle of whole cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridRect {
    pub origin: GridPosition,
    pub footprint: Footprint,
}

impl GridRect {
    pub fn new(origin: GridPosition, footprint: Footprint) -> Self {
        Self { origin, footprint }
    }

    /// A single-cell rect.
    pub fn cell(position: GridPosition) -> Self {
        Self::new(position, Footprint::single())
    }

    pub fn tiles(&self) -> impl Iterator<Item = GridPosition> {
        self.footprint.tiles(self.origin)
    }

    /// Exclusive right edge.
    fn max_x(&self) -> i32 {
        self.origin.x + self.footprint.width as i32
    }

    /// Exclusive bottom edge.
    fn max_y(&self) -> i32 {
        self.origin.y + self.footprint.height as i32
    }

    pub fn is_empty(&self) -> bool {
        self.footprint.width == 0 || self.footprint.height == 0
    }

    pub fn contains(&self, pos: GridPosition) -> bool {
        pos.x >= self.origin.x && pos.x < self.max_x() && pos.y >= self.origin.y && pos.y < self.max_y()
    }

    pub fn overlaps(&self, other: &GridRect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.origin.x < other.max_x()
            && other.origin.x < self.max_x()
            && self.origin.y < other.max_y()
            && other.origin.y < self.max_y()
    }
}

/// Errors from spatial operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpatialError {
    #[error("cell {0} is occupied")]
    Occupied(GridPosition),
    #[error("occupant is not placed on the grid")]
    NotPlaced,
    #[error("occupant is already placed on the grid")]
    AlreadyPlaced,
}

// ---------------------------------------------------------------------------
// SpatialIndex
// ---------------------------------------------------------------------------

/// A spatial index mapping grid cells to occupants.
///
/// Maintains a bidirectional mapping:
/// - `tiles`: cell -> occupant
/// - `rects`: occupant -> covered rectangle
///
/// The index never owns occupant state; `T` is a cheap handle.
#[derive(Debug, Clone)]
pub struct SpatialIndex<T> {
    tiles: HashMap<GridPosition, T>,
    rects: HashMap<T, GridRect>,
}

impl<T> Default for SpatialIndex<T> {
    fn default() -> Self {
        Self {
            tiles: HashMap::new(),
            rects: HashMap::new(),
        }
    }
}

impl<T: Copy + Eq + Hash> SpatialIndex<T> {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Placement --

    /// Place an occupant covering `rect`. Fails without mutating anything if
    /// any covered cell is taken.
    pub fn place(&mut self, occupant: T, rect: GridRect) -> Result<(), SpatialError> {
        if self.rects.contains_key(&occupant) {
            return Err(SpatialError::AlreadyPlaced);
        }
        if let Some(taken) = rect.tiles().find(|tile| self.tiles.contains_key(tile)) {
            return Err(SpatialError::Occupied(taken));
        }

        for tile in rect.tiles() {
            self.tiles.insert(tile, occupant);
        }
        self.rects.insert(occupant, rect);
        Ok(())
    }

    /// Remove an occupant from the grid. Returns the rect it covered.
    pub fn remove(&mut self, occupant: T) -> Result<GridRect, SpatialError> {
        let rect = self.rects.remove(&occupant).ok_or(SpatialError::NotPlaced)?;
        for tile in rect.tiles() {
            self.tiles.remove(&tile);
        }
        Ok(rect)
    }

    /// Check whether every cell of `rect` is free.
    pub fn can_place(&self, rect: GridRect) -> bool {
        rect.tiles().all(|tile| !self.tiles.contains_key(&tile))
    }

    // -- Point queries --

    /// The occupant covering a cell.
    pub fn occupant_at(&self, pos: GridPosition) -> Option<T> {
        self.tiles.get(&pos).copied()
    }

    /// The rect an occupant covers.
    pub fn rect_of(&self, occupant: T) -> Option<GridRect> {
        self.rects.get(&occupant).copied()
    }

    pub fn is_occupied(&self, pos: GridPosition) -> bool {
        self.tiles.contains_key(&pos)
    }

    /// True if any cell of `rect` is occupied.
    pub fn is_blocked(&self, rect: GridRect) -> bool {
        !self.can_place(rect)
    }

    // -- Area queries --

    /// Unique occupants touching `rect`, in row-major order of first contact.
    pub fn occupants_in_rect(&self, rect: GridRect) -> Vec<T> {
        let mut result: Vec<T> = Vec::new();
        for tile in rect.tiles() {
            if let Some(&occupant) = self.tiles.get(&tile)
                && !result.contains(&occupant)
            {
                result.push(occupant);
            }
        }
        result
    }

    // -- Adjacency --

    /// The first occupant found directly beyond the `dir` edge of an
    /// occupant's rect.
    pub fn neighbor_in_direction(&self, occupant: T, dir: Direction) -> Option<T> {
        let rect = self.rects.get(&occupant)?;
        rect.tiles()
            .map(|tile| tile.step(dir))
            .filter(|pos| !rect.contains(*pos))
            .find_map(|pos| self.tiles.get(&pos).copied())
    }

    // -- Stats --

    /// Number of occupants placed on the grid.
    pub fn occupant_count(&self) -> usize {
        self.rects.len()
    }

    /// Total number of occupied tiles.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }
}
