//! Conveyor belt segments.
//!
//! A segment is one grid cell that carries at most one item. Progress is
//! measured in cells: an item needs `1 / speed` seconds to cross, and at
//! `progress >= 1` the world tries to hand it to whatever sits one cell
//! ahead. A failed hand-off clamps progress to exactly 1, which is the whole
//! backpressure mechanism.
//!
//! Segments never look at their neighbours themselves; the world resolves
//! adjacency through its index and drives the hand-off.

use beltworks_spatial::{Direction, GridPosition};
use serde::{Deserialize, Serialize};

use crate::fixed::{Fixed64, per_minute_to_per_second};
use crate::id::ItemTypeId;
use crate::item::ItemAmount;

/// A belt grade: throughput rating and per-segment cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeltTier {
    pub name: String,
    pub items_per_minute: u32,
    pub build_cost: Vec<ItemAmount>,
}

impl BeltTier {
    pub fn new(name: impl Into<String>, items_per_minute: u32, build_cost: Vec<ItemAmount>) -> Self {
        Self {
            name: name.into(),
            items_per_minute,
            build_cost,
        }
    }

    /// Cells per second.
    pub fn speed(&self) -> Fixed64 {
        per_minute_to_per_second(self.items_per_minute)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeltSegment {
    position: GridPosition,
    direction: Direction,
    incoming_direction: Direction,
    carried_item: Option<ItemTypeId>,
    progress: Fixed64,
    speed: Fixed64,
    tier: String,
    build_cost: Vec<ItemAmount>,
    blocked: bool,
    /// Set when an item lands here mid-tick so it is not stepped twice.
    #[serde(skip)]
    arrived: bool,
}

impl BeltSegment {
    pub fn new(
        position: GridPosition,
        direction: Direction,
        incoming_direction: Direction,
        tier: &BeltTier,
    ) -> Self {
        Self {
            position,
            direction,
            incoming_direction,
            carried_item: None,
            progress: Fixed64::ZERO,
            speed: tier.speed(),
            tier: tier.name.clone(),
            build_cost: tier.build_cost.clone(),
            blocked: false,
            arrived: false,
        }
    }

    pub fn position(&self) -> GridPosition {
        self.position
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The side the current (or last) item came in from. Renderers use it
    /// to draw corners.
    pub fn incoming_direction(&self) -> Direction {
        self.incoming_direction
    }

    pub fn carried_item(&self) -> Option<ItemTypeId> {
        self.carried_item
    }

    pub fn progress(&self) -> Fixed64 {
        self.progress
    }

    pub fn speed(&self) -> Fixed64 {
        self.speed
    }

    pub fn tier(&self) -> &str {
        &self.tier
    }

    pub fn build_cost(&self) -> &[ItemAmount] {
        &self.build_cost
    }

    /// Holding an item at the end of the cell that could not move on.
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn is_empty(&self) -> bool {
        self.carried_item.is_none()
    }

    /// The cell this segment delivers into.
    pub fn target_cell(&self) -> GridPosition {
        self.position.step(self.direction)
    }

    /// The cell this segment pulls machine output from.
    pub fn source_cell(&self) -> GridPosition {
        self.position.step_back(self.direction)
    }

    pub(crate) fn begin_tick(&mut self) {
        self.arrived = false;
    }

    /// Whether the current item landed here during the running tick.
    pub fn arrived_this_tick(&self) -> bool {
        self.arrived
    }

    /// Move the carried item forward. Returns `true` when it has reached the
    /// end of the cell and should be handed off.
    pub(crate) fn advance(&mut self, dt: Fixed64) -> bool {
        if self.carried_item.is_none() || self.arrived {
            return false;
        }
        self.progress = self.progress.saturating_add(self.speed.saturating_mul(dt));
        self.progress >= Fixed64::ONE
    }

    /// Hold the item at the cell edge after a failed hand-off. Returns
    /// `true` only on the transition into the blocked state.
    pub(crate) fn block(&mut self) -> bool {
        self.progress = Fixed64::ONE;
        let newly = !self.blocked;
        self.blocked = true;
        newly
    }

    /// Give up the carried item after a successful hand-off.
    pub(crate) fn release(&mut self) -> Option<ItemTypeId> {
        self.progress = Fixed64::ZERO;
        self.blocked = false;
        self.carried_item.take()
    }

    /// Accept an item from `from`. Fails if something is already here or if
    /// this segment runs straight back against the sender.
    pub fn receive(&mut self, item: ItemTypeId, from: Direction) -> bool {
        if self.carried_item.is_some() || self.direction.is_opposite_of(from) {
            return false;
        }
        self.carried_item = Some(item);
        self.incoming_direction = from;
        self.progress = Fixed64::ZERO;
        self.blocked = false;
        self.arrived = true;
        true
    }

    /// Take an item pulled out of the machine behind this segment.
    pub(crate) fn load_pulled(&mut self, item: ItemTypeId) {
        self.carried_item = Some(item);
        self.incoming_direction = self.direction;
        self.progress = Fixed64::ZERO;
        self.blocked = false;
        self.arrived = true;
    }
}

/// Cells of an L-shaped drag from `start` to `end`, both included: along
/// one axis first, then the other. The result is always a valid belt run.
pub fn drag_path(start: GridPosition, end: GridPosition, horizontal_first: bool) -> Vec<GridPosition> {
    let dx = if end.x >= start.x { 1 } else { -1 };
    let dy = if end.y >= start.y { 1 } else { -1 };
    let mut cells = Vec::new();
    if horizontal_first {
        let mut x = start.x;
        loop {
            cells.push(GridPosition::new(x, start.y));
            if x == end.x {
                break;
            }
            x += dx;
        }
        let mut y = start.y;
        while y != end.y {
            y += dy;
            cells.push(GridPosition::new(end.x, y));
        }
    } else {
        let mut y = start.y;
        loop {
            cells.push(GridPosition::new(start.x, y));
            if y == end.y {
                break;
            }
            y += dy;
        }
        let mut x = start.x;
        while x != end.x {
            x += dx;
            cells.push(GridPosition::new(x, end.y));
        }
    }
    cells
}
