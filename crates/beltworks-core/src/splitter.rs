//! Round-robin splitters.
//!
//! A splitter takes items travelling in its `input_direction` and deals them
//! out over the belts bound to its three other sides, in the fixed order
//! left turn, straight, right turn. The output cursor moves on after every
//! attempt, successful or not, so a jammed output never starves the rest.

use beltworks_spatial::{Direction, GridPosition};
use serde::{Deserialize, Serialize};

use crate::fixed::{Fixed64, per_minute_to_per_second};
use crate::id::{BeltId, ItemTypeId};
use crate::item::ItemAmount;

/// Stock splitter throughput in items per minute.
pub const SPLITTER_ITEMS_PER_MINUTE: u32 = 120;

/// A splitter grade: throughput and build cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitterKind {
    pub name: String,
    pub items_per_minute: u32,
    pub build_cost: Vec<ItemAmount>,
}

impl SplitterKind {
    pub fn new(name: impl Into<String>, items_per_minute: u32, build_cost: Vec<ItemAmount>) -> Self {
        Self {
            name: name.into(),
            items_per_minute,
            build_cost,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Splitter {
    position: GridPosition,
    input_direction: Direction,
    carried_item: Option<ItemTypeId>,
    progress: Fixed64,
    speed: Fixed64,
    next_output_index: usize,
    connected_outputs: Vec<(Direction, BeltId)>,
    build_cost: Vec<ItemAmount>,
    #[serde(skip)]
    arrived: bool,
}

impl Splitter {
    pub fn new(position: GridPosition, input_direction: Direction, kind: &SplitterKind) -> Self {
        Self {
            position,
            input_direction,
            carried_item: None,
            progress: Fixed64::ZERO,
            speed: per_minute_to_per_second(kind.items_per_minute),
            next_output_index: 0,
            connected_outputs: Vec::new(),
            build_cost: kind.build_cost.clone(),
            arrived: false,
        }
    }

    pub fn position(&self) -> GridPosition {
        self.position
    }

    /// Direction items travel when they enter.
    pub fn input_direction(&self) -> Direction {
        self.input_direction
    }

    /// Candidate output sides: left turn, straight, right turn.
    pub fn output_directions(&self) -> [Direction; 3] {
        let d = self.input_direction;
        [d.turn_left(), d, d.turn_right()]
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

    pub fn next_output_index(&self) -> usize {
        self.next_output_index
    }

    /// Bound output belts, in output-direction order.
    pub fn connected_outputs(&self) -> &[(Direction, BeltId)] {
        &self.connected_outputs
    }

    pub fn build_cost(&self) -> &[ItemAmount] {
        &self.build_cost
    }

    pub fn is_empty(&self) -> bool {
        self.carried_item.is_none()
    }

    /// Accept an item only from the input side and only when empty.
    pub fn receive(&mut self, item: ItemTypeId, from: Direction) -> bool {
        if self.carried_item.is_some() || from != self.input_direction {
            return false;
        }
        self.carried_item = Some(item);
        self.progress = Fixed64::ZERO;
        self.arrived = true;
        true
    }

    /// Replace the bound outputs. The cursor falls back to the first output
    /// if it no longer points at one.
    pub(crate) fn bind_outputs(&mut self, outputs: Vec<(Direction, BeltId)>) {
        self.connected_outputs = outputs;
        if self.next_output_index >= self.connected_outputs.len() {
            self.next_output_index = 0;
        }
    }

    /// Turn the input side a quarter turn clockwise. Outputs must be rebound
    /// afterwards.
    pub(crate) fn rotate(&mut self) {
        self.input_direction = self.input_direction.turn_right();
    }

    pub(crate) fn begin_tick(&mut self) {
        self.arrived = false;
    }

    /// Move the held item across. `true` once it is ready to leave.
    pub(crate) fn advance(&mut self, dt: Fixed64) -> bool {
        if self.carried_item.is_none() || self.arrived {
            return false;
        }
        self.progress = self.progress.saturating_add(self.speed.saturating_mul(dt));
        self.progress >= Fixed64::ONE
    }

    /// The output to try next. Advances the cursor whatever the outcome.
    pub(crate) fn next_candidate(&mut self) -> Option<(Direction, BeltId)> {
        if self.connected_outputs.is_empty() {
            return None;
        }
        let index = self.next_output_index % self.connected_outputs.len();
        self.next_output_index = (index + 1) % self.connected_outputs.len();
        Some(self.connected_outputs[index])
    }

    pub(crate) fn hold(&mut self) {
        self.progress = Fixed64::ONE;
    }

    pub(crate) fn release(&mut self) -> Option<ItemTypeId> {
        self.progress = Fixed64::ZERO;
        self.carried_item.take()
    }
}
