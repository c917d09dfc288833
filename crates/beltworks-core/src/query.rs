//! Read-only query API for inspecting simulation state.
//!
//! Snapshot types are owned copies with no references into world storage,
//! so renderers and UI code can hold them across ticks.

use beltworks_spatial::{Direction, GridPosition, GridRect};

use crate::fixed::Fixed64;
use crate::id::{BeltId, ItemTypeId, MachineId, SplitterId};
use crate::item::ItemAmount;

// ---------------------------------------------------------------------------
// Belt snapshot
// ---------------------------------------------------------------------------

/// Everything needed to draw one belt segment and its item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeltSnapshot {
    pub id: BeltId,
    pub position: GridPosition,
    pub direction: Direction,
    /// Used to pick a straight or a curved sprite.
    pub incoming_direction: Direction,
    pub carried_item: Option<ItemTypeId>,
    /// Cells travelled within this segment, `0..=1`.
    pub progress: Fixed64,
    pub blocked: bool,
}

// ---------------------------------------------------------------------------
// Splitter snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitterSnapshot {
    pub id: SplitterId,
    pub position: GridPosition,
    pub input_direction: Direction,
    pub carried_item: Option<ItemTypeId>,
    pub progress: Fixed64,
    pub next_output_index: usize,
    pub connected_outputs: Vec<(Direction, BeltId)>,
}

// ---------------------------------------------------------------------------
// Machine snapshot
// ---------------------------------------------------------------------------

/// A machine's state for progress bars and inventory panels.
///
/// `inputs` and `outputs` list one entry per recipe item in declaration
/// order, zero amounts included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineSnapshot {
    pub id: MachineId,
    pub class_name: String,
    pub recipe_name: String,
    pub rect: GridRect,
    pub processing: bool,
    pub process_timer: Fixed64,
    pub process_time: Fixed64,
    /// `process_timer / process_time`, 0 when idle.
    pub progress: Fixed64,
    pub inputs: Vec<ItemAmount>,
    pub outputs: Vec<ItemAmount>,
}
