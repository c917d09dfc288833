//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use beltworks_spatial::{Direction, Footprint, GridPosition};

use crate::belt::BeltTier;
use crate::fixed::Fixed64;
use crate::id::*;
use crate::inventory::ItemLedger;
use crate::item::ItemAmount;
use crate::machine::MachineClass;
use crate::recipe::Recipe;
use crate::sim::TickReport;
use crate::splitter::{SPLITTER_ITEMS_PER_MINUTE, SplitterKind};
use crate::world::World;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

pub fn pos(x: i32, y: i32) -> GridPosition {
    GridPosition::new(x, y)
}

// ===========================================================================
// Item constructors
// ===========================================================================

pub fn ore() -> ItemTypeId {
    ItemTypeId(0)
}
pub fn ingot() -> ItemTypeId {
    ItemTypeId(1)
}
pub fn plate() -> ItemTypeId {
    ItemTypeId(2)
}
pub fn coal() -> ItemTypeId {
    ItemTypeId(3)
}
pub fn steel() -> ItemTypeId {
    ItemTypeId(4)
}

// ===========================================================================
// Recipes and classes
// ===========================================================================

pub fn recipe(name: &str, inputs: &[(ItemTypeId, u32)], outputs: &[(ItemTypeId, u32)], secs: f64) -> Recipe {
    Recipe::new(
        name,
        inputs.iter().map(|&(item, n)| ItemAmount::new(item, n)),
        outputs.iter().map(|&(item, n)| ItemAmount::new(item, n)),
        fixed(secs),
    )
    .expect("test recipe must be valid")
}

/// 3 ore -> 1 ingot in 2 s.
pub fn smelt_recipe() -> Recipe {
    recipe("Smelt", &[(ore(), 3)], &[(ingot(), 1)], 2.0)
}

/// 2 ingot -> 1 plate in 1 s.
pub fn plate_recipe() -> Recipe {
    recipe("Plate", &[(ingot(), 2)], &[(plate(), 1)], 1.0)
}

/// No inputs, one `item` every `secs` seconds.
pub fn source_recipe(item: ItemTypeId, secs: f64) -> Recipe {
    recipe("Source", &[], &[(item, 1)], secs)
}

/// A free 3x3 class offering `recipes`.
pub fn machine_class(name: &str, recipes: Vec<Recipe>) -> MachineClass {
    MachineClass {
        name: name.to_string(),
        footprint: Footprint::new(3, 3),
        build_cost: Vec::new(),
        recipes,
    }
}

pub fn free_belt() -> BeltTier {
    BeltTier::new("basic", 120, Vec::new())
}

pub fn free_splitter() -> SplitterKind {
    SplitterKind::new("splitter", SPLITTER_ITEMS_PER_MINUTE, Vec::new())
}

/// A ledger holding `n` of each listed item.
pub fn ledger_with(items: &[ItemTypeId], n: u32) -> ItemLedger {
    let amounts: Vec<ItemAmount> = items.iter().map(|&item| ItemAmount::new(item, n)).collect();
    ItemLedger::with_items(&amounts)
}

// ===========================================================================
// World builders
// ===========================================================================

/// A straight free belt run of `len` cells from `start` heading `dir`.
pub fn belt_line(world: &mut World, start: GridPosition, len: usize, dir: Direction) -> Vec<BeltId> {
    let mut cells = Vec::with_capacity(len);
    let mut cell = start;
    for _ in 0..len {
        cells.push(cell);
        cell = cell.step(dir);
    }
    world
        .place_belt_run(&cells, dir, &free_belt(), &mut ItemLedger::new())
        .expect("belt line must fit")
}

/// Handles of a [`source_line`].
#[derive(Debug, Clone)]
pub struct SourceLine {
    pub source: MachineId,
    pub belts: Vec<BeltId>,
    pub sink: MachineId,
}

/// An ore source at `origin`, `belt_len` belts heading east from its middle
/// row, and a smelter on the far end.
///
/// ```text
///   SSS           MMM
///   SSS > > > ... MMM
///   SSS           MMM
/// ```
pub fn source_line(world: &mut World, origin: GridPosition, belt_len: usize, source_secs: f64) -> SourceLine {
    let mut payer = ItemLedger::new();
    let source = world
        .place_machine(
            &machine_class("Source", vec![source_recipe(ore(), source_secs)]),
            origin,
            &mut payer,
        )
        .expect("source must fit");
    let belt_start = pos(origin.x + 3, origin.y + 1);
    let belts = belt_line(world, belt_start, belt_len, Direction::East);
    let sink = world
        .place_machine(
            &machine_class("Smelter", vec![smelt_recipe()]),
            pos(belt_start.x + belt_len as i32, origin.y),
            &mut payer,
        )
        .expect("smelter must fit");
    SourceLine { source, belts, sink }
}

/// Run `n` ticks of `dt` seconds, merging the reports.
pub fn run_ticks(world: &mut World, n: usize, dt: f64) -> TickReport {
    let mut report = TickReport::default();
    for _ in 0..n {
        report.merge(world.tick(fixed(dt)).expect("tick must not violate invariants"));
    }
    report
}

/// Count of `item` held anywhere in the world.
pub fn total_of(world: &World, item: ItemTypeId) -> u64 {
    world.item_totals().get(&item).copied().unwrap_or(0)
}
