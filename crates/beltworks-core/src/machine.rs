//! Recipe-driven production machines.
//!
//! A machine owns one single-slot inventory per recipe input item and one per
//! recipe output item, both kept in the recipe's declaration order. Each tick
//! it runs a two-state machine:
//!
//! ```text
//!   Idle --(inputs held && outputs fit)--> Processing
//!   Processing --(timer >= process_time)--> Idle   [consume, produce]
//! ```
//!
//! The start condition is re-checked on every idle tick, and the tick that
//! starts a cycle already counts toward it.

use beltworks_spatial::{Footprint, GridPosition, GridRect};
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::fixed::Fixed64;
use crate::id::ItemTypeId;
use crate::inventory::{ItemSink, SlottedInventory};
use crate::item::{ItemAmount, StackLimits, merge_amounts};
use crate::recipe::Recipe;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Processing state of a machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineState {
    #[default]
    Idle,
    Processing,
}

/// What happened to a machine during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MachineTickResult {
    /// A cycle began this tick.
    pub started: bool,
    /// A cycle finished this tick.
    pub completed: bool,
    pub consumed: Vec<ItemAmount>,
    pub produced: Vec<ItemAmount>,
}

/// A per-item slot bound to a recipe entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSlot {
    pub item: ItemTypeId,
    pub inventory: SlottedInventory,
}

fn slots_for(amounts: &[ItemAmount], stack_size: u32, limits: &StackLimits) -> Vec<ItemSlot> {
    amounts
        .iter()
        .map(|a| ItemSlot {
            item: a.item,
            inventory: SlottedInventory::single(limits.cap(a.item, stack_size)),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Machine classes
// ---------------------------------------------------------------------------

/// A placeable machine type. The first recipe is the one a new machine
/// starts with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineClass {
    pub name: String,
    pub footprint: Footprint,
    pub build_cost: Vec<ItemAmount>,
    pub recipes: Vec<Recipe>,
}

impl MachineClass {
    pub fn default_recipe(&self) -> Option<&Recipe> {
        self.recipes.first()
    }

    pub fn recipe(&self, name: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.name() == name)
    }
}

// ---------------------------------------------------------------------------
// ProductionMachine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductionMachine {
    class_name: String,
    rect: GridRect,
    build_cost: Vec<ItemAmount>,
    /// Recipes the player may pick from.
    available_recipes: Vec<Recipe>,
    recipe: Recipe,
    stack_size: u32,
    limits: StackLimits,
    inputs: Vec<ItemSlot>,
    outputs: Vec<ItemSlot>,
    state: MachineState,
    process_timer: Fixed64,
}

impl ProductionMachine {
    /// A new idle machine with empty inventories shaped to `recipe`.
    pub fn new(
        class_name: impl Into<String>,
        rect: GridRect,
        build_cost: Vec<ItemAmount>,
        recipe: Recipe,
        stack_size: u32,
    ) -> Self {
        let limits = StackLimits::default();
        let inputs = slots_for(recipe.inputs(), stack_size, &limits);
        let outputs = slots_for(recipe.outputs(), stack_size, &limits);
        Self {
            class_name: class_name.into(),
            rect,
            build_cost,
            available_recipes: vec![recipe.clone()],
            recipe,
            stack_size,
            limits,
            inputs,
            outputs,
            state: MachineState::Idle,
            process_timer: Fixed64::ZERO,
        }
    }

    /// A machine of `class` with its top-left corner at `origin`, running
    /// the class's first recipe.
    pub fn from_class(class: &MachineClass, origin: GridPosition, stack_size: u32) -> Result<Self, SimError> {
        if class.footprint.width == 0 || class.footprint.height == 0 {
            return Err(SimError::EmptyFootprint {
                name: class.name.clone(),
            });
        }
        let recipe = class.default_recipe().ok_or_else(|| SimError::EmptyMachineClass {
            name: class.name.clone(),
        })?;
        let mut machine = Self::new(
            class.name.clone(),
            GridRect::new(origin, class.footprint),
            class.build_cost.clone(),
            recipe.clone(),
            stack_size,
        );
        machine.available_recipes = class.recipes.clone();
        Ok(machine)
    }

    /// Cap each slot at its item's own stack size where that is lower.
    /// Reshapes the (empty) slots, so call it before filling the machine.
    pub fn with_stack_limits(mut self, limits: StackLimits) -> Self {
        self.inputs = slots_for(self.recipe.inputs(), self.stack_size, &limits);
        self.outputs = slots_for(self.recipe.outputs(), self.stack_size, &limits);
        self.limits = limits;
        self
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn rect(&self) -> GridRect {
        self.rect
    }

    /// Top-left cell of the footprint.
    pub fn position(&self) -> GridPosition {
        self.rect.origin
    }

    pub fn build_cost(&self) -> &[ItemAmount] {
        &self.build_cost
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn available_recipes(&self) -> &[Recipe] {
        &self.available_recipes
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn is_processing(&self) -> bool {
        self.state == MachineState::Processing
    }

    pub fn process_timer(&self) -> Fixed64 {
        self.process_timer
    }

    pub fn process_time(&self) -> Fixed64 {
        self.recipe.process_time()
    }

    /// Fraction of the current cycle done, in `[0, 1]`. Zero while idle.
    pub fn progress(&self) -> Fixed64 {
        if !self.is_processing() {
            return Fixed64::ZERO;
        }
        (self.process_timer / self.recipe.process_time()).min(Fixed64::ONE)
    }

    /// Input slots in recipe declaration order.
    pub fn inputs(&self) -> &[ItemSlot] {
        &self.inputs
    }

    /// Output slots in recipe declaration order.
    pub fn outputs(&self) -> &[ItemSlot] {
        &self.outputs
    }

    pub fn input_inventory(&self, item: ItemTypeId) -> Option<&SlottedInventory> {
        self.inputs
            .iter()
            .find(|slot| slot.item == item)
            .map(|slot| &slot.inventory)
    }

    pub fn output_inventory(&self, item: ItemTypeId) -> Option<&SlottedInventory> {
        self.outputs
            .iter()
            .find(|slot| slot.item == item)
            .map(|slot| &slot.inventory)
    }

    /// Everything currently held, inputs before outputs.
    pub fn contents(&self) -> Vec<ItemAmount> {
        merge_amounts(
            self.inputs
                .iter()
                .chain(self.outputs.iter())
                .flat_map(|slot| slot.inventory.contents()),
        )
    }

    /// Put `amount` of `item` into its input slot. Fails whole if the recipe
    /// does not take the item or the slot cannot hold it all.
    pub fn insert_input(&mut self, item: ItemTypeId, amount: u32) -> bool {
        match self.inputs.iter_mut().find(|slot| slot.item == item) {
            Some(slot) => slot.inventory.try_add(item, amount),
            None => false,
        }
    }

    /// Whether a cycle could start now: every input held in full and every
    /// output has room for what the cycle makes.
    pub fn can_process(&self) -> bool {
        let inputs_ready = self.recipe.inputs().iter().all(|req| {
            self.input_inventory(req.item)
                .is_some_and(|inv| inv.get_amount(req.item) >= req.quantity)
        });
        let outputs_fit = self.recipe.outputs().iter().all(|out| {
            self.output_inventory(out.item)
                .is_some_and(|inv| inv.can_add(out.item, out.quantity))
        });
        inputs_ready && outputs_fit
    }

    /// The first output item with stock, in declaration order. Unless
    /// `peek`, one unit of it is taken out.
    pub fn push_output_item(&mut self, peek: bool) -> Option<ItemTypeId> {
        let slot = self
            .outputs
            .iter_mut()
            .find(|slot| slot.inventory.get_amount(slot.item) > 0)?;
        if !peek {
            slot.inventory.remove(slot.item, 1);
        }
        Some(slot.item)
    }

    /// Advance the state machine by `dt` seconds.
    ///
    /// Fails only when a finishing cycle cannot consume or produce what the
    /// start check promised, which means the machine's own bookkeeping is
    /// broken.
    pub fn advance(&mut self, dt: Fixed64) -> Result<MachineTickResult, SimError> {
        let mut result = MachineTickResult::default();

        if self.state == MachineState::Idle {
            if !self.can_process() {
                return Ok(result);
            }
            self.state = MachineState::Processing;
            self.process_timer = Fixed64::ZERO;
            result.started = true;
        }

        self.process_timer = self.process_timer.saturating_add(dt);
        if self.process_timer < self.recipe.process_time() {
            return Ok(result);
        }

        for req in self.recipe.inputs() {
            let removed = self
                .inputs
                .iter_mut()
                .find(|slot| slot.item == req.item)
                .is_some_and(|slot| slot.inventory.remove(req.item, req.quantity));
            if !removed {
                return Err(self.violation(format!(
                    "could not consume {} x{} on completion",
                    req.item, req.quantity
                )));
            }
        }
        for out in self.recipe.outputs() {
            let added = self
                .outputs
                .iter_mut()
                .find(|slot| slot.item == out.item)
                .is_some_and(|slot| slot.inventory.try_add(out.item, out.quantity));
            if !added {
                return Err(self.violation(format!(
                    "could not store {} x{} on completion",
                    out.item, out.quantity
                )));
            }
        }

        result.consumed = self.recipe.inputs().to_vec();
        result.produced = self.recipe.outputs().to_vec();
        result.completed = true;
        self.state = MachineState::Idle;
        self.process_timer = Fixed64::ZERO;
        Ok(result)
    }

    fn violation(&self, detail: String) -> SimError {
        let detail = format!("{} '{}' at {}: {detail}", self.class_name, self.recipe.name(), self.rect.origin);
        log::error!("{detail}");
        SimError::InvariantViolation { detail }
    }

    /// Swap recipes. Everything held is handed to `flush_target` first; if
    /// it refuses, nothing changes. On success the machine is idle with
    /// empty inventories shaped to the new recipe, and the flushed amounts
    /// are returned.
    pub fn set_recipe(
        &mut self,
        recipe: Recipe,
        flush_target: &mut dyn ItemSink,
    ) -> Result<Vec<ItemAmount>, SimError> {
        let flushed = self.contents();
        if !flushed.is_empty() && !flush_target.deposit_all(&flushed) {
            return Err(SimError::SlotCapacityExceeded);
        }
        self.inputs = slots_for(recipe.inputs(), self.stack_size, &self.limits);
        self.outputs = slots_for(recipe.outputs(), self.stack_size, &self.limits);
        self.recipe = recipe;
        self.state = MachineState::Idle;
        self.process_timer = Fixed64::ZERO;
        Ok(flushed)
    }

    /// [`set_recipe`](Self::set_recipe) restricted to this machine's own
    /// recipe list.
    pub fn select_recipe(
        &mut self,
        index: usize,
        flush_target: &mut dyn ItemSink,
    ) -> Result<Vec<ItemAmount>, SimError> {
        let recipe = self
            .available_recipes
            .get(index)
            .cloned()
            .ok_or(SimError::RecipeIndexOutOfRange { index })?;
        self.set_recipe(recipe, flush_target)
    }
}
