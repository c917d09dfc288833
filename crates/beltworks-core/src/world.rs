//! The world: entity arenas, the cell index, placement and removal, and the
//! per-tick update pipeline.
//!
//! # Tick pipeline
//!
//! Every step runs the same phases in the same order:
//!
//! 1. **Reset** arrival flags on belts and splitters.
//! 2. **Belts** in placement order: advance, hand off or block, or pull
//!    from the machine behind an empty segment.
//! 3. **Splitters** in placement order: advance and deal out round robin.
//! 4. **Machines** in placement order: run the processing state machine.
//! 5. **Post-tick**: deliver buffered events to listeners.
//! 6. **Bookkeeping**: tick counter, elapsed time, state hash.
//!
//! An item that lands on a belt or splitter during a step is not moved
//! again in that step, so no item ever moves twice per tick.
//!
//! The index is only written by placement and removal, never during a
//! tick. Entities refer to their neighbours by cell lookup, never by
//! handle, so removing something cannot leave a dangling link.

use std::collections::{BTreeMap, HashSet};

use beltworks_spatial::{Direction, GridPosition, GridRect, SpatialError, SpatialIndex};
use log::{debug, trace, warn};
use slotmap::SlotMap;

use crate::belt::{BeltSegment, BeltTier};
use crate::entity::{EntityRef, GridEntity};
use crate::error::SimError;
use crate::event::{Event, EventBus, EventKind, PassiveListener};
use crate::fixed::{Fixed64, Ticks};
use crate::id::{BeltId, ItemTypeId, MachineId, SplitterId};
use crate::inventory::{CostPayer, ItemSink};
use crate::item::{ItemAmount, StackLimits, merge_amounts, scale_amounts};
use crate::machine::{ItemSlot, MachineClass, MachineState, ProductionMachine};
use crate::query::{BeltSnapshot, MachineSnapshot, SplitterSnapshot};
use crate::recipe::Recipe;
use crate::sim::{SimState, StateHash, TickReport, WorldConfig};
use crate::splitter::{Splitter, SplitterKind};

// ---------------------------------------------------------------------------
// WorldIndex
// ---------------------------------------------------------------------------

/// Cell lookup and collision authority. Holds handles only; entity state
/// lives in the world's arenas.
#[derive(Debug, Clone, Default)]
pub struct WorldIndex {
    cells: SpatialIndex<EntityRef>,
    player: Option<GridRect>,
}

impl WorldIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player_rect(&self) -> Option<GridRect> {
        self.player
    }

    /// Whether `rect` overlaps the player or any placed entity.
    pub fn is_blocked(&self, rect: GridRect) -> bool {
        self.first_blocked_cell(rect).is_some()
    }

    /// The first cell of `rect`, row-major, that something already covers.
    pub fn first_blocked_cell(&self, rect: GridRect) -> Option<GridPosition> {
        rect.tiles().find(|&cell| {
            self.player.is_some_and(|p| p.contains(cell)) || self.cells.is_occupied(cell)
        })
    }

    /// The entity covering `position`, if any. O(1).
    pub fn neighbor_at(&self, position: GridPosition) -> Option<EntityRef> {
        self.cells.occupant_at(position)
    }

    pub fn rect_of(&self, entity: EntityRef) -> Option<GridRect> {
        self.cells.rect_of(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.cells.occupant_count()
    }

    fn place(&mut self, entity: EntityRef, rect: GridRect) -> Result<(), SpatialError> {
        self.cells.place(entity, rect)
    }

    fn remove(&mut self, entity: EntityRef) -> Result<GridRect, SpatialError> {
        self.cells.remove(entity)
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    sim: SimState,
    index: WorldIndex,
    belts: SlotMap<BeltId, BeltSegment>,
    splitters: SlotMap<SplitterId, Splitter>,
    machines: SlotMap<MachineId, ProductionMachine>,
    belt_order: Vec<BeltId>,
    splitter_order: Vec<SplitterId>,
    machine_order: Vec<MachineId>,
    stack_limits: StackLimits,
    events: EventBus,
    last_tick_hash: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl World {
    /// An empty world. A non-positive `fixed_timestep` falls back to the
    /// default.
    pub fn new(mut config: WorldConfig) -> Self {
        if config.fixed_timestep <= Fixed64::ZERO {
            warn!(
                "fixed_timestep {} is not positive, using the default",
                config.fixed_timestep
            );
            config.fixed_timestep = WorldConfig::default().fixed_timestep;
        }
        let events = EventBus::new(config.event_buffer_capacity);
        let mut world = Self {
            config,
            sim: SimState::default(),
            index: WorldIndex::new(),
            belts: SlotMap::with_key(),
            splitters: SlotMap::with_key(),
            machines: SlotMap::with_key(),
            belt_order: Vec::new(),
            splitter_order: Vec::new(),
            machine_order: Vec::new(),
            stack_limits: StackLimits::default(),
            events,
            last_tick_hash: 0,
        };
        world.last_tick_hash = world.state_hash();
        world
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn index(&self) -> &WorldIndex {
        &self.index
    }

    /// Per-item stack caps for machines placed from now on, usually
    /// [`ItemCatalog::stack_limits`](crate::item::ItemCatalog::stack_limits).
    /// Machines already placed keep their slots.
    pub fn set_stack_limits(&mut self, limits: StackLimits) {
        self.stack_limits = limits;
    }

    pub fn stack_limits(&self) -> &StackLimits {
        &self.stack_limits
    }

    /// Completed steps.
    pub fn tick_count(&self) -> Ticks {
        self.sim.tick
    }

    /// Simulated seconds.
    pub fn elapsed(&self) -> Fixed64 {
        self.sim.elapsed
    }

    /// Set (or clear) the player's footprint, which blocks placement.
    pub fn set_player_rect(&mut self, rect: Option<GridRect>) {
        self.index.player = rect;
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn belt(&self, id: BeltId) -> Option<&BeltSegment> {
        self.belts.get(id)
    }

    pub fn splitter(&self, id: SplitterId) -> Option<&Splitter> {
        self.splitters.get(id)
    }

    pub fn machine(&self, id: MachineId) -> Option<&ProductionMachine> {
        self.machines.get(id)
    }

    /// Mutable machine access, e.g. for hand-feeding inputs.
    pub fn machine_mut(&mut self, id: MachineId) -> Option<&mut ProductionMachine> {
        self.machines.get_mut(id)
    }

    pub fn entity_at(&self, position: GridPosition) -> Option<EntityRef> {
        self.index.neighbor_at(position)
    }

    pub fn belt_at(&self, position: GridPosition) -> Option<BeltId> {
        self.entity_at(position).and_then(|e| e.as_belt())
    }

    pub fn splitter_at(&self, position: GridPosition) -> Option<SplitterId> {
        self.entity_at(position).and_then(|e| e.as_splitter())
    }

    pub fn machine_at(&self, position: GridPosition) -> Option<MachineId> {
        self.entity_at(position).and_then(|e| e.as_machine())
    }

    /// Belts in placement (and update) order.
    pub fn belt_ids(&self) -> &[BeltId] {
        &self.belt_order
    }

    pub fn splitter_ids(&self) -> &[SplitterId] {
        &self.splitter_order
    }

    pub fn machine_ids(&self) -> &[MachineId] {
        &self.machine_order
    }

    pub fn belt_count(&self) -> usize {
        self.belts.len()
    }

    pub fn splitter_count(&self) -> usize {
        self.splitters.len()
    }

    pub fn machine_count(&self) -> usize {
        self.machines.len()
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    /// Whether a machine of `class` fits with its top-left corner at
    /// `position`. Ignores cost.
    pub fn can_place_machine(&self, class: &MachineClass, position: GridPosition) -> bool {
        let rect = GridRect::new(position, class.footprint);
        !class.recipes.is_empty() && !rect.is_empty() && !self.index.is_blocked(rect)
    }

    /// Place a machine running the class's first recipe. Checks the
    /// footprint, then the cost, and only then charges `payer`.
    pub fn place_machine(
        &mut self,
        class: &MachineClass,
        position: GridPosition,
        payer: &mut dyn CostPayer,
    ) -> Result<MachineId, SimError> {
        let machine = ProductionMachine::from_class(class, position, self.config.machine_stack_size)?
            .with_stack_limits(self.stack_limits.clone());
        let rect = machine.rect();
        self.ensure_free(std::iter::once(rect))?;
        charge(payer, &class.build_cost)?;

        let id = self.machines.insert(machine);
        self.index.place(EntityRef::Machine(id), rect)?;
        self.machine_order.push(id);
        debug!("placed {} at {}", class.name, position);
        self.emit_placed(EntityRef::Machine(id));
        Ok(id)
    }

    /// Place a run of belt segments along `cells`.
    ///
    /// Each segment points at the next cell; the last keeps the final step's
    /// direction, and a single cell uses `direction`. The cost is the tier's
    /// cost per segment. All cells must be free.
    pub fn place_belt_run(
        &mut self,
        cells: &[GridPosition],
        direction: Direction,
        tier: &BeltTier,
        payer: &mut dyn CostPayer,
    ) -> Result<Vec<BeltId>, SimError> {
        let directions = run_directions(cells, direction)?;
        self.ensure_free(cells.iter().map(|&c| GridRect::cell(c)))?;
        let cost = scale_amounts(&tier.build_cost, cells.len() as u32);
        charge(payer, &cost)?;

        let first_incoming = self.feeding_direction(cells[0]).unwrap_or(directions[0]);
        let mut ids = Vec::with_capacity(cells.len());
        for (i, (&cell, &dir)) in cells.iter().zip(&directions).enumerate() {
            let incoming = if i == 0 { first_incoming } else { directions[i - 1] };
            let id = self.belts.insert(BeltSegment::new(cell, dir, incoming, tier));
            self.index.place(EntityRef::Belt(id), GridRect::cell(cell))?;
            self.belt_order.push(id);
            self.emit_placed(EntityRef::Belt(id));
            ids.push(id);
        }
        debug!("placed {} {} belt segment(s) from {}", ids.len(), tier.name, cells[0]);
        self.rebind_splitters_near(cells);
        Ok(ids)
    }

    /// Place a splitter taking items that travel in `input_direction`. Its
    /// outputs bind to whatever belts already sit beside it.
    pub fn place_splitter(
        &mut self,
        kind: &SplitterKind,
        position: GridPosition,
        input_direction: Direction,
        payer: &mut dyn CostPayer,
    ) -> Result<SplitterId, SimError> {
        self.ensure_free(std::iter::once(GridRect::cell(position)))?;
        charge(payer, &kind.build_cost)?;

        let id = self.splitters.insert(Splitter::new(position, input_direction, kind));
        self.index.place(EntityRef::Splitter(id), GridRect::cell(position))?;
        self.splitter_order.push(id);
        self.bind_splitter(id);
        debug!("placed {} at {} facing {:?}", kind.name, position, input_direction);
        self.emit_placed(EntityRef::Splitter(id));
        Ok(id)
    }

    /// Turn a splitter a quarter turn clockwise and rebind its outputs. A
    /// held item stays put.
    pub fn rotate_splitter(&mut self, id: SplitterId) -> Result<Direction, SimError> {
        let splitter = self.splitters.get_mut(id).ok_or(SimError::NotFound)?;
        splitter.rotate();
        let (position, direction) = (splitter.position(), splitter.input_direction());
        self.bind_splitter(id);
        debug!("rotated splitter at {position} to {direction:?}");
        Ok(direction)
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------
    //
    // Every removal works out the full refund first, hands it to the sink in
    // one all-or-nothing call, and only touches the world once the sink has
    // accepted.

    /// Remove a machine, refunding its contents and build cost.
    pub fn remove_machine(
        &mut self,
        id: MachineId,
        refund: &mut dyn ItemSink,
    ) -> Result<Vec<ItemAmount>, SimError> {
        let machine = self.machines.get(id).ok_or(SimError::NotFound)?;
        let items = merge_amounts(
            machine
                .contents()
                .into_iter()
                .chain(machine.build_cost().iter().copied()),
        );
        deposit(refund, &items)?;

        self.index.remove(EntityRef::Machine(id))?;
        if let Some(machine) = self.machines.remove(id) {
            debug!("removed {} at {}", machine.class_name(), machine.position());
        }
        self.machine_order.retain(|&m| m != id);
        self.emit_removed(EntityRef::Machine(id));
        Ok(items)
    }

    /// Remove one belt segment, refunding its item and build cost.
    pub fn remove_belt_segment(
        &mut self,
        id: BeltId,
        refund: &mut dyn ItemSink,
    ) -> Result<Vec<ItemAmount>, SimError> {
        self.remove_belts(&[id], refund)
    }

    /// Remove the whole run `id` belongs to: every segment reachable through
    /// neighbours where one points into the other.
    pub fn remove_belt_run(
        &mut self,
        id: BeltId,
        refund: &mut dyn ItemSink,
    ) -> Result<Vec<ItemAmount>, SimError> {
        let run = self.connected_run(id)?;
        self.remove_belts(&run, refund)
    }

    /// Remove a splitter, refunding its item and build cost.
    pub fn remove_splitter(
        &mut self,
        id: SplitterId,
        refund: &mut dyn ItemSink,
    ) -> Result<Vec<ItemAmount>, SimError> {
        let splitter = self.splitters.get(id).ok_or(SimError::NotFound)?;
        let items = merge_amounts(
            splitter
                .carried_item()
                .map(|item| ItemAmount::new(item, 1))
                .into_iter()
                .chain(splitter.build_cost().iter().copied()),
        );
        deposit(refund, &items)?;

        self.index.remove(EntityRef::Splitter(id))?;
        if let Some(splitter) = self.splitters.remove(id) {
            debug!("removed splitter at {}", splitter.position());
        }
        self.splitter_order.retain(|&s| s != id);
        self.emit_removed(EntityRef::Splitter(id));
        Ok(items)
    }

    /// Remove whatever `entity` refers to.
    pub fn remove_entity(
        &mut self,
        entity: EntityRef,
        refund: &mut dyn ItemSink,
    ) -> Result<Vec<ItemAmount>, SimError> {
        match entity {
            EntityRef::Belt(id) => self.remove_belt_segment(id, refund),
            EntityRef::Splitter(id) => self.remove_splitter(id, refund),
            EntityRef::Machine(id) => self.remove_machine(id, refund),
        }
    }

    fn remove_belts(
        &mut self,
        ids: &[BeltId],
        refund: &mut dyn ItemSink,
    ) -> Result<Vec<ItemAmount>, SimError> {
        let mut owed = Vec::new();
        for &id in ids {
            let belt = self.belts.get(id).ok_or(SimError::NotFound)?;
            owed.extend(belt.carried_item().map(|item| ItemAmount::new(item, 1)));
            owed.extend(belt.build_cost().iter().copied());
        }
        let items = merge_amounts(owed);
        deposit(refund, &items)?;

        let mut cells = Vec::with_capacity(ids.len());
        for &id in ids {
            let rect = self.index.remove(EntityRef::Belt(id))?;
            cells.push(rect.origin);
            self.belts.remove(id);
            self.emit_removed(EntityRef::Belt(id));
        }
        let removed: HashSet<BeltId> = ids.iter().copied().collect();
        self.belt_order.retain(|b| !removed.contains(b));
        debug!("removed {} belt segment(s)", ids.len());
        self.rebind_splitters_near(&cells);
        Ok(items)
    }

    /// Belts linked to `start` by "points into", in placement order.
    fn connected_run(&self, start: BeltId) -> Result<Vec<BeltId>, SimError> {
        if !self.belts.contains_key(start) {
            return Err(SimError::NotFound);
        }
        let mut visited: HashSet<BeltId> = HashSet::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(belt) = self.belts.get(id) else {
                continue;
            };
            for dir in Direction::all() {
                let Some(other_id) = self.belt_at(belt.position().step(dir)) else {
                    continue;
                };
                if visited.contains(&other_id) {
                    continue;
                }
                let Some(other) = self.belts.get(other_id) else {
                    continue;
                };
                if belt.target_cell() == other.position() || other.target_cell() == belt.position() {
                    stack.push(other_id);
                }
            }
        }
        Ok(self
            .belt_order
            .iter()
            .copied()
            .filter(|id| visited.contains(id))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Recipes
    // -----------------------------------------------------------------------

    /// Swap a machine's recipe for any valid recipe, flushing its contents
    /// to `flush_target` first. Returns what was flushed.
    pub fn set_machine_recipe(
        &mut self,
        id: MachineId,
        recipe: Recipe,
        flush_target: &mut dyn ItemSink,
    ) -> Result<Vec<ItemAmount>, SimError> {
        let machine = self.machines.get_mut(id).ok_or(SimError::NotFound)?;
        let flushed = machine
            .set_recipe(recipe, flush_target)
            .inspect_err(|_| warn!("recipe change on machine {id:?} refused: flush target is full"))?;
        self.after_recipe_change(id);
        Ok(flushed)
    }

    /// Switch to the `index`-th recipe of the machine's own class list.
    pub fn select_machine_recipe(
        &mut self,
        id: MachineId,
        index: usize,
        flush_target: &mut dyn ItemSink,
    ) -> Result<Vec<ItemAmount>, SimError> {
        let machine = self.machines.get_mut(id).ok_or(SimError::NotFound)?;
        let flushed = machine.select_recipe(index, flush_target)?;
        self.after_recipe_change(id);
        Ok(flushed)
    }

    fn after_recipe_change(&mut self, id: MachineId) {
        let Some(machine) = self.machines.get(id) else {
            return;
        };
        let recipe = machine.recipe().name().to_string();
        debug!("{} at {} now runs {}", machine.class_name(), machine.position(), recipe);
        self.events.emit(Event::RecipeChanged {
            machine: id,
            recipe,
            tick: self.sim.tick,
        });
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Register a listener, called at the end of each tick.
    pub fn on_event(&mut self, kind: EventKind, listener: PassiveListener) {
        self.events.on_passive(kind, listener);
    }

    pub fn suppress_event(&mut self, kind: EventKind) {
        self.events.suppress(kind);
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    // -----------------------------------------------------------------------
    // Pause / resume
    // -----------------------------------------------------------------------

    /// While paused, `tick` and `advance` do nothing. Placement still works.
    pub fn pause(&mut self) {
        self.sim.paused = true;
    }

    pub fn resume(&mut self) {
        self.sim.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.sim.paused
    }

    // -----------------------------------------------------------------------
    // Advance
    // -----------------------------------------------------------------------

    /// Accumulate `elapsed` seconds and run as many fixed steps as fit,
    /// carrying the remainder to the next call.
    pub fn advance(&mut self, elapsed: Fixed64) -> Result<TickReport, SimError> {
        let mut report = TickReport::default();
        if self.sim.paused || elapsed <= Fixed64::ZERO {
            return Ok(report);
        }
        self.sim.accumulator = self.sim.accumulator.saturating_add(elapsed);
        let step = self.config.fixed_timestep;
        while self.sim.accumulator >= step {
            self.sim.accumulator -= step;
            report.merge(self.tick(step)?);
        }
        Ok(report)
    }

    /// Run exactly one step of `dt` seconds. Negative `dt` counts as zero.
    ///
    /// Errors only on [`SimError::InvariantViolation`], after which the
    /// world should be considered broken.
    pub fn tick(&mut self, dt: Fixed64) -> Result<TickReport, SimError> {
        if self.sim.paused {
            return Ok(TickReport::default());
        }
        let dt = dt.max(Fixed64::ZERO);
        let tick = self.sim.tick;
        let mut report = TickReport {
            steps_run: 1,
            ..Default::default()
        };

        // Phase 1: Reset arrival flags.
        self.phase_reset();

        // Phase 2: Belts.
        self.phase_belts(dt, tick, &mut report);

        // Phase 3: Splitters.
        self.phase_splitters(dt, tick, &mut report);

        // Phase 4: Machines.
        self.phase_machines(dt, tick, &mut report)?;

        // Phase 5: Post-tick.
        self.events.deliver();

        // Phase 6: Bookkeeping.
        self.sim.tick += 1;
        self.sim.elapsed = self.sim.elapsed.saturating_add(dt);
        self.last_tick_hash = self.state_hash();

        Ok(report)
    }

    fn phase_reset(&mut self) {
        for belt in self.belts.values_mut() {
            belt.begin_tick();
        }
        for splitter in self.splitters.values_mut() {
            splitter.begin_tick();
        }
    }

    fn phase_belts(&mut self, dt: Fixed64, tick: Ticks, report: &mut TickReport) {
        for i in 0..self.belt_order.len() {
            let id = self.belt_order[i];
            let Some(belt) = self.belts.get_mut(id) else {
                continue;
            };
            if belt.is_empty() {
                self.pull_from_machine(id, tick);
                continue;
            }
            if !belt.advance(dt) {
                continue;
            }
            let Some(item) = belt.carried_item() else {
                continue;
            };
            let from = belt.direction();
            let target = self.index.neighbor_at(belt.target_cell());

            let accepted = target.filter(|&to| self.offer(to, item, from));
            let Some(belt) = self.belts.get_mut(id) else {
                continue;
            };
            match accepted {
                Some(to) => {
                    belt.release();
                    report.handoffs += 1;
                    trace!("belt {id:?} handed {item} to {to:?}");
                    self.events.emit(Event::ItemHandedOff {
                        from: EntityRef::Belt(id),
                        to,
                        item,
                        tick,
                    });
                }
                None => {
                    if belt.block() {
                        trace!("belt {id:?} blocked at {}", belt.position());
                        self.events.emit(Event::BeltBlocked { belt: id, tick });
                    }
                }
            }
        }
    }

    /// An empty belt takes one unit from the machine behind it.
    fn pull_from_machine(&mut self, id: BeltId, tick: Ticks) {
        let Some(belt) = self.belts.get_mut(id) else {
            return;
        };
        let Some(EntityRef::Machine(machine_id)) = self.index.neighbor_at(belt.source_cell()) else {
            return;
        };
        let Some(machine) = self.machines.get_mut(machine_id) else {
            return;
        };
        if machine.push_output_item(true).is_none() {
            return;
        }
        let Some(item) = machine.push_output_item(false) else {
            return;
        };
        belt.load_pulled(item);
        trace!("belt {id:?} pulled {item} from machine {machine_id:?}");
        self.events.emit(Event::ItemPulled {
            machine: machine_id,
            belt: id,
            item,
            tick,
        });
    }

    fn phase_splitters(&mut self, dt: Fixed64, tick: Ticks, report: &mut TickReport) {
        for i in 0..self.splitter_order.len() {
            let id = self.splitter_order[i];
            let Some(splitter) = self.splitters.get_mut(id) else {
                continue;
            };
            if !splitter.advance(dt) {
                continue;
            }
            let Some(item) = splitter.carried_item() else {
                continue;
            };

            let mut delivered = None;
            for _ in 0..splitter.connected_outputs().len() {
                let Some((dir, belt_id)) = splitter.next_candidate() else {
                    break;
                };
                let accepted = self
                    .belts
                    .get_mut(belt_id)
                    .is_some_and(|belt| belt.try_receive(item, dir));
                if accepted {
                    delivered = Some(belt_id);
                    break;
                }
            }

            match delivered {
                Some(belt_id) => {
                    splitter.release();
                    report.handoffs += 1;
                    trace!("splitter {id:?} sent {item} to belt {belt_id:?}");
                    self.events.emit(Event::ItemHandedOff {
                        from: EntityRef::Splitter(id),
                        to: EntityRef::Belt(belt_id),
                        item,
                        tick,
                    });
                }
                None => splitter.hold(),
            }
        }
    }

    fn phase_machines(&mut self, dt: Fixed64, tick: Ticks, report: &mut TickReport) -> Result<(), SimError> {
        for i in 0..self.machine_order.len() {
            let id = self.machine_order[i];
            let Some(machine) = self.machines.get_mut(id) else {
                continue;
            };
            let result = machine.advance(dt)?;

            if result.started {
                self.events.emit(Event::RecipeStarted { machine: id, tick });
            }
            for a in &result.consumed {
                self.events.emit(Event::ItemConsumed {
                    machine: id,
                    item: a.item,
                    quantity: a.quantity,
                    tick,
                });
            }
            for a in &result.produced {
                self.events.emit(Event::ItemProduced {
                    machine: id,
                    item: a.item,
                    quantity: a.quantity,
                    tick,
                });
            }
            if result.completed {
                self.events.emit(Event::RecipeCompleted { machine: id, tick });
            }
            report.record_consumed(&result.consumed);
            report.record_produced(&result.produced);
        }
        Ok(())
    }

    /// Offer `item` to whatever `to` refers to.
    fn offer(&mut self, to: EntityRef, item: ItemTypeId, from: Direction) -> bool {
        self.entity_mut(to)
            .is_some_and(|entity| entity.try_receive(item, from))
    }

    fn entity_mut(&mut self, entity: EntityRef) -> Option<&mut dyn GridEntity> {
        match entity {
            EntityRef::Belt(id) => self.belts.get_mut(id).map(|b| b as &mut dyn GridEntity),
            EntityRef::Splitter(id) => self.splitters.get_mut(id).map(|s| s as &mut dyn GridEntity),
            EntityRef::Machine(id) => self.machines.get_mut(id).map(|m| m as &mut dyn GridEntity),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Every item held anywhere: machine slots, belts and splitters.
    pub fn item_totals(&self) -> BTreeMap<ItemTypeId, u64> {
        let mut totals = BTreeMap::new();
        for machine in self.machines.values() {
            for a in machine.contents() {
                *totals.entry(a.item).or_insert(0) += a.quantity as u64;
            }
        }
        let carried = self
            .belts
            .values()
            .filter_map(BeltSegment::carried_item)
            .chain(self.splitters.values().filter_map(Splitter::carried_item));
        for item in carried {
            *totals.entry(item).or_insert(0) += 1;
        }
        totals
    }

    /// FNV-1a over the tick counter and every entity in placement order.
    pub fn state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.sim.tick);
        for belt in self.belt_order.iter().filter_map(|&id| self.belts.get(id)) {
            write_position(&mut h, belt.position());
            h.write(&[direction_code(belt.direction())]);
            h.write_item(belt.carried_item());
            h.write_fixed64(belt.progress());
        }
        for splitter in self.splitter_order.iter().filter_map(|&id| self.splitters.get(id)) {
            write_position(&mut h, splitter.position());
            h.write(&[direction_code(splitter.input_direction())]);
            h.write_item(splitter.carried_item());
            h.write_fixed64(splitter.progress());
            h.write_u64(splitter.next_output_index() as u64);
        }
        for machine in self.machine_order.iter().filter_map(|&id| self.machines.get(id)) {
            write_position(&mut h, machine.position());
            h.write(machine.recipe().name().as_bytes());
            h.write(&[match machine.state() {
                MachineState::Idle => 0,
                MachineState::Processing => 1,
            }]);
            h.write_fixed64(machine.process_timer());
            for slot in machine.inputs().iter().chain(machine.outputs()) {
                h.write_u32(slot.item.0);
                h.write_u32(slot.inventory.get_amount(slot.item));
            }
        }
        h.finish()
    }

    /// The hash computed at the end of the last tick.
    pub fn last_tick_hash(&self) -> u64 {
        self.last_tick_hash
    }

    pub fn snapshot_belt(&self, id: BeltId) -> Option<BeltSnapshot> {
        let belt = self.belts.get(id)?;
        Some(BeltSnapshot {
            id,
            position: belt.position(),
            direction: belt.direction(),
            incoming_direction: belt.incoming_direction(),
            carried_item: belt.carried_item(),
            progress: belt.progress(),
            blocked: belt.is_blocked(),
        })
    }

    pub fn snapshot_all_belts(&self) -> Vec<BeltSnapshot> {
        self.belt_order.iter().filter_map(|&id| self.snapshot_belt(id)).collect()
    }

    pub fn snapshot_splitter(&self, id: SplitterId) -> Option<SplitterSnapshot> {
        let splitter = self.splitters.get(id)?;
        Some(SplitterSnapshot {
            id,
            position: splitter.position(),
            input_direction: splitter.input_direction(),
            carried_item: splitter.carried_item(),
            progress: splitter.progress(),
            next_output_index: splitter.next_output_index(),
            connected_outputs: splitter.connected_outputs().to_vec(),
        })
    }

    pub fn snapshot_all_splitters(&self) -> Vec<SplitterSnapshot> {
        self.splitter_order
            .iter()
            .filter_map(|&id| self.snapshot_splitter(id))
            .collect()
    }

    pub fn snapshot_machine(&self, id: MachineId) -> Option<MachineSnapshot> {
        let machine = self.machines.get(id)?;
        let amounts = |slots: &[ItemSlot]| -> Vec<ItemAmount> {
            slots
                .iter()
                .map(|slot| ItemAmount::new(slot.item, slot.inventory.get_amount(slot.item)))
                .collect()
        };
        Some(MachineSnapshot {
            id,
            class_name: machine.class_name().to_string(),
            recipe_name: machine.recipe().name().to_string(),
            rect: machine.rect(),
            processing: machine.is_processing(),
            process_timer: machine.process_timer(),
            process_time: machine.process_time(),
            progress: machine.progress(),
            inputs: amounts(machine.inputs()),
            outputs: amounts(machine.outputs()),
        })
    }

    pub fn snapshot_all_machines(&self) -> Vec<MachineSnapshot> {
        self.machine_order
            .iter()
            .filter_map(|&id| self.snapshot_machine(id))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn ensure_free(&self, rects: impl IntoIterator<Item = GridRect>) -> Result<(), SimError> {
        for rect in rects {
            if let Some(position) = self.index.first_blocked_cell(rect) {
                return Err(SimError::OccupiedCell { position });
            }
        }
        Ok(())
    }

    /// Direction of an existing belt that delivers into `cell`, if any.
    fn feeding_direction(&self, cell: GridPosition) -> Option<Direction> {
        Direction::all().into_iter().find(|&dir| {
            self.belt_at(cell.step_back(dir))
                .and_then(|id| self.belts.get(id))
                .is_some_and(|belt| belt.direction() == dir)
        })
    }

    fn rebind_splitters_near(&mut self, cells: &[GridPosition]) {
        let mut touched: Vec<SplitterId> = Vec::new();
        for &cell in cells {
            for dir in Direction::all() {
                if let Some(id) = self.splitter_at(cell.step(dir)) {
                    if !touched.contains(&id) {
                        touched.push(id);
                    }
                }
            }
        }
        for id in touched {
            self.bind_splitter(id);
        }
    }

    fn bind_splitter(&mut self, id: SplitterId) {
        let Some(splitter) = self.splitters.get(id) else {
            return;
        };
        let position = splitter.position();
        let outputs: Vec<(Direction, BeltId)> = splitter
            .output_directions()
            .into_iter()
            .filter_map(|dir| self.belt_at(position.step(dir)).map(|belt| (dir, belt)))
            .collect();
        if let Some(splitter) = self.splitters.get_mut(id) {
            splitter.bind_outputs(outputs);
        }
    }

    fn emit_placed(&mut self, entity: EntityRef) {
        self.events.emit(Event::EntityPlaced {
            entity,
            tick: self.sim.tick,
        });
    }

    fn emit_removed(&mut self, entity: EntityRef) {
        self.events.emit(Event::EntityRemoved {
            entity,
            tick: self.sim.tick,
        });
    }
}

// ---------------------------------------------------------------------------
// Free helpers
// ---------------------------------------------------------------------------

/// Outgoing direction per cell of a belt run, validating the run's shape.
fn run_directions(cells: &[GridPosition], direction: Direction) -> Result<Vec<Direction>, SimError> {
    if cells.is_empty() {
        return Err(SimError::InvalidBeltRun {
            reason: "no cells".to_string(),
        });
    }
    let mut seen = HashSet::with_capacity(cells.len());
    for &cell in cells {
        if !seen.insert(cell) {
            return Err(SimError::InvalidBeltRun {
                reason: format!("cell {cell} appears twice"),
            });
        }
    }
    if cells.len() == 1 {
        return Ok(vec![direction]);
    }

    let mut directions = Vec::with_capacity(cells.len());
    for pair in cells.windows(2) {
        let step = pair[0]
            .direction_to(&pair[1])
            .ok_or_else(|| SimError::InvalidBeltRun {
                reason: format!("{} and {} are not adjacent", pair[0], pair[1]),
            })?;
        directions.push(step);
    }
    let last = directions[directions.len() - 1];
    directions.push(last);
    Ok(directions)
}

fn charge(payer: &mut dyn CostPayer, cost: &[ItemAmount]) -> Result<(), SimError> {
    if !payer.has_all(cost) || !payer.remove_all(cost) {
        return Err(SimError::InsufficientResources);
    }
    Ok(())
}

fn deposit(sink: &mut dyn ItemSink, items: &[ItemAmount]) -> Result<(), SimError> {
    if items.is_empty() || sink.deposit_all(items) {
        return Ok(());
    }
    warn!("refund of {} item stack(s) rejected by target", items.len());
    Err(SimError::SlotCapacityExceeded)
}

fn write_position(h: &mut StateHash, position: GridPosition) {
    h.write_i32(position.x);
    h.write_i32(position.y);
}

fn direction_code(direction: Direction) -> u8 {
    match direction {
        Direction::North => 0,
        Direction::East => 1,
        Direction::South => 2,
        Direction::West => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::ItemLedger;
    use beltworks_spatial::Footprint;
    use std::cell::RefCell;
    use std::rc::Rc;

    const ORE: ItemTypeId = ItemTypeId(0);
    const INGOT: ItemTypeId = ItemTypeId(1);
    const PLATE: ItemTypeId = ItemTypeId(2);

    fn secs(v: f64) -> Fixed64 {
        Fixed64::from_num(v)
    }

    fn p(x: i32, y: i32) -> GridPosition {
        GridPosition::new(x, y)
    }

    fn smelt() -> Recipe {
        Recipe::new("Smelt", [ItemAmount::new(ORE, 3)], [ItemAmount::new(INGOT, 1)], secs(2.0)).unwrap()
    }

    fn press() -> Recipe {
        Recipe::new("Press", [ItemAmount::new(INGOT, 2)], [ItemAmount::new(PLATE, 1)], secs(1.0)).unwrap()
    }

    fn mine() -> Recipe {
        Recipe::new("Mine", [], [ItemAmount::new(ORE, 1)], secs(1.0)).unwrap()
    }

    fn class(recipes: Vec<Recipe>, cost: Vec<ItemAmount>) -> MachineClass {
        MachineClass {
            name: "Smelter".into(),
            footprint: Footprint::new(3, 3),
            build_cost: cost,
            recipes,
        }
    }

    fn free_tier() -> BeltTier {
        BeltTier::new("basic", 120, vec![])
    }

    fn paid_tier() -> BeltTier {
        BeltTier::new("basic", 120, vec![ItemAmount::new(INGOT, 1)])
    }

    fn rich() -> ItemLedger {
        ItemLedger::with_items(&[ItemAmount::new(INGOT, 1000)])
    }

    struct Refuse;
    impl ItemSink for Refuse {
        fn deposit_all(&mut self, _: &[ItemAmount]) -> bool {
            false
        }
    }

    /// A miner at the origin feeding one east belt at (3, 1).
    fn miner_and_belt() -> (World, MachineId, BeltId) {
        let mut world = World::default();
        let mut payer = rich();
        let miner = world.place_machine(&class(vec![mine()], vec![]), p(0, 0), &mut payer).unwrap();
        let belts = world
            .place_belt_run(&[p(3, 1)], Direction::East, &free_tier(), &mut payer)
            .unwrap();
        (world, miner, belts[0])
    }

    // -----------------------------------------------------------------------
    // Test 1: machine placement checks cells, then cost
    // -----------------------------------------------------------------------
    #[test]
    fn place_machine_charges_and_rejects_overlap() {
        let mut world = World::default();
        let smelter = class(vec![smelt()], vec![ItemAmount::new(INGOT, 5)]);
        let mut payer = ItemLedger::with_items(&[ItemAmount::new(INGOT, 10)]);

        let id = world.place_machine(&smelter, p(0, 0), &mut payer).unwrap();
        assert_eq!(payer.get_amount(INGOT), 5);
        assert_eq!(world.machine_at(p(2, 2)), Some(id));
        assert!(!world.can_place_machine(&smelter, p(2, 2)));

        assert_eq!(
            world.place_machine(&smelter, p(2, 2), &mut payer),
            Err(SimError::OccupiedCell { position: p(2, 2) })
        );
        assert_eq!(payer.get_amount(INGOT), 5);

        world.place_machine(&smelter, p(10, 0), &mut payer).unwrap();
        assert_eq!(
            world.place_machine(&smelter, p(20, 0), &mut payer),
            Err(SimError::InsufficientResources)
        );
        assert_eq!(world.machine_count(), 2);
        assert_eq!(world.index().entity_count(), 2);
    }

    // -----------------------------------------------------------------------
    // Test 2: player footprint and empty classes
    // -----------------------------------------------------------------------
    #[test]
    fn player_rect_blocks_placement() {
        let mut world = World::default();
        world.set_player_rect(Some(GridRect::cell(p(1, 1))));
        let mut payer = rich();
        assert_eq!(
            world.place_machine(&class(vec![smelt()], vec![]), p(0, 0), &mut payer),
            Err(SimError::OccupiedCell { position: p(1, 1) })
        );
        assert!(matches!(
            world.place_machine(&class(vec![], vec![]), p(5, 5), &mut payer),
            Err(SimError::EmptyMachineClass { .. })
        ));
        world.set_player_rect(None);
        assert!(world.place_machine(&class(vec![smelt()], vec![]), p(0, 0), &mut payer).is_ok());
    }

    #[test]
    fn empty_footprint_is_never_placed() {
        let mut world = World::default();
        let mut payer = ItemLedger::with_items(&[ItemAmount::new(INGOT, 10)]);
        let ghost = MachineClass {
            footprint: Footprint::new(0, 0),
            ..class(vec![smelt()], vec![ItemAmount::new(INGOT, 5)])
        };
        assert!(!world.can_place_machine(&ghost, p(0, 0)));
        for _ in 0..2 {
            assert_eq!(
                world.place_machine(&ghost, p(0, 0), &mut payer),
                Err(SimError::EmptyFootprint { name: "Smelter".into() })
            );
        }
        assert_eq!(payer.get_amount(INGOT), 10);
        assert_eq!(world.machine_count(), 0);
        assert_eq!(world.index().entity_count(), 0);
    }

    #[test]
    fn placed_machines_take_the_world_stack_limits() {
        let mut world = World::default();
        let mut payer = rich();
        let before = world.place_machine(&class(vec![smelt()], vec![]), p(0, 0), &mut payer).unwrap();

        let mut limits = StackLimits::new();
        limits.set(ORE, 50);
        world.set_stack_limits(limits);
        assert_eq!(world.stack_limits().get(ORE), Some(50));
        let after = world.place_machine(&class(vec![smelt()], vec![]), p(5, 0), &mut payer).unwrap();

        let capped = world.machine_mut(after).unwrap();
        assert!(!capped.insert_input(ORE, 51));
        assert!(capped.insert_input(ORE, 50));
        // Placed before the limits were set.
        assert!(world.machine_mut(before).unwrap().insert_input(ORE, 100));
    }

    // -----------------------------------------------------------------------
    // Test 3: belt run directions and corner shapes
    // -----------------------------------------------------------------------
    #[test]
    fn belt_run_points_each_cell_at_the_next() {
        let mut world = World::default();
        let mut payer = rich();
        let ids = world
            .place_belt_run(&[p(0, 0), p(1, 0), p(1, 1)], Direction::North, &paid_tier(), &mut payer)
            .unwrap();
        let dirs: Vec<_> = ids.iter().map(|&id| world.belt(id).unwrap().direction()).collect();
        let incoming: Vec<_> = ids
            .iter()
            .map(|&id| world.belt(id).unwrap().incoming_direction())
            .collect();
        assert_eq!(dirs, vec![Direction::East, Direction::South, Direction::South]);
        assert_eq!(incoming, vec![Direction::East, Direction::East, Direction::South]);
        assert_eq!(payer.get_amount(INGOT), 997);

        let single = world
            .place_belt_run(&[p(9, 9)], Direction::West, &free_tier(), &mut payer)
            .unwrap();
        assert_eq!(world.belt(single[0]).unwrap().direction(), Direction::West);
    }

    #[test]
    fn belt_run_inherits_feeding_direction() {
        let mut world = World::default();
        let mut payer = rich();
        world
            .place_belt_run(&[p(6, -1)], Direction::South, &free_tier(), &mut payer)
            .unwrap();
        let ids = world
            .place_belt_run(&[p(6, 0), p(7, 0)], Direction::East, &free_tier(), &mut payer)
            .unwrap();
        assert_eq!(world.belt(ids[0]).unwrap().incoming_direction(), Direction::South);
    }

    #[test]
    fn malformed_belt_runs_are_rejected() {
        let mut world = World::default();
        let mut payer = rich();
        let tier = free_tier();
        for cells in [vec![], vec![p(0, 0), p(1, 0), p(0, 0)], vec![p(0, 0), p(2, 0)]] {
            assert!(matches!(
                world.place_belt_run(&cells, Direction::East, &tier, &mut payer),
                Err(SimError::InvalidBeltRun { .. })
            ));
        }
        world.place_belt_run(&[p(1, 0)], Direction::East, &tier, &mut payer).unwrap();
        assert_eq!(
            world.place_belt_run(&[p(0, 0), p(1, 0)], Direction::East, &tier, &mut payer),
            Err(SimError::OccupiedCell { position: p(1, 0) })
        );
        assert_eq!(world.belt_count(), 1);
    }

    // -----------------------------------------------------------------------
    // Test 4: a belt with nothing ahead blocks once
    // -----------------------------------------------------------------------
    #[test]
    fn belt_pulls_from_machine_then_blocks() {
        let (mut world, miner, belt) = miner_and_belt();

        // Tick 0: the miner makes one ore.
        world.tick(secs(1.0)).unwrap();
        assert!(world.belt(belt).unwrap().is_empty());
        assert_eq!(world.machine(miner).unwrap().output_inventory(ORE).unwrap().get_amount(ORE), 1);

        // Tick 1: the belt pulls it.
        world.tick(secs(1.0)).unwrap();
        assert_eq!(world.belt(belt).unwrap().carried_item(), Some(ORE));
        assert_eq!(world.belt(belt).unwrap().progress(), Fixed64::ZERO);

        // Ticks 2 and 3: nothing at (4, 1), so it blocks, reported once.
        world.tick(secs(1.0)).unwrap();
        world.tick(secs(1.0)).unwrap();
        let b = world.belt(belt).unwrap();
        assert!(b.is_blocked());
        assert_eq!(b.progress(), Fixed64::ONE);
        assert_eq!(world.event_bus().total_emitted(EventKind::BeltBlocked), 1);
        assert_eq!(world.event_bus().total_emitted(EventKind::ItemPulled), 1);
    }

    // -----------------------------------------------------------------------
    // Test 5: removal refunds contents plus cost, atomically
    // -----------------------------------------------------------------------
    #[test]
    fn remove_belt_refunds_item_and_cost() {
        let mut world = World::default();
        let mut payer = rich();
        world.place_machine(&class(vec![mine()], vec![]), p(0, 0), &mut payer).unwrap();
        let belt = world
            .place_belt_run(&[p(3, 1)], Direction::East, &paid_tier(), &mut payer)
            .unwrap()[0];
        world.tick(secs(1.0)).unwrap();
        world.tick(secs(1.0)).unwrap();
        assert_eq!(world.belt(belt).unwrap().carried_item(), Some(ORE));

        assert_eq!(
            world.remove_belt_segment(belt, &mut Refuse),
            Err(SimError::SlotCapacityExceeded)
        );
        assert!(world.belt(belt).is_some());

        let mut ledger = ItemLedger::new();
        let refund = world.remove_belt_segment(belt, &mut ledger).unwrap();
        assert_eq!(refund, vec![ItemAmount::new(ORE, 1), ItemAmount::new(INGOT, 1)]);
        assert_eq!(ledger.get_amount(ORE), 1);
        assert!(world.belt(belt).is_none());
        assert_eq!(world.entity_at(p(3, 1)), None);
        assert_eq!(world.remove_belt_segment(belt, &mut ledger), Err(SimError::NotFound));
    }

    #[test]
    fn remove_machine_refunds_and_frees_cells() {
        let mut world = World::default();
        let smelter = class(vec![smelt()], vec![ItemAmount::new(INGOT, 5)]);
        let mut payer = rich();
        let id = world.place_machine(&smelter, p(0, 0), &mut payer).unwrap();
        assert!(world.machine_mut(id).unwrap().insert_input(ORE, 2));

        let mut ledger = ItemLedger::new();
        let refund = world.remove_entity(EntityRef::Machine(id), &mut ledger).unwrap();
        assert_eq!(refund, vec![ItemAmount::new(ORE, 2), ItemAmount::new(INGOT, 5)]);
        assert!(world.can_place_machine(&smelter, p(0, 0)));
        assert!(world.machine_ids().is_empty());
    }

    // -----------------------------------------------------------------------
    // Test 6: run removal follows "points into" links only
    // -----------------------------------------------------------------------
    #[test]
    fn remove_belt_run_takes_connected_segments() {
        let mut world = World::default();
        let mut payer = rich();
        let tier = paid_tier();
        let a = world
            .place_belt_run(&[p(0, 0), p(1, 0), p(2, 0)], Direction::East, &tier, &mut payer)
            .unwrap();
        let b = world
            .place_belt_run(&[p(0, 1), p(1, 1)], Direction::East, &tier, &mut payer)
            .unwrap();

        let mut ledger = ItemLedger::new();
        let refund = world.remove_belt_run(a[1], &mut ledger).unwrap();
        assert_eq!(refund, vec![ItemAmount::new(INGOT, 3)]);
        assert_eq!(world.belt_ids(), b.as_slice());
        assert_eq!(world.event_bus().total_emitted(EventKind::EntityRemoved), 3);
    }

    // -----------------------------------------------------------------------
    // Test 7: splitter outputs follow neighbours and rotation
    // -----------------------------------------------------------------------
    #[test]
    fn splitter_binds_outputs_and_rotates() {
        let mut world = World::default();
        let mut payer = rich();
        let tier = free_tier();
        let north = world.place_belt_run(&[p(5, 4)], Direction::North, &tier, &mut payer).unwrap()[0];
        let east = world.place_belt_run(&[p(6, 5)], Direction::East, &tier, &mut payer).unwrap()[0];
        let kind = SplitterKind::new("splitter", 120, vec![]);
        let s = world.place_splitter(&kind, p(5, 5), Direction::East, &mut payer).unwrap();
        assert_eq!(
            world.splitter(s).unwrap().connected_outputs(),
            &[(Direction::North, north), (Direction::East, east)]
        );

        let south = world.place_belt_run(&[p(5, 6)], Direction::South, &tier, &mut payer).unwrap()[0];
        assert_eq!(world.splitter(s).unwrap().connected_outputs().len(), 3);

        assert_eq!(world.rotate_splitter(s), Ok(Direction::South));
        assert_eq!(
            world.splitter(s).unwrap().connected_outputs(),
            &[(Direction::East, east), (Direction::South, south)]
        );

        let mut ledger = ItemLedger::new();
        world.remove_belt_segment(east, &mut ledger).unwrap();
        assert_eq!(world.splitter(s).unwrap().connected_outputs(), &[(Direction::South, south)]);
    }

    // -----------------------------------------------------------------------
    // Test 8: pause and the fixed-step accumulator
    // -----------------------------------------------------------------------
    #[test]
    fn paused_world_does_not_tick() {
        let (mut world, miner, _) = miner_and_belt();
        world.pause();
        assert_eq!(world.tick(secs(1.0)).unwrap(), TickReport::default());
        assert_eq!(world.advance(secs(5.0)).unwrap().steps_run, 0);
        assert_eq!(world.tick_count(), 0);
        assert!(world.machine(miner).unwrap().contents().is_empty());

        world.resume();
        assert_eq!(world.tick(secs(1.0)).unwrap().produced_of(ORE), 1);
        assert_eq!(world.tick_count(), 1);
    }

    #[test]
    fn advance_carries_the_remainder() {
        let config = WorldConfig {
            fixed_timestep: secs(0.25),
            ..Default::default()
        };
        let mut world = World::new(config);
        assert_eq!(world.advance(secs(0.625)).unwrap().steps_run, 2);
        assert_eq!(world.advance(secs(0.375)).unwrap().steps_run, 2);
        assert_eq!(world.tick_count(), 4);
        assert_eq!(world.elapsed(), secs(1.0));
    }

    #[test]
    fn non_positive_timestep_falls_back_to_default() {
        let world = World::new(WorldConfig {
            fixed_timestep: Fixed64::ZERO,
            ..Default::default()
        });
        assert_eq!(world.config().fixed_timestep, WorldConfig::default().fixed_timestep);
    }

    // -----------------------------------------------------------------------
    // Test 9: recipe switching through the world
    // -----------------------------------------------------------------------
    #[test]
    fn recipe_change_flushes_and_notifies() {
        let mut world = World::default();
        let mut payer = rich();
        let id = world
            .place_machine(&class(vec![smelt(), press()], vec![]), p(0, 0), &mut payer)
            .unwrap();
        assert!(world.machine_mut(id).unwrap().insert_input(ORE, 4));

        let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        world.on_event(
            EventKind::RecipeChanged,
            Box::new(move |e: &Event| {
                if let Event::RecipeChanged { recipe, .. } = e {
                    sink.borrow_mut().push(recipe.clone());
                }
            }),
        );

        let mut ledger = ItemLedger::new();
        assert_eq!(
            world.select_machine_recipe(id, 5, &mut ledger),
            Err(SimError::RecipeIndexOutOfRange { index: 5 })
        );
        let flushed = world.select_machine_recipe(id, 1, &mut ledger).unwrap();
        assert_eq!(flushed, vec![ItemAmount::new(ORE, 4)]);
        assert_eq!(world.machine(id).unwrap().recipe().name(), "Press");

        world.tick(secs(0.1)).unwrap();
        assert_eq!(*seen.borrow(), vec!["Press".to_string()]);
    }

    // -----------------------------------------------------------------------
    // Test 10: totals and the state hash
    // -----------------------------------------------------------------------
    #[test]
    fn item_totals_cover_machines_and_belts() {
        let (mut world, _, _) = miner_and_belt();
        world.tick(secs(1.0)).unwrap();
        world.tick(secs(1.0)).unwrap();
        // One ore on the belt, one fresh ore in the miner.
        assert_eq!(world.item_totals().get(&ORE), Some(&2));
    }

    #[test]
    fn identical_worlds_hash_identically() {
        let (mut a, _, _) = miner_and_belt();
        let (mut b, _, _) = miner_and_belt();
        assert_eq!(a.state_hash(), b.state_hash());
        for _ in 0..5 {
            a.tick(secs(0.5)).unwrap();
            b.tick(secs(0.5)).unwrap();
            assert_eq!(a.last_tick_hash(), b.last_tick_hash());
            assert_eq!(a.last_tick_hash(), a.state_hash());
        }
        b.tick(secs(0.5)).unwrap();
        assert_ne!(a.state_hash(), b.state_hash());
    }
}
