//! Integration tests for the Beltworks simulation engine.
//!
//! These tests exercise end-to-end behavior across the full tick pipeline:
//! placement, transport, splitting, processing, refunds, events and
//! determinism.

use std::cell::RefCell;
use std::rc::Rc;

use beltworks_core::content;
use beltworks_core::entity::EntityRef;
use beltworks_core::error::SimError;
use beltworks_core::event::{Event, EventKind};
use beltworks_core::fixed::Fixed64;
use beltworks_core::id::*;
use beltworks_core::inventory::{ItemLedger, SlottedInventory};
use beltworks_core::item::ItemAmount;
use beltworks_core::sim::WorldConfig;
use beltworks_core::test_utils::*;
use beltworks_core::world::World;
use beltworks_core::{Direction, GridPosition};

/// Records the target belt of every splitter hand-off.
fn splitter_handoffs(world: &mut World) -> Rc<RefCell<Vec<BeltId>>> {
    let seen: Rc<RefCell<Vec<BeltId>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    world.on_event(
        EventKind::ItemHandedOff,
        Box::new(move |e: &Event| {
            if let Event::ItemHandedOff {
                from: EntityRef::Splitter(_),
                to: EntityRef::Belt(belt),
                ..
            } = e
            {
                sink.borrow_mut().push(*belt);
            }
        }),
    );
    seen
}

// ===========================================================================
// Test 1: source -> belt -> smelter, exact timing
// ===========================================================================
//
// With dt = 0.25 s a basic belt needs two ticks to cross a cell. The source
// makes one ore every 0.5 s. The belt delivers on ticks 4, 7 and 10; the
// smelter starts on tick 10 and finishes its 2 s cycle on tick 17.

#[test]
fn source_belt_smelter_timing() {
    let mut world = World::default();
    let line = source_line(&mut world, pos(0, 0), 1, 0.5);

    let report = run_ticks(&mut world, 17, 0.25);
    assert_eq!(report.produced_of(ingot()), 0);
    let smelter = world.machine(line.sink).unwrap();
    assert!(smelter.is_processing());
    assert_eq!(smelter.input_inventory(ore()).unwrap().get_amount(ore()), 5);

    let report = run_ticks(&mut world, 1, 0.25);
    assert_eq!(report.produced_of(ingot()), 1);
    assert_eq!(report.consumed_of(ore()), 3);
    let smelter = world.machine(line.sink).unwrap();
    assert!(!smelter.is_processing());
    assert_eq!(smelter.output_inventory(ingot()).unwrap().get_amount(ingot()), 1);
    assert_eq!(smelter.input_inventory(ore()).unwrap().get_amount(ore()), 2);
}

// ===========================================================================
// Test 2: conservation along a longer line
// ===========================================================================

#[test]
fn long_line_conserves_items() {
    let mut world = World::default();
    source_line(&mut world, pos(0, 0), 6, 0.5);

    let report = run_ticks(&mut world, 400, 0.25);
    assert!(report.produced_of(ingot()) > 5);
    assert_eq!(
        report.produced_of(ore()),
        report.consumed_of(ore()) + total_of(&world, ore())
    );
    assert_eq!(report.produced_of(ingot()), total_of(&world, ingot()));
    assert_eq!(report.consumed_of(ore()), 3 * report.produced_of(ingot()));
}

// ===========================================================================
// Test 3: full outputs back the whole line up
// ===========================================================================
//
// Every slot holds 3. Once the smelter holds 3 ingots it cannot start, its
// ore slot fills, every belt stops on a held item and the source stops too.

#[test]
fn backpressure_reaches_the_source() {
    let mut world = World::new(WorldConfig {
        machine_stack_size: 3,
        ..Default::default()
    });
    let line = source_line(&mut world, pos(0, 0), 4, 0.25);
    run_ticks(&mut world, 400, 0.25);

    let smelter = world.machine(line.sink).unwrap();
    assert_eq!(smelter.output_inventory(ingot()).unwrap().get_amount(ingot()), 3);
    assert_eq!(smelter.input_inventory(ore()).unwrap().get_amount(ore()), 3);
    assert!(!smelter.is_processing());

    for &belt in &line.belts {
        let b = world.belt(belt).unwrap();
        assert_eq!(b.carried_item(), Some(ore()));
        assert!(b.is_blocked());
        assert_eq!(b.progress(), Fixed64::ONE);
    }
    let source = world.machine(line.source).unwrap();
    assert_eq!(source.output_inventory(ore()).unwrap().get_amount(ore()), 3);
    assert!(!source.is_processing());

    // Nothing moves any more.
    let hash = world.state_hash();
    let report = run_ticks(&mut world, 10, 0.25);
    assert_eq!(report.handoffs, 0);
    assert_eq!(total_of(&world, ore()), 3 + 4 + 3);
    assert_ne!(hash, world.state_hash(), "tick counter is part of the hash");
}

// ===========================================================================
// Test 4: splitter deals left, straight, right
// ===========================================================================
//
//   SSS  N
//   SSS > X E
//   SSS  S

#[test]
fn splitter_round_robin_order() {
    let mut world = World::default();
    let mut payer = ItemLedger::new();
    world
        .place_machine(&machine_class("Source", vec![source_recipe(ore(), 0.25)]), pos(0, 0), &mut payer)
        .unwrap();
    belt_line(&mut world, pos(3, 1), 1, Direction::East);
    let north = belt_line(&mut world, pos(4, 0), 1, Direction::North)[0];
    let east = belt_line(&mut world, pos(5, 1), 1, Direction::East)[0];
    let south = belt_line(&mut world, pos(4, 2), 1, Direction::South)[0];
    let splitter = world
        .place_splitter(&free_splitter(), pos(4, 1), Direction::East, &mut payer)
        .unwrap();
    let seen = splitter_handoffs(&mut world);

    run_ticks(&mut world, 100, 0.25);

    assert_eq!(*seen.borrow(), vec![north, east, south]);
    for belt in [north, east, south] {
        assert!(world.belt(belt).unwrap().is_blocked());
    }
    let s = world.splitter(splitter).unwrap();
    assert_eq!(s.carried_item(), Some(ore()));
    assert_eq!(s.progress(), Fixed64::ONE);
}

// ===========================================================================
// Test 5: a jammed output does not starve the others
// ===========================================================================

#[test]
fn splitter_skips_blocked_output_fairly() {
    let mut world = World::default();
    let mut payer = ItemLedger::new();
    let smelter = machine_class("Smelter", vec![smelt_recipe()]);
    world
        .place_machine(&machine_class("Source", vec![source_recipe(ore(), 0.25)]), pos(0, 0), &mut payer)
        .unwrap();
    belt_line(&mut world, pos(3, 1), 1, Direction::East);
    let left = belt_line(&mut world, pos(4, 0), 1, Direction::North)[0];
    let straight = belt_line(&mut world, pos(5, 1), 1, Direction::East)[0];
    let right = belt_line(&mut world, pos(4, 2), 1, Direction::South)[0];
    world.place_machine(&smelter, pos(6, 0), &mut payer).unwrap();
    world.place_machine(&smelter, pos(3, 3), &mut payer).unwrap();
    world
        .place_splitter(&free_splitter(), pos(4, 1), Direction::East, &mut payer)
        .unwrap();
    let seen = splitter_handoffs(&mut world);

    run_ticks(&mut world, 400, 0.25);

    let count = |belt: BeltId| seen.borrow().iter().filter(|&&b| b == belt).count();
    assert_eq!(count(left), 1);
    assert!(count(straight) >= 10);
    assert!(count(straight).abs_diff(count(right)) <= 1);
}

// ===========================================================================
// Test 6: stock content with a real player inventory
// ===========================================================================

#[test]
fn stock_content_build_and_refund() {
    let content = content::stock().unwrap();
    let iron_ingot = content.item("iron_ingot").unwrap();
    let copper_ingot = content.item("copper_ingot").unwrap();
    let iron_ore = content.item("iron_ore").unwrap();

    let mut player = content.player_inventory();
    assert!(player.try_add(iron_ingot, 50));
    assert!(player.try_add(copper_ingot, 10));

    let mut world = World::default();
    let smelter = content.machine_class("Smelter").unwrap();
    let id = world.place_machine(smelter, pos(0, 0), &mut player).unwrap();
    let belts = world
        .place_belt_run(
            &[pos(3, 1), pos(4, 1), pos(5, 1)],
            Direction::East,
            content.belt_tier("basic").unwrap(),
            &mut player,
        )
        .unwrap();
    assert_eq!(player.get_amount(iron_ingot), 50 - 2 - 6);
    assert_eq!(player.get_amount(copper_ingot), 9);

    // Feed the smelter by hand and let it run one cycle.
    assert!(world.machine_mut(id).unwrap().insert_input(iron_ore, 4));
    run_ticks(&mut world, 8, 0.25);
    assert_eq!(
        world.machine(id).unwrap().output_inventory(iron_ingot).unwrap().get_amount(iron_ingot),
        1
    );

    // The first belt pulls the ingot out on the next tick.
    run_ticks(&mut world, 1, 0.25);
    assert_eq!(world.belt(belts[0]).unwrap().carried_item(), Some(iron_ingot));

    // A basic belt crosses a cell in half a second, then hands the ingot on.
    run_ticks(&mut world, 2, 0.25);
    assert_eq!(world.belt(belts[0]).unwrap().carried_item(), None);
    assert_eq!(world.belt(belts[1]).unwrap().carried_item(), Some(iron_ingot));

    let refund = world.remove_machine(id, &mut player).unwrap();
    assert_eq!(
        refund,
        vec![ItemAmount::new(iron_ore, 1), ItemAmount::new(iron_ingot, 2), ItemAmount::new(copper_ingot, 1)]
    );
    assert_eq!(player.get_amount(iron_ore), 1);
    assert_eq!(player.get_amount(copper_ingot), 10);

    let refund = world.remove_belt_run(belts[2], &mut player).unwrap();
    assert_eq!(refund, vec![ItemAmount::new(iron_ingot, 7)]);
    assert_eq!(player.get_amount(iron_ingot), 42 + 2 + 7);
    assert_eq!(world.belt_count(), 0);
}

// ===========================================================================
// Test 7: a full player inventory refuses refunds
// ===========================================================================

#[test]
fn full_inventory_blocks_removal() {
    let mut world = World::default();
    let mut payer = ledger_with(&[ingot()], 10);
    let class = beltworks_core::machine::MachineClass {
        build_cost: vec![ItemAmount::new(ingot(), 5)],
        ..machine_class("Smelter", vec![smelt_recipe()])
    };
    let id = world.place_machine(&class, pos(0, 0), &mut payer).unwrap();

    let mut full = SlottedInventory::with_max_stack(1, 1, 10);
    assert!(full.try_add(coal(), 10));
    assert_eq!(world.remove_machine(id, &mut full), Err(SimError::SlotCapacityExceeded));
    assert!(world.machine(id).is_some());
    assert_eq!(world.machine_at(pos(1, 1)), Some(id));
    assert_eq!(full.get_amount(coal()), 10);

    let mut roomy = SlottedInventory::new(5, 9);
    assert_eq!(world.remove_machine(id, &mut roomy).unwrap(), vec![ItemAmount::new(ingot(), 5)]);
    assert_eq!(roomy.get_amount(ingot()), 5);
}

// ===========================================================================
// Test 8: recipe switching through the player inventory
// ===========================================================================

#[test]
fn recipe_switch_flushes_into_player() {
    let content = content::stock().unwrap();
    let iron_ore = content.item("iron_ore").unwrap();
    let smelter = content.machine_class("Smelter").unwrap();
    let mut world = World::default();
    let mut dev = ItemLedger::with_items(&smelter.build_cost);
    let id = world.place_machine(smelter, pos(0, 0), &mut dev).unwrap();
    assert!(world.machine_mut(id).unwrap().insert_input(iron_ore, 7));
    run_ticks(&mut world, 2, 0.25);
    assert!(world.machine(id).unwrap().is_processing());

    let mut player = content.player_inventory();
    let flushed = world.select_machine_recipe(id, 2, &mut player).unwrap();
    assert_eq!(flushed, vec![ItemAmount::new(iron_ore, 7)]);
    assert_eq!(player.get_amount(iron_ore), 7);

    let snap = world.snapshot_machine(id).unwrap();
    assert_eq!(snap.recipe_name, "Zinc_Ingot");
    assert!(!snap.processing);
    assert_eq!(snap.process_timer, Fixed64::ZERO);
    assert_eq!(snap.inputs, vec![ItemAmount::new(content.item("zinc_ore").unwrap(), 0)]);

    // Any valid recipe is allowed through the sandbox path.
    let plate = content.recipe("Iron_Plate").unwrap().clone();
    world.set_machine_recipe(id, plate, &mut player).unwrap();
    assert_eq!(world.machine(id).unwrap().recipe().name(), "Iron_Plate");
}

// ===========================================================================
// Test 9: events arrive once per tick, suppressed kinds never
// ===========================================================================

#[test]
fn events_delivered_after_tick() {
    let mut world = World::default();
    let completed = Rc::new(RefCell::new(0u32));
    let counter = completed.clone();
    world.on_event(
        EventKind::RecipeCompleted,
        Box::new(move |_: &Event| *counter.borrow_mut() += 1),
    );
    world.suppress_event(EventKind::ItemPulled);

    let line = source_line(&mut world, pos(0, 0), 2, 0.5);
    run_ticks(&mut world, 40, 0.25);

    // The source finishes every other tick: 20 cycles, plus any smelter cycles.
    let smelter_cycles = world.machine(line.sink).map_or(0, |m| {
        m.output_inventory(ingot()).unwrap().get_amount(ingot())
    });
    assert_eq!(*completed.borrow(), 20 + smelter_cycles);
    assert_eq!(world.event_bus().total_emitted(EventKind::ItemPulled), 0);
    assert!(world.event_bus().total_emitted(EventKind::ItemHandedOff) > 0);
    assert_eq!(world.event_bus().buffered_count(EventKind::RecipeCompleted), 0);
}

// ===========================================================================
// Test 10: determinism
// ===========================================================================

#[test]
fn identical_runs_hash_identically() {
    let build = || {
        let mut world = World::default();
        source_line(&mut world, pos(0, 0), 5, 0.5);
        belt_line(&mut world, pos(19, 20), 1, Direction::East);
        world
            .place_splitter(&free_splitter(), pos(20, 20), Direction::East, &mut ItemLedger::new())
            .unwrap();
        world
    };
    let mut a = build();
    let mut b = build();
    for _ in 0..200 {
        a.tick(fixed(0.1)).unwrap();
        b.tick(fixed(0.1)).unwrap();
        assert_eq!(a.last_tick_hash(), b.last_tick_hash());
    }
    assert_eq!(a.snapshot_all_belts(), b.snapshot_all_belts());
    assert_eq!(a.snapshot_all_machines(), b.snapshot_all_machines());
}

// ===========================================================================
// Test 11: the fixed-step accumulator with the default timestep
// ===========================================================================

#[test]
fn advance_runs_sixty_steps_per_second() {
    let mut world = World::default();
    source_line(&mut world, pos(0, 0), 3, 0.5);
    let report = world.advance(Fixed64::ONE).unwrap();
    assert_eq!(report.steps_run, 60);
    assert_eq!(world.tick_count(), 60);
    let report = world.advance(Fixed64::ONE / Fixed64::from_num(120)).unwrap();
    assert_eq!(report.steps_run, 0);
}

// ===========================================================================
// Test 12: snapshots mirror live state
// ===========================================================================

#[test]
fn snapshots_follow_placement_order() {
    let mut world = World::default();
    let line = source_line(&mut world, pos(0, 0), 3, 0.5);
    run_ticks(&mut world, 4, 0.25);

    let belts = world.snapshot_all_belts();
    assert_eq!(belts.iter().map(|s| s.id).collect::<Vec<_>>(), line.belts);
    assert_eq!(belts[0].position, GridPosition::new(3, 1));
    assert_eq!(belts[0].carried_item, Some(ore()));
    assert_eq!(belts[0].progress, fixed(0.5));
    assert!(belts[1..].iter().all(|s| s.carried_item.is_none()));

    let machines = world.snapshot_all_machines();
    assert_eq!(machines.len(), 2);
    assert_eq!(machines[0].class_name, "Source");
    assert_eq!(machines[1].inputs, vec![ItemAmount::new(ore(), 0)]);
    assert!(world.snapshot_all_splitters().is_empty());
}
