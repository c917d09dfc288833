//! Headless runner: builds a small smelting line from the stock content, runs
//! it for a minute of game time twice, and checks both runs agree.
//!
//! Run with: `RUST_LOG=debug cargo run --package beltworks-core --example headless_runner`

use beltworks_core::content::{self, Content, MACHINE_FOOTPRINT};
use beltworks_core::event::{Event, EventKind};
use beltworks_core::fixed::Fixed64;
use beltworks_core::item::ItemAmount;
use beltworks_core::machine::MachineClass;
use beltworks_core::recipe::Recipe;
use beltworks_core::world::World;
use beltworks_core::{Direction, GridPosition};
use log::info;

const SECONDS: u32 = 60;
const BELT_LEN: i32 = 6;

fn build(content: &Content) -> Result<World, Box<dyn std::error::Error>> {
    let iron_ore = content.item("iron_ore").ok_or("missing iron_ore")?;
    let iron_ingot = content.item("iron_ingot").ok_or("missing iron_ingot")?;
    let copper_ingot = content.item("copper_ingot").ok_or("missing copper_ingot")?;

    let mut player = content.player_inventory();
    player.try_add(iron_ingot, 40);
    player.try_add(copper_ingot, 10);

    let mine = MachineClass {
        name: "Mine".to_string(),
        footprint: MACHINE_FOOTPRINT,
        build_cost: Vec::new(),
        recipes: vec![Recipe::new(
            "Mine_Iron",
            Vec::new(),
            [ItemAmount::new(iron_ore, 1)],
            Fixed64::from_num(0.5),
        )?],
    };
    let smelter = content.machine_class("Smelter").ok_or("missing Smelter")?;
    let basic = content.belt_tier("basic").ok_or("missing basic belt")?;

    let mut world = World::default();
    world.set_stack_limits(content.catalog.stack_limits());
    world.place_machine(&mine, GridPosition::new(0, 0), &mut player)?;
    let cells: Vec<GridPosition> = (0..BELT_LEN).map(|i| GridPosition::new(3 + i, 1)).collect();
    world.place_belt_run(&cells, Direction::East, basic, &mut player)?;
    world.place_machine(smelter, GridPosition::new(3 + BELT_LEN, 0), &mut player)?;

    info!(
        "built line: {} machines, {} belts, player holds {} items",
        world.machine_count(),
        world.belt_count(),
        player.total()
    );
    Ok(world)
}

fn run(content: &Content) -> Result<(World, u64), Box<dyn std::error::Error>> {
    let mut world = build(content)?;
    let blocked = std::rc::Rc::new(std::cell::Cell::new(0u64));
    let counter = blocked.clone();
    world.on_event(
        EventKind::BeltBlocked,
        Box::new(move |_: &Event| counter.set(counter.get() + 1)),
    );
    for _ in 0..SECONDS {
        world.advance(Fixed64::from_num(1))?;
    }
    Ok((world, blocked.get()))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let content = content::stock()?;

    let (first, blocked) = run(&content)?;
    println!(
        "After {SECONDS} s ({} ticks): state hash = {:#018x}, {blocked} belt stalls",
        first.tick_count(),
        first.state_hash()
    );
    for snap in first.snapshot_all_machines() {
        let inputs: u32 = snap.inputs.iter().map(|a| a.quantity).sum();
        let outputs: u32 = snap.outputs.iter().map(|a| a.quantity).sum();
        println!(
            "  [{:>8}] recipe={}, processing={}, progress={:.2}, in={inputs}, out={outputs}",
            snap.class_name,
            snap.recipe_name,
            snap.processing,
            snap.progress.to_num::<f64>()
        );
    }

    let (second, _) = run(&content)?;
    if first.state_hash() == second.state_hash() {
        println!("Determinism: PASS (hashes match)");
    } else {
        println!(
            "Determinism: FAIL! {:#018x} != {:#018x}",
            first.state_hash(),
            second.state_hash()
        );
        std::process::exit(1);
    }
    Ok(())
}
