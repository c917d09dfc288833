//! Beltworks Core -- the simulation engine for a grid-based factory game.
//!
//! Machines turn items into other items on a timer, conveyor belts move one
//! item per cell toward the next cell, and splitters deal items out round
//! robin. Everything lives on an integer grid indexed by
//! [`world::WorldIndex`], and all time and speed math uses deterministic
//! fixed-point arithmetic.
//!
//! # Tick Pipeline
//!
//! Each call to [`world::World::tick`] advances the simulation by one step
//! through the following phases:
//!
//! 1. **Reset** -- Clear per-tick arrival flags on belts and splitters.
//! 2. **Belts** -- Advance carried items, hand off or block, pull from machines.
//! 3. **Splitters** -- Advance and distribute round robin.
//! 4. **Machines** -- Start, run and complete recipes.
//! 5. **Post-tick** -- Deliver buffered events to listeners.
//! 6. **Bookkeeping** -- Increment the tick counter and compute the state hash.
//!
//! # Placement
//!
//! ```rust,ignore
//! let content = content::stock()?;
//! let mut world = World::default();
//! let mut player = content.player_inventory();
//! let smelter = content.machine_class("Smelter").unwrap();
//! let id = world.place_machine(smelter, GridPosition::new(0, 0), &mut player)?;
//! ```
//!
//! # Key Types
//!
//! - [`world::World`] -- Entity arenas, placement/removal and the tick pipeline.
//! - [`machine::ProductionMachine`] -- Idle/Processing recipe state machine.
//! - [`belt::BeltSegment`] -- Single-item conveyor cell with backpressure.
//! - [`splitter::Splitter`] -- Fair round-robin distributor.
//! - [`inventory::SlottedInventory`] -- Fixed grid of capped stacks.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.
//! - [`event::EventBus`] -- Ring-buffered events with passive listeners.

pub mod belt;
pub mod content;
#[cfg(feature = "data-loader")]
pub mod data_loader;
pub mod entity;
pub mod error;
pub mod event;
pub mod fixed;
pub mod id;
pub mod inventory;
pub mod item;
pub mod machine;
pub mod query;
pub mod recipe;
pub mod sim;
pub mod splitter;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use beltworks_spatial::{Direction, Footprint, GridPosition, GridRect};
