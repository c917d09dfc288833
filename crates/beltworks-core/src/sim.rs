//! Simulation configuration, per-call reports and the state hash.
//!
//! Time advances in fixed steps. [`World::tick`] runs exactly one step of
//! the given length; [`World::advance`] accumulates wall-clock time and runs
//! as many `fixed_timestep` steps as fit, carrying the remainder forward.
//!
//! [`World::tick`]: crate::world::World::tick
//! [`World::advance`]: crate::world::World::advance

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::fixed::{Fixed64, Ticks};
use crate::id::ItemTypeId;
use crate::item::{DEFAULT_MAX_STACK_SIZE, ItemAmount};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// World-wide settings. Every field has a default, so a partial document
/// deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Seconds per step for [`World::advance`](crate::world::World::advance).
    pub fixed_timestep: Fixed64,
    /// Ring buffer size per event kind.
    pub event_buffer_capacity: usize,
    /// Stack limit of every machine slot.
    pub machine_stack_size: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: Fixed64::ONE / Fixed64::from_num(60),
            event_buffer_capacity: 1024,
            machine_stack_size: DEFAULT_MAX_STACK_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Clock state tracked by the world.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimState {
    /// Completed steps.
    pub tick: Ticks,
    /// Simulated seconds so far.
    pub elapsed: Fixed64,
    /// Time waiting for the next fixed step in `advance`.
    pub accumulator: Fixed64,
    pub paused: bool,
}

// ---------------------------------------------------------------------------
// Tick report
// ---------------------------------------------------------------------------

/// What one `tick` or `advance` call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub steps_run: u64,
    /// Items consumed by machines, per item.
    pub consumed: BTreeMap<ItemTypeId, u64>,
    /// Items produced by machines, per item.
    pub produced: BTreeMap<ItemTypeId, u64>,
    /// Items that moved from a belt or splitter into another entity.
    pub handoffs: u64,
}

impl TickReport {
    pub(crate) fn record_consumed(&mut self, amounts: &[ItemAmount]) {
        for a in amounts {
            *self.consumed.entry(a.item).or_insert(0) += a.quantity as u64;
        }
    }

    pub(crate) fn record_produced(&mut self, amounts: &[ItemAmount]) {
        for a in amounts {
            *self.produced.entry(a.item).or_insert(0) += a.quantity as u64;
        }
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: TickReport) {
        self.steps_run += other.steps_run;
        self.handoffs += other.handoffs;
        for (item, n) in other.consumed {
            *self.consumed.entry(item).or_insert(0) += n;
        }
        for (item, n) in other.produced {
            *self.produced.entry(item).or_insert(0) += n;
        }
    }

    pub fn consumed_of(&self, item: ItemTypeId) -> u64 {
        self.consumed.get(&item).copied().unwrap_or(0)
    }

    pub fn produced_of(&self, item: ItemTypeId) -> u64 {
        self.produced.get(&item).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for desync detection.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    /// `None` hashes differently from every `Some`.
    pub fn write_item(&mut self, item: Option<ItemTypeId>) {
        match item {
            Some(id) => {
                self.write(&[1]);
                self.write_u32(id.0);
            }
            None => self.write(&[0]),
        }
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
