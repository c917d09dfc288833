//! Slot-based storage shared by machines and the player.
//!
//! A [`SlottedInventory`] is a `width x height` grid of stacks, each capped at
//! the inventory's `max_stack_size` or the item's own [`StackLimits`] entry,
//! whichever is lower. Every scan (fill, drain, lookup) walks
//! the slots in row-major order; that order is the tie-break for which slot
//! is touched first and keeps results reproducible.
//!
//! The [`ItemSink`] and [`CostPayer`] traits are the two contracts the world
//! uses when it refunds items or charges build costs. Both are atomic.

use crate::id::ItemTypeId;
use crate::item::{DEFAULT_MAX_STACK_SIZE, ItemAmount, StackLimits, merge_amounts};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Collaborator contracts
// ---------------------------------------------------------------------------

/// Something that can take items handed back by the world (recipe flushes,
/// removal refunds). Must be all-or-nothing: on `false` nothing was taken.
pub trait ItemSink {
    fn deposit_all(&mut self, items: &[ItemAmount]) -> bool;
}

/// Something that pays build costs.
pub trait CostPayer {
    fn has_all(&self, cost: &[ItemAmount]) -> bool;

    /// Remove the whole cost or nothing.
    fn remove_all(&mut self, cost: &[ItemAmount]) -> bool;
}

// ---------------------------------------------------------------------------
// SlottedInventory
// ---------------------------------------------------------------------------

/// A non-empty stack in one slot. Empty slots are `None`, so a zero amount is
/// never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotStack {
    pub item: ItemTypeId,
    pub amount: u32,
}

/// A fixed-size grid of stack slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlottedInventory {
    width: u32,
    height: u32,
    max_stack_size: u32,
    #[serde(default)]
    limits: StackLimits,
    /// Row-major: slot `(x, y)` lives at `y * width + x`.
    slots: Vec<Option<SlotStack>>,
}

impl SlottedInventory {
    /// A `width x height` inventory with the default stack limit.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_max_stack(width, height, DEFAULT_MAX_STACK_SIZE)
    }

    pub fn with_max_stack(width: u32, height: u32, max_stack_size: u32) -> Self {
        Self {
            width,
            height,
            max_stack_size,
            limits: StackLimits::default(),
            slots: vec![None; (width as usize) * (height as usize)],
        }
    }

    /// A single-slot inventory, the shape machines use per item.
    pub fn single(max_stack_size: u32) -> Self {
        Self::with_max_stack(1, 1, max_stack_size)
    }

    /// Cap individual items below `max_stack_size`.
    pub fn with_limits(mut self, limits: StackLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn max_stack_size(&self) -> u32 {
        self.max_stack_size
    }

    /// Most of `item` one slot may hold.
    pub fn stack_cap(&self, item: ItemTypeId) -> u32 {
        self.limits.cap(item, self.max_stack_size)
    }

    /// The stack at `(x, y)`, if any.
    pub fn slot(&self, x: u32, y: u32) -> Option<&SlotStack> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.slots[(y * self.width + x) as usize].as_ref()
    }

    /// Non-empty stacks in row-major order.
    pub fn stacks(&self) -> impl Iterator<Item = &SlotStack> {
        self.slots.iter().flatten()
    }

    /// Room left for `item` across matching partial stacks and empty slots.
    fn headroom(&self, item: ItemTypeId) -> u64 {
        let max = self.stack_cap(item);
        self.slots
            .iter()
            .map(|slot| match slot {
                None => max as u64,
                Some(stack) if stack.item == item => max.saturating_sub(stack.amount) as u64,
                Some(_) => 0,
            })
            .sum()
    }

    /// Whether `try_add(item, amount)` would succeed. No mutation.
    pub fn can_add(&self, item: ItemTypeId, amount: u32) -> bool {
        self.headroom(item) >= amount as u64
    }

    /// Add `amount` of `item`, or nothing at all if it does not fit.
    ///
    /// Tops up existing partial stacks of the same item first, then fills
    /// empty slots, both in row-major order.
    pub fn try_add(&mut self, item: ItemTypeId, amount: u32) -> bool {
        if !self.can_add(item, amount) {
            return false;
        }

        let max = self.stack_cap(item);
        let mut remaining = amount;

        for stack in self.slots.iter_mut().flatten() {
            if remaining == 0 {
                break;
            }
            if stack.item == item && stack.amount < max {
                let moved = (max - stack.amount).min(remaining);
                stack.amount += moved;
                remaining -= moved;
            }
        }

        for slot in self.slots.iter_mut() {
            if remaining == 0 {
                break;
            }
            if slot.is_none() {
                let moved = max.min(remaining);
                *slot = Some(SlotStack {
                    item,
                    amount: moved,
                });
                remaining -= moved;
            }
        }

        debug_assert_eq!(remaining, 0, "can_add admitted more than fits");
        true
    }

    /// Remove `amount` of `item`, or nothing if fewer are stored. Drains
    /// slots in row-major order and clears any that reach zero.
    pub fn remove(&mut self, item: ItemTypeId, amount: u32) -> bool {
        if (self.get_amount(item) as u64) < amount as u64 {
            return false;
        }

        let mut remaining = amount;
        for slot in self.slots.iter_mut() {
            if remaining == 0 {
                break;
            }
            let Some(stack) = slot.as_mut() else {
                continue;
            };
            if stack.item != item {
                continue;
            }
            let taken = stack.amount.min(remaining);
            stack.amount -= taken;
            remaining -= taken;
            if stack.amount == 0 {
                *slot = None;
            }
        }
        true
    }

    /// Total of `item` across all slots.
    pub fn get_amount(&self, item: ItemTypeId) -> u32 {
        self.stacks()
            .filter(|stack| stack.item == item)
            .map(|stack| stack.amount)
            .sum()
    }

    /// Total items of any type.
    pub fn total(&self) -> u64 {
        self.stacks().map(|stack| stack.amount as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Whether every requirement is held. Duplicate entries are summed.
    pub fn has_all(&self, required: &[ItemAmount]) -> bool {
        merge_amounts(required.iter().copied())
            .iter()
            .all(|req| self.get_amount(req.item) >= req.quantity)
    }

    /// Remove every requirement, or nothing.
    pub fn remove_all(&mut self, required: &[ItemAmount]) -> bool {
        if !self.has_all(required) {
            return false;
        }
        for req in merge_amounts(required.iter().copied()) {
            let removed = self.remove(req.item, req.quantity);
            debug_assert!(removed, "has_all admitted a missing requirement");
        }
        true
    }

    /// Add every entry, or nothing.
    pub fn add_all(&mut self, items: &[ItemAmount]) -> bool {
        let mut staged = self.clone();
        for amount in items {
            if !staged.try_add(amount.item, amount.quantity) {
                return false;
            }
        }
        *self = staged;
        true
    }

    /// Per-item totals, ordered by first appearance in row-major order.
    pub fn contents(&self) -> Vec<ItemAmount> {
        merge_amounts(
            self.stacks()
                .map(|stack| ItemAmount::new(stack.item, stack.amount)),
        )
    }

    /// Take everything out, returning per-item totals as [`contents`] does.
    ///
    /// [`contents`]: SlottedInventory::contents
    pub fn drain(&mut self) -> Vec<ItemAmount> {
        let contents = self.contents();
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        contents
    }
}

impl ItemSink for SlottedInventory {
    fn deposit_all(&mut self, items: &[ItemAmount]) -> bool {
        self.add_all(items)
    }
}

impl CostPayer for SlottedInventory {
    fn has_all(&self, cost: &[ItemAmount]) -> bool {
        SlottedInventory::has_all(self, cost)
    }

    fn remove_all(&mut self, cost: &[ItemAmount]) -> bool {
        SlottedInventory::remove_all(self, cost)
    }
}

// ---------------------------------------------------------------------------
// ItemLedger
// ---------------------------------------------------------------------------

/// An unbounded per-item tally. Accepts every deposit, which makes it the
/// sink of choice for sandbox play and for conservation checks in tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLedger {
    counts: BTreeMap<ItemTypeId, u64>,
}

impl ItemLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger pre-loaded with the given amounts.
    pub fn with_items(items: &[ItemAmount]) -> Self {
        let mut ledger = Self::new();
        for amount in items {
            ledger.add(amount.item, amount.quantity as u64);
        }
        ledger
    }

    pub fn add(&mut self, item: ItemTypeId, amount: u64) {
        if amount > 0 {
            *self.counts.entry(item).or_insert(0) += amount;
        }
    }

    pub fn get_amount(&self, item: ItemTypeId) -> u64 {
        self.counts.get(&item).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemTypeId, u64)> + '_ {
        self.counts.iter().map(|(&item, &count)| (item, count))
    }
}

impl ItemSink for ItemLedger {
    fn deposit_all(&mut self, items: &[ItemAmount]) -> bool {
        for amount in items {
            self.add(amount.item, amount.quantity as u64);
        }
        true
    }
}

impl CostPayer for ItemLedger {
    fn has_all(&self, cost: &[ItemAmount]) -> bool {
        merge_amounts(cost.iter().copied())
            .iter()
            .all(|c| self.get_amount(c.item) >= c.quantity as u64)
    }

    fn remove_all(&mut self, cost: &[ItemAmount]) -> bool {
        if !CostPayer::has_all(self, cost) {
            return false;
        }
        for c in merge_amounts(cost.iter().copied()) {
            if let Some(count) = self.counts.get_mut(&c.item) {
                *count -= c.quantity as u64;
                if *count == 0 {
                    self.counts.remove(&c.item);
                }
            }
        }
        true
    }
}
