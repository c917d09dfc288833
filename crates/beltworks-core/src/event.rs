//! Typed simulation events with pre-allocated ring buffers.
//!
//! Events are emitted while belts, splitters and machines update (and by
//! placement/removal between ticks), then delivered in one batch at the end
//! of the next tick. Each [`EventKind`] gets its own [`EventBuffer`] with a
//! fixed capacity; when a buffer is full the oldest events are dropped.
//!
//! Kinds can be suppressed with [`EventBus::suppress`], after which they are
//! never recorded or allocated.

use crate::entity::EntityRef;
use crate::fixed::Ticks;
use crate::id::{BeltId, ItemTypeId, MachineId};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Production --
    RecipeStarted {
        machine: MachineId,
        tick: Ticks,
    },
    RecipeCompleted {
        machine: MachineId,
        tick: Ticks,
    },
    ItemConsumed {
        machine: MachineId,
        item: ItemTypeId,
        quantity: u32,
        tick: Ticks,
    },
    ItemProduced {
        machine: MachineId,
        item: ItemTypeId,
        quantity: u32,
        tick: Ticks,
    },

    // -- Transport --
    /// A belt or splitter passed an item on.
    ItemHandedOff {
        from: EntityRef,
        to: EntityRef,
        item: ItemTypeId,
        tick: Ticks,
    },
    /// A belt took one unit out of the machine behind it.
    ItemPulled {
        machine: MachineId,
        belt: BeltId,
        item: ItemTypeId,
        tick: Ticks,
    },
    /// A belt started holding its item at the cell edge.
    BeltBlocked {
        belt: BeltId,
        tick: Ticks,
    },

    // -- Structure --
    EntityPlaced {
        entity: EntityRef,
        tick: Ticks,
    },
    EntityRemoved {
        entity: EntityRef,
        tick: Ticks,
    },
    RecipeChanged {
        machine: MachineId,
        recipe: String,
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for suppression and subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RecipeStarted,
    RecipeCompleted,
    ItemConsumed,
    ItemProduced,
    ItemHandedOff,
    ItemPulled,
    BeltBlocked,
    EntityPlaced,
    EntityRemoved,
    RecipeChanged,
}

const EVENT_KIND_COUNT: usize = 10;

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::RecipeStarted { .. } => EventKind::RecipeStarted,
            Event::RecipeCompleted { .. } => EventKind::RecipeCompleted,
            Event::ItemConsumed { .. } => EventKind::ItemConsumed,
            Event::ItemProduced { .. } => EventKind::ItemProduced,
            Event::ItemHandedOff { .. } => EventKind::ItemHandedOff,
            Event::ItemPulled { .. } => EventKind::ItemPulled,
            Event::BeltBlocked { .. } => EventKind::BeltBlocked,
            Event::EntityPlaced { .. } => EventKind::EntityPlaced,
            Event::EntityRemoved { .. } => EventKind::EntityRemoved,
            Event::RecipeChanged { .. } => EventKind::RecipeChanged,
        }
    }

    pub fn tick(&self) -> Ticks {
        match self {
            Event::RecipeStarted { tick, .. }
            | Event::RecipeCompleted { tick, .. }
            | Event::ItemConsumed { tick, .. }
            | Event::ItemProduced { tick, .. }
            | Event::ItemHandedOff { tick, .. }
            | Event::ItemPulled { tick, .. }
            | Event::BeltBlocked { tick, .. }
            | Event::EntityPlaced { tick, .. }
            | Event::EntityRemoved { tick, .. }
            | Event::RecipeChanged { tick, .. } => *tick,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer for events. Fixed capacity; when full, the
/// oldest events are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<Event>>,
    /// Next write position, which is also the oldest entry once full.
    head: usize,
    len: usize,
    total_written: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Events written since creation, dropped ones included.
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Events oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        let start = if self.len < self.capacity() { 0 } else { self.head };
        let capacity = self.capacity();
        (0..self.len).filter_map(move |i| self.events[(start + i) % capacity].as_ref())
    }

    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// A read-only listener, called once per delivered event of its kind.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// One ring buffer per event kind, plus listeners and suppression flags.
pub struct EventBus {
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    listeners: [Vec<PassiveListener>; EVENT_KIND_COUNT],
    capacity: usize,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            listeners: Default::default(),
            capacity,
        }
    }

    /// Stop recording a kind. Its buffer is dropped.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    pub fn unsuppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = false;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Record an event for the next delivery. No-op for suppressed kinds.
    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        let capacity = self.capacity;
        self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(event);
    }

    /// Listeners run in registration order.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.listeners[kind.index()].push(listener);
    }

    /// Hand every buffered event to its listeners, oldest first, then clear
    /// the buffers.
    pub fn deliver(&mut self) {
        for idx in 0..EVENT_KIND_COUNT {
            let Some(buffer) = self.buffers[idx].as_mut() else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }
            for listener in &mut self.listeners[idx] {
                for event in buffer.iter() {
                    listener(event);
                }
            }
            buffer.clear();
        }
    }

    /// Events waiting for delivery.
    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffer(kind).map_or(0, EventBuffer::len)
    }

    /// Events ever emitted for a kind, dropped ones included.
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffer(kind).map_or(0, EventBuffer::total_written)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
