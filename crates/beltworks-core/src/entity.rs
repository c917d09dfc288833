//! The capability set every grid-placed entity shares, and the tagged handle
//! the world index stores per cell.

use beltworks_spatial::{Direction, GridRect};
use serde::{Deserialize, Serialize};

use crate::belt::BeltSegment;
use crate::id::{BeltId, ItemTypeId, MachineId, SplitterId};
use crate::machine::ProductionMachine;
use crate::splitter::Splitter;

/// A handle to one placed entity, whatever its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    Belt(BeltId),
    Splitter(SplitterId),
    Machine(MachineId),
}

impl EntityRef {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Belt(_) => EntityKind::Belt,
            EntityRef::Splitter(_) => EntityKind::Splitter,
            EntityRef::Machine(_) => EntityKind::Machine,
        }
    }

    pub fn as_belt(&self) -> Option<BeltId> {
        match self {
            EntityRef::Belt(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_splitter(&self) -> Option<SplitterId> {
        match self {
            EntityRef::Splitter(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_machine(&self) -> Option<MachineId> {
        match self {
            EntityRef::Machine(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<BeltId> for EntityRef {
    fn from(id: BeltId) -> Self {
        EntityRef::Belt(id)
    }
}

impl From<SplitterId> for EntityRef {
    fn from(id: SplitterId) -> Self {
        EntityRef::Splitter(id)
    }
}

impl From<MachineId> for EntityRef {
    fn from(id: MachineId) -> Self {
        EntityRef::Machine(id)
    }
}

/// Entity kind without the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Belt,
    Splitter,
    Machine,
}

/// What belts (and the index) need from anything on the grid.
pub trait GridEntity {
    /// Cells covered.
    fn rect(&self) -> GridRect;

    fn occupies(&self, rect: &GridRect) -> bool {
        self.rect().overlaps(rect)
    }

    /// Offer one unit of `item` travelling in direction `from`. On `false`
    /// nothing changed and the sender keeps the item.
    fn try_receive(&mut self, item: ItemTypeId, from: Direction) -> bool;
}

impl GridEntity for BeltSegment {
    fn rect(&self) -> GridRect {
        GridRect::cell(self.position())
    }

    fn try_receive(&mut self, item: ItemTypeId, from: Direction) -> bool {
        self.receive(item, from)
    }
}

impl GridEntity for Splitter {
    fn rect(&self) -> GridRect {
        GridRect::cell(self.position())
    }

    fn try_receive(&mut self, item: ItemTypeId, from: Direction) -> bool {
        self.receive(item, from)
    }
}

impl GridEntity for ProductionMachine {
    fn rect(&self) -> GridRect {
        ProductionMachine::rect(self)
    }

    /// Machines take items from any side, into the matching input slot.
    fn try_receive(&mut self, item: ItemTypeId, _from: Direction) -> bool {
        self.insert_input(item, 1)
    }
}
