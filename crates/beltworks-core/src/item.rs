use crate::id::ItemTypeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Default stack limit for a slot when nothing more specific is configured.
pub const DEFAULT_MAX_STACK_SIZE: u32 = 100;

/// A quantity of one item type. Recipes, build costs and refunds are all
/// ordered lists of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemAmount {
    pub item: ItemTypeId,
    pub quantity: u32,
}

impl ItemAmount {
    pub fn new(item: ItemTypeId, quantity: u32) -> Self {
        Self { item, quantity }
    }
}

/// Scale every entry of a cost list by `count`, e.g. a per-segment belt
/// cost times the length of the run.
pub fn scale_amounts(amounts: &[ItemAmount], count: u32) -> Vec<ItemAmount> {
    amounts
        .iter()
        .map(|a| ItemAmount::new(a.item, a.quantity.saturating_mul(count)))
        .collect()
}

/// Fold duplicate item entries together, keeping first-seen order and
/// dropping zero quantities.
pub fn merge_amounts(amounts: impl IntoIterator<Item = ItemAmount>) -> Vec<ItemAmount> {
    let mut merged: Vec<ItemAmount> = Vec::new();
    for amount in amounts {
        if amount.quantity == 0 {
            continue;
        }
        match merged.iter_mut().find(|m| m.item == amount.item) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(amount.quantity),
            None => merged.push(amount),
        }
    }
    merged
}

// ---------------------------------------------------------------------------
// Stack limits
// ---------------------------------------------------------------------------

/// Per-item stack caps. Items without an entry fall back to whatever limit
/// the holding inventory was built with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackLimits {
    caps: BTreeMap<ItemTypeId, u32>,
}

impl StackLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, item: ItemTypeId, max_stack_size: u32) {
        self.caps.insert(item, max_stack_size);
    }

    pub fn get(&self, item: ItemTypeId) -> Option<u32> {
        self.caps.get(&item).copied()
    }

    /// The tighter of `item`'s own cap and `fallback`.
    pub fn cap(&self, item: ItemTypeId, fallback: u32) -> u32 {
        self.get(item).map_or(fallback, |cap| cap.min(fallback))
    }

    pub fn is_empty(&self) -> bool {
        self.caps.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// An item type definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDef {
    pub name: String,
    pub max_stack_size: u32,
}

/// Errors raised while building a catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("item '{0}' is registered twice")]
    DuplicateItem(String),
    #[error("item '{name}' has a zero stack size")]
    ZeroStackSize { name: String },
}

/// Builder for an immutable [`ItemCatalog`].
#[derive(Debug, Default)]
pub struct ItemCatalogBuilder {
    items: Vec<ItemDef>,
    name_to_id: HashMap<String, ItemTypeId>,
}

impl ItemCatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item type. Ids are handed out densely in registration
    /// order.
    pub fn register_item(
        &mut self,
        name: &str,
        max_stack_size: u32,
    ) -> Result<ItemTypeId, CatalogError> {
        if self.name_to_id.contains_key(name) {
            return Err(CatalogError::DuplicateItem(name.to_string()));
        }
        if max_stack_size == 0 {
            return Err(CatalogError::ZeroStackSize {
                name: name.to_string(),
            });
        }
        let id = ItemTypeId(self.items.len() as u32);
        self.items.push(ItemDef {
            name: name.to_string(),
            max_stack_size,
        });
        self.name_to_id.insert(name.to_string(), id);
        Ok(id)
    }

    /// Id of an already registered item.
    pub fn id(&self, name: &str) -> Option<ItemTypeId> {
        self.name_to_id.get(name).copied()
    }

    pub fn build(self) -> ItemCatalog {
        ItemCatalog {
            items: self.items,
            name_to_id: self.name_to_id,
        }
    }
}

/// Frozen item catalog: name <-> id and per-item stack limits.
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    items: Vec<ItemDef>,
    name_to_id: HashMap<String, ItemTypeId>,
}

impl ItemCatalog {
    pub fn id(&self, name: &str) -> Option<ItemTypeId> {
        self.name_to_id.get(name).copied()
    }

    pub fn get(&self, id: ItemTypeId) -> Option<&ItemDef> {
        self.items.get(id.0 as usize)
    }

    pub fn name(&self, id: ItemTypeId) -> Option<&str> {
        self.get(id).map(|def| def.name.as_str())
    }

    /// Stack limit for an item, falling back to [`DEFAULT_MAX_STACK_SIZE`]
    /// for ids the catalog does not know.
    pub fn max_stack_size(&self, id: ItemTypeId) -> u32 {
        self.get(id)
            .map(|def| def.max_stack_size)
            .unwrap_or(DEFAULT_MAX_STACK_SIZE)
    }

    /// Every registered item's stack size, for handing to inventories.
    pub fn stack_limits(&self) -> StackLimits {
        let mut limits = StackLimits::new();
        for (id, def) in self.iter() {
            limits.set(id, def.max_stack_size);
        }
        limits
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All registered items in id order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemTypeId, &ItemDef)> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, def)| (ItemTypeId(i as u32), def))
    }
}
