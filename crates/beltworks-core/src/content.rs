//! Game content: items, recipes, machine classes, belt tiers and the
//! splitter grade, all frozen after building.
//!
//! Content is authored by name. [`ContentBuilder`] resolves item and recipe
//! names to ids as it goes, so the stock set in [`stock`] and the JSON
//! loader share the same validation.

use std::collections::HashMap;

use beltworks_spatial::Footprint;

use crate::belt::BeltTier;
use crate::error::SimError;
use crate::fixed::Fixed64;
use crate::id::ItemTypeId;
use crate::inventory::SlottedInventory;
use crate::item::{CatalogError, DEFAULT_MAX_STACK_SIZE, ItemAmount, ItemCatalog, ItemCatalogBuilder};
use crate::machine::MachineClass;
use crate::recipe::Recipe;
use crate::splitter::{SPLITTER_ITEMS_PER_MINUTE, SplitterKind};

/// Player inventory columns.
pub const PLAYER_INVENTORY_WIDTH: u32 = 5;
/// Player inventory rows.
pub const PLAYER_INVENTORY_HEIGHT: u32 = 9;

/// Largest accepted items-per-minute rating for belts and splitters.
pub const MAX_ITEMS_PER_MINUTE: u32 = i32::MAX as u32;

/// Machines in the stock content are all this size.
pub const MACHINE_FOOTPRINT: Footprint = Footprint {
    width: 3,
    height: 3,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("{0}")]
    Sim(#[from] SimError),
    #[error("unknown item reference: {0}")]
    UnknownItem(String),
    #[error("unknown recipe reference: {0}")]
    UnknownRecipe(String),
    #[error("duplicate {kind} name: {name}")]
    Duplicate { kind: &'static str, name: String },
    #[error("{kind} '{name}' has rating {items_per_minute}/min, expected 1..={max}", max = MAX_ITEMS_PER_MINUTE)]
    InvalidRate {
        kind: &'static str,
        name: String,
        items_per_minute: u32,
    },
    #[error("machine class '{name}' has an empty footprint")]
    EmptyFootprint { name: String },
}

fn check_rate(kind: &'static str, name: &str, items_per_minute: u32) -> Result<(), ContentError> {
    if (1..=MAX_ITEMS_PER_MINUTE).contains(&items_per_minute) {
        Ok(())
    } else {
        Err(ContentError::InvalidRate {
            kind,
            name: name.to_string(),
            items_per_minute,
        })
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Content {
    pub catalog: ItemCatalog,
    pub recipes: Vec<Recipe>,
    pub machine_classes: Vec<MachineClass>,
    pub belt_tiers: Vec<BeltTier>,
    pub splitter: SplitterKind,
}

impl Content {
    pub fn item(&self, name: &str) -> Option<ItemTypeId> {
        self.catalog.id(name)
    }

    pub fn recipe(&self, name: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.name() == name)
    }

    pub fn machine_class(&self, name: &str) -> Option<&MachineClass> {
        self.machine_classes.iter().find(|c| c.name == name)
    }

    pub fn belt_tier(&self, name: &str) -> Option<&BeltTier> {
        self.belt_tiers.iter().find(|t| t.name == name)
    }

    /// An empty 5 x 9 player inventory honouring the catalog's stack sizes.
    pub fn player_inventory(&self) -> SlottedInventory {
        SlottedInventory::new(PLAYER_INVENTORY_WIDTH, PLAYER_INVENTORY_HEIGHT)
            .with_limits(self.catalog.stack_limits())
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ContentBuilder {
    items: ItemCatalogBuilder,
    recipes: Vec<Recipe>,
    recipe_index: HashMap<String, usize>,
    machine_classes: Vec<MachineClass>,
    belt_tiers: Vec<BeltTier>,
    splitter: Option<SplitterKind>,
}

impl ContentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item(&mut self, name: &str, max_stack_size: u32) -> Result<ItemTypeId, ContentError> {
        Ok(self.items.register_item(name, max_stack_size)?)
    }

    /// Resolve `(item name, quantity)` pairs.
    pub fn amounts(&self, entries: &[(&str, u32)]) -> Result<Vec<ItemAmount>, ContentError> {
        entries
            .iter()
            .map(|&(name, quantity)| {
                self.items
                    .id(name)
                    .map(|item| ItemAmount::new(item, quantity))
                    .ok_or_else(|| ContentError::UnknownItem(name.to_string()))
            })
            .collect()
    }

    pub fn recipe(
        &mut self,
        name: &str,
        inputs: &[(&str, u32)],
        outputs: &[(&str, u32)],
        process_time: Fixed64,
    ) -> Result<(), ContentError> {
        if self.recipe_index.contains_key(name) {
            return Err(ContentError::Duplicate {
                kind: "recipe",
                name: name.to_string(),
            });
        }
        let recipe = Recipe::new(name, self.amounts(inputs)?, self.amounts(outputs)?, process_time)?;
        self.recipe_index.insert(name.to_string(), self.recipes.len());
        self.recipes.push(recipe);
        Ok(())
    }

    /// A machine class offering the named recipes, first one as default.
    pub fn machine_class(
        &mut self,
        name: &str,
        footprint: Footprint,
        build_cost: &[(&str, u32)],
        recipes: &[&str],
    ) -> Result<(), ContentError> {
        if self.machine_classes.iter().any(|c| c.name == name) {
            return Err(ContentError::Duplicate {
                kind: "machine class",
                name: name.to_string(),
            });
        }
        if footprint.width == 0 || footprint.height == 0 {
            return Err(ContentError::EmptyFootprint {
                name: name.to_string(),
            });
        }
        let build_cost = self.amounts(build_cost)?;
        let recipes = recipes
            .iter()
            .map(|&r| {
                self.recipe_index
                    .get(r)
                    .map(|&i| self.recipes[i].clone())
                    .ok_or_else(|| ContentError::UnknownRecipe(r.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if recipes.is_empty() {
            return Err(SimError::EmptyMachineClass {
                name: name.to_string(),
            }
            .into());
        }
        self.machine_classes.push(MachineClass {
            name: name.to_string(),
            footprint,
            build_cost,
            recipes,
        });
        Ok(())
    }

    pub fn belt_tier(
        &mut self,
        name: &str,
        items_per_minute: u32,
        build_cost: &[(&str, u32)],
    ) -> Result<(), ContentError> {
        if self.belt_tiers.iter().any(|t| t.name == name) {
            return Err(ContentError::Duplicate {
                kind: "belt tier",
                name: name.to_string(),
            });
        }
        check_rate("belt tier", name, items_per_minute)?;
        let cost = self.amounts(build_cost)?;
        self.belt_tiers.push(BeltTier::new(name, items_per_minute, cost));
        Ok(())
    }

    /// Set the splitter grade. Without one, splitters are free and run at
    /// [`SPLITTER_ITEMS_PER_MINUTE`].
    pub fn splitter(
        &mut self,
        name: &str,
        items_per_minute: u32,
        build_cost: &[(&str, u32)],
    ) -> Result<(), ContentError> {
        check_rate("splitter", name, items_per_minute)?;
        let cost = self.amounts(build_cost)?;
        self.splitter = Some(SplitterKind::new(name, items_per_minute, cost));
        Ok(())
    }

    pub fn build(self) -> Content {
        Content {
            catalog: self.items.build(),
            recipes: self.recipes,
            machine_classes: self.machine_classes,
            belt_tiers: self.belt_tiers,
            splitter: self
                .splitter
                .unwrap_or_else(|| SplitterKind::new("splitter", SPLITTER_ITEMS_PER_MINUTE, Vec::new())),
        }
    }
}

// ---------------------------------------------------------------------------
// Stock content
// ---------------------------------------------------------------------------

/// The built-in sandbox content: iron, copper and zinc smelting plus steel,
/// brass and iron plates.
pub fn stock() -> Result<Content, ContentError> {
    let mut b = ContentBuilder::new();
    for name in [
        "iron_ore",
        "iron_ingot",
        "copper_ore",
        "copper_ingot",
        "zinc_ore",
        "zinc_ingot",
        "brass_ingot",
        "coal",
        "steel",
        "iron_plate",
    ] {
        b.item(name, DEFAULT_MAX_STACK_SIZE)?;
    }

    let secs = |s: i32| Fixed64::from_num(s);
    b.recipe("Iron_Ingot", &[("iron_ore", 3)], &[("iron_ingot", 1)], secs(2))?;
    b.recipe("Copper_Ingot", &[("copper_ore", 3)], &[("copper_ingot", 1)], secs(2))?;
    b.recipe("Zinc_Ingot", &[("zinc_ore", 1)], &[("zinc_ingot", 1)], secs(2))?;
    b.recipe("Steel", &[("iron_ingot", 2), ("coal", 2)], &[("steel", 1)], secs(3))?;
    b.recipe(
        "Brass",
        &[("copper_ingot", 3), ("zinc_ingot", 3)],
        &[("brass_ingot", 1)],
        secs(5),
    )?;
    b.recipe("Iron_Plate", &[("iron_ingot", 2)], &[("iron_plate", 1)], secs(1))?;

    b.machine_class(
        "Smelter",
        MACHINE_FOOTPRINT,
        &[("iron_ingot", 2), ("copper_ingot", 1)],
        &["Iron_Ingot", "Copper_Ingot", "Zinc_Ingot"],
    )?;
    b.machine_class(
        "Foundry",
        MACHINE_FOOTPRINT,
        &[("iron_ingot", 4), ("copper_ingot", 2)],
        &["Steel", "Brass"],
    )?;
    b.machine_class("Assembler", MACHINE_FOOTPRINT, &[("iron_ingot", 3)], &["Iron_Plate"])?;

    b.belt_tier("basic", 120, &[("iron_ingot", 2)])?;
    b.belt_tier("fast", 240, &[("iron_ingot", 5), ("copper_ingot", 1)])?;
    b.belt_tier("express", 480, &[("iron_ingot", 10), ("copper_ingot", 5)])?;

    b.splitter("splitter", SPLITTER_ITEMS_PER_MINUTE, &[("iron_ingot", 4)])?;

    Ok(b.build())
}
