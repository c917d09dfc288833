//! Content loading from JSON.
//!
//! Feature-gated behind `data-loader`. Items are declared first; recipes,
//! machine classes, belt tiers and the splitter then refer to them by name.
//!
//! ```json
//! {
//!   "items": [{"name": "iron_ore"}, {"name": "iron_ingot", "max_stack_size": 50}],
//!   "recipes": [{"name": "Iron_Ingot", "inputs": [{"item": "iron_ore", "quantity": 3}],
//!                "outputs": [{"item": "iron_ingot", "quantity": 1}], "seconds": 2.0}],
//!   "machines": [{"name": "Smelter", "recipes": ["Iron_Ingot"]}],
//!   "belt_tiers": [{"name": "basic", "items_per_minute": 120}]
//! }
//! ```

use beltworks_spatial::Footprint;

use crate::content::{Content, ContentBuilder, ContentError, MACHINE_FOOTPRINT};
use crate::error::SimError;
use crate::fixed::f64_to_fixed64;
use crate::item::DEFAULT_MAX_STACK_SIZE;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("content error: {0}")]
    Content(#[from] ContentError),
}

// ---------------------------------------------------------------------------
// JSON data structures
// ---------------------------------------------------------------------------

#[derive(Debug, serde::Deserialize)]
pub struct ContentData {
    #[serde(default)]
    pub items: Vec<ItemData>,
    #[serde(default)]
    pub recipes: Vec<RecipeData>,
    #[serde(default)]
    pub machines: Vec<MachineData>,
    #[serde(default)]
    pub belt_tiers: Vec<BeltTierData>,
    #[serde(default)]
    pub splitter: Option<SplitterData>,
}

#[derive(Debug, serde::Deserialize)]
pub struct ItemData {
    pub name: String,
    #[serde(default = "default_stack")]
    pub max_stack_size: u32,
}

fn default_stack() -> u32 {
    DEFAULT_MAX_STACK_SIZE
}

/// An `(item, quantity)` entry; `item` references an item by name.
#[derive(Debug, serde::Deserialize)]
pub struct AmountData {
    pub item: String,
    pub quantity: u32,
}

#[derive(Debug, serde::Deserialize)]
pub struct RecipeData {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<AmountData>,
    #[serde(default)]
    pub outputs: Vec<AmountData>,
    pub seconds: f64,
}

#[derive(Debug, serde::Deserialize)]
pub struct MachineData {
    pub name: String,
    #[serde(default)]
    pub footprint: Option<FootprintData>,
    #[serde(default)]
    pub build_cost: Vec<AmountData>,
    /// Recipe names; the first is the default.
    pub recipes: Vec<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct FootprintData {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, serde::Deserialize)]
pub struct BeltTierData {
    pub name: String,
    pub items_per_minute: u32,
    #[serde(default)]
    pub build_cost: Vec<AmountData>,
}

#[derive(Debug, serde::Deserialize)]
pub struct SplitterData {
    pub name: String,
    pub items_per_minute: u32,
    #[serde(default)]
    pub build_cost: Vec<AmountData>,
}

// ---------------------------------------------------------------------------
// Loading functions
// ---------------------------------------------------------------------------

/// Load content from a JSON string.
pub fn load_content_json(json: &str) -> Result<Content, DataLoadError> {
    let data: ContentData = serde_json::from_str(json)?;
    build_content(data)
}

/// Load content from JSON bytes.
pub fn load_content_json_bytes(bytes: &[u8]) -> Result<Content, DataLoadError> {
    let data: ContentData = serde_json::from_slice(bytes)?;
    build_content(data)
}

fn pairs(entries: &[AmountData]) -> Vec<(&str, u32)> {
    entries.iter().map(|e| (e.item.as_str(), e.quantity)).collect()
}

fn build_content(data: ContentData) -> Result<Content, DataLoadError> {
    let mut builder = ContentBuilder::new();

    for item in &data.items {
        builder.item(&item.name, item.max_stack_size)?;
    }

    for recipe in &data.recipes {
        let seconds = f64_to_fixed64(recipe.seconds).ok_or_else(|| {
            ContentError::from(SimError::InvalidRecipe {
                name: recipe.name.clone(),
                reason: format!("process time {} s is out of range", recipe.seconds),
            })
        })?;
        builder.recipe(&recipe.name, &pairs(&recipe.inputs), &pairs(&recipe.outputs), seconds)?;
    }

    for machine in &data.machines {
        let footprint = machine
            .footprint
            .as_ref()
            .map_or(MACHINE_FOOTPRINT, |f| Footprint::new(f.width, f.height));
        let recipes: Vec<&str> = machine.recipes.iter().map(String::as_str).collect();
        builder.machine_class(&machine.name, footprint, &pairs(&machine.build_cost), &recipes)?;
    }

    for tier in &data.belt_tiers {
        builder.belt_tier(&tier.name, tier.items_per_minute, &pairs(&tier.build_cost))?;
    }

    if let Some(splitter) = &data.splitter {
        builder.splitter(&splitter.name, splitter.items_per_minute, &pairs(&splitter.build_cost))?;
    }

    Ok(builder.build())
}

// ===========================================================================
// Tests
// ===========================================================================
