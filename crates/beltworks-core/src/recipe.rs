use crate::error::SimError;
use crate::fixed::{Fixed64, per_minute};
use crate::id::ItemTypeId;
use crate::item::{ItemAmount, merge_amounts};

/// A static crafting definition: consume `inputs`, wait `process_time`
/// seconds, emit `outputs`.
///
/// Inputs and outputs are ordered lists. Output order decides which output
/// inventory a belt drains first, so it is part of the recipe's identity.
/// Duplicate entries are folded together at construction and zero
/// quantities are dropped.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Recipe {
    name: String,
    inputs: Vec<ItemAmount>,
    outputs: Vec<ItemAmount>,
    process_time: Fixed64,
}

impl Recipe {
    pub fn new(
        name: impl Into<String>,
        inputs: impl IntoIterator<Item = ItemAmount>,
        outputs: impl IntoIterator<Item = ItemAmount>,
        process_time: Fixed64,
    ) -> Result<Self, SimError> {
        let name = name.into();
        if process_time <= Fixed64::ZERO {
            return Err(SimError::InvalidRecipe {
                name,
                reason: format!("process_time must be greater than 0, got {process_time}"),
            });
        }
        Ok(Self {
            name,
            inputs: merge_amounts(inputs),
            outputs: merge_amounts(outputs),
            process_time,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[ItemAmount] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ItemAmount] {
        &self.outputs
    }

    /// Seconds per crafting cycle. Always positive.
    pub fn process_time(&self) -> Fixed64 {
        self.process_time
    }

    /// Whether this recipe consumes `item`.
    pub fn accepts(&self, item: ItemTypeId) -> bool {
        self.inputs.iter().any(|input| input.item == item)
    }

    /// Input consumption in items per minute, for display.
    pub fn inputs_per_minute(&self) -> Vec<(ItemTypeId, Fixed64)> {
        self.rates(&self.inputs)
    }

    /// Output production in items per minute, for display.
    pub fn outputs_per_minute(&self) -> Vec<(ItemTypeId, Fixed64)> {
        self.rates(&self.outputs)
    }

    fn rates(&self, amounts: &[ItemAmount]) -> Vec<(ItemTypeId, Fixed64)> {
        amounts
            .iter()
            .map(|a| {
                let rate = per_minute(a.quantity, self.process_time).unwrap_or(Fixed64::MAX);
                (a.item, rate)
            })
            .collect()
    }
}
