use beltworks_spatial::{GridPosition, SpatialError};

/// Errors surfaced by the simulation core.
///
/// Blocked belts and busy machines are ordinary state, not errors. Only
/// placement/removal contracts, recipe construction and broken internal
/// invariants produce these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    /// A recipe failed validation at construction.
    #[error("invalid recipe '{name}': {reason}")]
    InvalidRecipe { name: String, reason: String },

    /// The cost payer cannot cover a build cost.
    #[error("insufficient resources")]
    InsufficientResources,

    /// A sink could not take the items it was asked to hold.
    #[error("target inventory cannot hold the items")]
    SlotCapacityExceeded,

    /// Placement would overlap something already on the grid.
    #[error("cell {position} is occupied")]
    OccupiedCell { position: GridPosition },

    /// Internal bookkeeping disagreed with itself. Not a user-facing
    /// condition.
    #[error("invariant violated: {detail}")]
    InvariantViolation { detail: String },

    /// A handle that no longer refers to a live entity.
    #[error("entity not found")]
    NotFound,

    /// A belt run whose cells are empty, repeated or not contiguous.
    #[error("invalid belt run: {reason}")]
    InvalidBeltRun { reason: String },

    /// A machine class with no recipes to default to.
    #[error("machine class '{name}' has no recipes")]
    EmptyMachineClass { name: String },

    /// A machine class whose footprint covers no cells.
    #[error("machine class '{name}' has an empty footprint")]
    EmptyFootprint { name: String },

    /// A recipe index outside the machine class's list.
    #[error("recipe index {index} is out of range")]
    RecipeIndexOutOfRange { index: usize },
}

impl From<SpatialError> for SimError {
    fn from(err: SpatialError) -> Self {
        match err {
            SpatialError::Occupied(position) => SimError::OccupiedCell { position },
            SpatialError::NotPlaced => SimError::NotFound,
            SpatialError::AlreadyPlaced => SimError::InvariantViolation {
                detail: "entity placed twice in the world index".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spatial_errors_map_onto_sim_errors() {
        let pos = GridPosition::new(2, 3);
        assert_eq!(
            SimError::from(SpatialError::Occupied(pos)),
            SimError::OccupiedCell { position: pos }
        );
        assert_eq!(SimError::from(SpatialError::NotPlaced), SimError::NotFound);
        assert!(matches!(
            SimError::from(SpatialError::AlreadyPlaced),
            SimError::InvariantViolation { .. }
        ));
    }

    #[test]
    fn messages_name_the_problem() {
        let err = SimError::OccupiedCell {
            position: GridPosition::new(1, -4),
        };
        assert_eq!(err.to_string(), "cell (1, -4) is occupied");
    }
}
