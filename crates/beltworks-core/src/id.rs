use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a belt segment in the world.
    pub struct BeltId;

    /// Identifies a splitter in the world.
    pub struct SplitterId;

    /// Identifies a production machine in the world.
    pub struct MachineId;
}

/// Identifies an item type in the catalog. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemTypeId(pub u32);

impl std::fmt::Display for ItemTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_type_id_equality() {
        assert_eq!(ItemTypeId(0), ItemTypeId(0));
        assert_ne!(ItemTypeId(0), ItemTypeId(1));
    }

    #[test]
    fn ids_are_hashable() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ItemTypeId(0), "iron_ore");
        map.insert(ItemTypeId(1), "iron_ingot");
        assert_eq!(map[&ItemTypeId(0)], "iron_ore");
    }

    #[test]
    fn entity_keys_are_distinct_per_arena() {
        let mut belts: slotmap::SlotMap<BeltId, ()> = slotmap::SlotMap::with_key();
        let a = belts.insert(());
        let b = belts.insert(());
        assert_ne!(a, b);
        belts.remove(a);
        assert!(!belts.contains_key(a));
    }
}
