//! Case-insensitive region name resolution.

use hashbrown::HashMap;
use std::sync::Arc;

use crate::models::{NameField, Region};

/// Normalise a name for comparison: trimmed and Unicode lower-cased.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Ordered chain of per-field lookup tables.
///
/// Each table maps a normalised name to the first region (in load order)
/// carrying it. Tables are consulted in [`NameField::RESOLUTION_ORDER`], so a
/// primary-name match on any region beats a localised-name match on another.
pub struct NameResolver {
    tables: Vec<(NameField, HashMap<String, usize>)>,
}

impl NameResolver {
    pub fn build(regions: &[Arc<Region>]) -> Self {
        let tables = NameField::RESOLUTION_ORDER
            .iter()
            .map(|&field| {
                let mut table = HashMap::new();
                for (slot, region) in regions.iter().enumerate() {
                    for value in region.names.values(field) {
                        table.entry(normalize_name(value)).or_insert(slot);
                    }
                }
                (field, table)
            })
            .collect();

        Self { tables }
    }

    /// Slot of the first matching region and the field that matched
    pub fn resolve(&self, candidate: &str) -> Option<(NameField, usize)> {
        let key = normalize_name(candidate);
        if key.is_empty() {
            return None;
        }

        self.tables
            .iter()
            .find_map(|(field, table)| table.get(&key).map(|&slot| (*field, slot)))
    }

    /// Number of distinct names per field, for stats
    pub fn table_sizes(&self) -> Vec<(NameField, usize)> {
        self.tables.iter().map(|(f, t)| (*f, t.len())).collect()
    }
}
