//! Region catalog: named regions, ranked quarters and their lookups.

mod boundary_index;
mod names;

pub use boundary_index::BoundaryIndex;
pub use names::{normalize_name, NameResolver};

use std::sync::Arc;

use geo::Point;
use hashbrown::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::geometry;
use crate::models::{NameField, Quarter, Region};

/// Immutable catalog of regions and quarters
pub struct RegionCatalog {
    /// Regions in load order
    regions: Vec<Arc<Region>>,
    /// Quarters in ascending rank order
    quarters: Vec<Arc<Quarter>>,
    by_rank: HashMap<u32, usize>,
    resolver: NameResolver,
    region_index: BoundaryIndex,
    quarter_index: BoundaryIndex,
}

impl RegionCatalog {
    /// Build the catalog from validated regions and quarters.
    ///
    /// If two quarters share a rank the first one is kept.
    pub fn build(regions: Vec<Region>, quarters: Vec<Quarter>) -> Self {
        info!(
            "Building region catalog for {} regions and {} quarters...",
            regions.len(),
            quarters.len()
        );

        let regions: Vec<Arc<Region>> = regions.into_iter().map(Arc::new).collect();

        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(quarters.len());
        for quarter in quarters {
            if !seen.insert(quarter.rank) {
                warn!("Duplicate quarter rank {}, keeping the first", quarter.rank);
                continue;
            }
            unique.push(Arc::new(quarter));
        }
        unique.sort_by_key(|q| q.rank);

        let by_rank = unique.iter().enumerate().map(|(slot, q)| (q.rank, slot)).collect();
        let resolver = NameResolver::build(&regions);
        let region_index = BoundaryIndex::build(regions.iter().map(|r| &r.boundary));
        let quarter_index = BoundaryIndex::build(unique.iter().map(|q| &q.boundary));

        for (field, size) in resolver.table_sizes() {
            debug!("  {}: {} names", field.field_name(), size);
        }
        info!(
            "Region catalog built: {} regions, {} quarters",
            region_index.len(),
            quarter_index.len()
        );

        Self {
            regions,
            quarters: unique,
            by_rank,
            resolver,
            region_index,
            quarter_index,
        }
    }

    /// Empty catalog, for snapshots without region data
    pub fn empty() -> Self {
        Self::build(Vec::new(), Vec::new())
    }

    /// Case-insensitive lookup over the ordered name fields; `None` on a miss
    pub fn resolve_by_name(&self, candidate: &str) -> Option<&Arc<Region>> {
        self.resolve_with_field(candidate).map(|(_, region)| region)
    }

    /// Like [`Self::resolve_by_name`], also reporting which field matched
    pub fn resolve_with_field(&self, candidate: &str) -> Option<(NameField, &Arc<Region>)> {
        let (field, slot) = self.resolver.resolve(candidate)?;
        debug!("Resolved '{}' via {} to slot {}", candidate, field.field_name(), slot);
        self.regions.get(slot).map(|r| (field, r))
    }

    pub fn lookup_by_rank(&self, rank: u32) -> Option<&Arc<Quarter>> {
        self.by_rank.get(&rank).and_then(|&slot| self.quarters.get(slot))
    }

    /// Iterate over all regions in load order.
    ///
    /// Every call starts a fresh traversal.
    pub fn all_regions(&self) -> impl Iterator<Item = &Arc<Region>> {
        self.regions.iter()
    }

    /// Iterate over all quarters in rank order
    pub fn all_quarters(&self) -> impl Iterator<Item = &Arc<Quarter>> {
        self.quarters.iter()
    }

    /// All regions containing a point (boundary inclusive), in load order
    pub fn regions_at(&self, point: &Point<f64>) -> Vec<&Arc<Region>> {
        self.region_index
            .candidates(point)
            .into_iter()
            .filter_map(|slot| self.regions.get(slot))
            .filter(|r| geometry::contains(&r.boundary, point))
            .collect()
    }

    /// Lowest-ranked quarter containing a point
    pub fn quarter_at(&self, point: &Point<f64>) -> Option<&Arc<Quarter>> {
        self.quarter_index
            .candidates(point)
            .into_iter()
            .filter_map(|slot| self.quarters.get(slot))
            .find(|q| geometry::contains(&q.boundary, point))
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn quarter_count(&self) -> usize {
        self.quarters.len()
    }
}
