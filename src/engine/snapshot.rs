//! Immutable, fully built query state.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::catalog::RegionCatalog;
use crate::index::PoiIndex;
use crate::loader::{KindReport, LoadReport, ValidatedData};
use crate::models::{Poi, Quarter, Region};

/// One loaded dataset with all its indexes.
///
/// Never mutated after construction; the engine swaps whole snapshots.
pub struct Snapshot {
    pub pois: PoiIndex,
    pub catalog: RegionCatalog,
    pub loaded_at: DateTime<Utc>,
    pub report: LoadReport,
}

impl Snapshot {
    /// Build from models that are already known to be valid
    #[cfg(test)]
    pub(crate) fn build(pois: Vec<Poi>, regions: Vec<Region>, quarters: Vec<Quarter>) -> Self {
        let accepted = |n: usize| KindReport {
            total: n,
            accepted: n,
            rejected: 0,
        };
        let report = LoadReport {
            pois: accepted(pois.len()),
            regions: accepted(regions.len()),
            quarters: accepted(quarters.len()),
            dropped_polygons: 0,
        };

        Self::from_validated(ValidatedData {
            pois,
            regions,
            quarters,
            report,
        })
    }

    pub(crate) fn from_validated(data: ValidatedData) -> Self {
        let pois = PoiIndex::build(data.pois);
        let catalog = RegionCatalog::build(data.regions, data.quarters);
        let loaded_at = Utc::now();

        info!(
            "Snapshot ready at {}: {} POIs, {} regions, {} quarters",
            loaded_at.to_rfc3339(),
            pois.len(),
            catalog.region_count(),
            catalog.quarter_count()
        );

        Self {
            pois,
            catalog,
            loaded_at,
            report: data.report,
        }
    }
}
