//! Result assembly: annotate and project query results for the caller.
//!
//! Nothing here knows about wire formats. Rows are `Serialize` so callers can
//! render them however they like.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

use crate::geometry;
use crate::index::PoiMatch;
use crate::loader::LoadReport;
use crate::models::{Address, Poi, PoiId, Quarter, Region, RegionId};

/// A POI returned by a query.
///
/// `distance_m` is set only for operations that measure from a centre
/// (radius and k-nearest); containment results leave it out.
#[derive(Debug, Clone)]
pub struct PoiHit {
    pub poi: Arc<Poi>,
    pub distance_m: Option<f64>,
}

impl PoiHit {
    pub fn with_distance(m: PoiMatch) -> Self {
        Self {
            poi: m.poi,
            distance_m: Some(m.distance_m),
        }
    }

    pub fn without_distance(poi: Arc<Poi>) -> Self {
        Self {
            poi,
            distance_m: None,
        }
    }

    /// Select the fields a caller asked for
    pub fn project(&self, projection: Projection) -> ProjectedPoi {
        let poi = &self.poi;
        let full = projection == Projection::Full;

        ProjectedPoi {
            id: poi.id,
            name: poi.name.clone(),
            lon: poi.lon(),
            lat: poi.lat(),
            rating: poi.rating,
            distance_m: self.distance_m,
            amenity: if full { poi.amenity.clone() } else { None },
            osm_id: if full { poi.osm_id.clone() } else { None },
            address: (full && !poi.address.is_empty()).then(|| poi.address.clone()),
        }
    }
}

/// Annotate index matches with their distances, keeping order
pub fn annotate(matches: Vec<PoiMatch>) -> Vec<PoiHit> {
    matches.into_iter().map(PoiHit::with_distance).collect()
}

/// Wrap POIs from a query with no distance concept
pub fn unannotated(pois: Vec<Arc<Poi>>) -> Vec<PoiHit> {
    pois.into_iter().map(PoiHit::without_distance).collect()
}

/// Which POI fields end up in [`ProjectedPoi`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    /// Every field
    #[default]
    Full,
    /// id, name, position, rating and distance
    Summary,
}

/// Flat, serialisable view of a [`PoiHit`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedPoi {
    pub id: PoiId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub lon: f64,
    pub lat: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    /// Metres from the query centre
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amenity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub osm_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

/// A region boundary prepared for export, with resolved display names
#[derive(Debug, Clone)]
pub struct RegionExport {
    pub id: RegionId,
    pub code: Option<String>,
    pub english_name: String,
    pub localized_name: String,
    pub province: String,
    pub boundary: MultiPolygon<f64>,
}

impl RegionExport {
    pub fn from_region(region: &Region, tolerance: f64) -> Self {
        Self {
            id: region.id,
            code: region.code.clone(),
            english_name: region.names.display_english(),
            localized_name: region.names.display_localized(),
            province: region.names.display_province(),
            boundary: geometry::simplify(&region.boundary, tolerance),
        }
    }
}

/// A quarter boundary prepared for export
#[derive(Debug, Clone)]
pub struct QuarterExport {
    pub rank: u32,
    pub name: Option<String>,
    pub boundary: MultiPolygon<f64>,
}

impl QuarterExport {
    pub fn from_quarter(quarter: &Quarter, tolerance: f64) -> Self {
        Self {
            rank: quarter.rank,
            name: quarter.name.clone(),
            boundary: geometry::simplify(&quarter.boundary, tolerance),
        }
    }
}

/// Region entry in a [`Location`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatedRegion {
    pub id: RegionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub english_name: String,
    pub localized_name: String,
    pub province: String,
}

impl From<&Region> for LocatedRegion {
    fn from(region: &Region) -> Self {
        Self {
            id: region.id,
            code: region.code.clone(),
            english_name: region.names.display_english(),
            localized_name: region.names.display_localized(),
            province: region.names.display_province(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatedQuarter {
    pub rank: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Everything covering a point: all regions, and the lowest-ranked quarter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub lon: f64,
    pub lat: f64,
    pub regions: Vec<LocatedRegion>,
    pub quarter: Option<LocatedQuarter>,
}

/// Snapshot summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub pois: usize,
    pub regions: usize,
    pub quarters: usize,
    pub loaded_at: DateTime<Utc>,
    pub load: LoadReport,
}
