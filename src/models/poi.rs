//! Point-of-interest records held by the spatial index.

use geo::Point;
use serde::{Deserialize, Serialize};

/// Stable POI identity. Also the tie-break key for equal distances.
pub type PoiId = u64;

/// Address components
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
    /// Single-line address, for sources that don't split it up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full: Option<String>,
}

impl Address {
    pub fn is_empty(&self) -> bool {
        self.street.is_none() && self.city.is_none() && self.postcode.is_none() && self.full.is_none()
    }
}

/// A single geocoded entity (e.g. a café).
///
/// Immutable once loaded; shared as `Arc<Poi>` between the index and results.
#[derive(Debug, Clone, PartialEq)]
pub struct Poi {
    pub id: PoiId,

    /// OSM object ID if the row came from an OSM extract
    pub osm_id: Option<String>,

    pub name: Option<String>,

    /// OSM amenity tag (e.g. "cafe")
    pub amenity: Option<String>,

    pub address: Address,

    /// WGS84 position, x = longitude, y = latitude
    pub location: Point<f64>,

    pub rating: Option<f64>,
}

impl Poi {
    /// Create a POI with only the required fields set
    pub fn new(id: PoiId, location: Point<f64>) -> Self {
        Self {
            id,
            osm_id: None,
            name: None,
            amenity: None,
            address: Address::default(),
            location,
            rating: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn lon(&self) -> f64 {
        self.location.x()
    }

    pub fn lat(&self) -> f64 {
        self.location.y()
    }
}
