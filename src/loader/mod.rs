//! Bulk loading: raw records from a [`DataSource`], validated into models.
//!
//! A source only reads. Everything it hands over is unvalidated; bad rows are
//! rejected and counted in [`validate`], never by the source itself.

mod file;
mod validate;

pub use file::FileSource;
pub use validate::{validate, KindReport, LoadReport, ValidatedData};

use geo::MultiPolygon;

use crate::models::{Address, RegionNames};

/// Something the engine can load a snapshot from
pub trait DataSource: Send + Sync {
    fn load_pois(&self) -> anyhow::Result<Vec<PoiRecord>>;
    fn load_regions(&self) -> anyhow::Result<Vec<RegionRecord>>;
    fn load_quarters(&self) -> anyhow::Result<Vec<QuarterRecord>>;
}

/// One POI row as read, numeric columns still as text
#[derive(Debug, Clone, Default)]
pub struct PoiRecord {
    /// 1-based position in the input, used as the id when none is given
    pub row: usize,
    pub id: Option<String>,
    pub osm_id: Option<String>,
    pub name: Option<String>,
    pub amenity: Option<String>,
    pub address: Address,
    pub lon: Option<String>,
    pub lat: Option<String>,
    pub rating: Option<String>,
    /// Set when the row could not be read at all
    pub defect: Option<String>,
}

impl PoiRecord {
    pub fn new(row: usize, lon: f64, lat: f64) -> Self {
        Self {
            row,
            lon: Some(lon.to_string()),
            lat: Some(lat.to_string()),
            ..Default::default()
        }
    }

    pub fn unreadable(row: usize, defect: impl Into<String>) -> Self {
        Self {
            row,
            defect: Some(defect.into()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl ToString) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// One region feature as read
#[derive(Debug, Clone, Default)]
pub struct RegionRecord {
    /// 1-based feature position, used as the id when none is given
    pub row: usize,
    pub id: Option<u64>,
    pub code: Option<String>,
    pub names: RegionNames,
    /// `None` when the feature had no polygonal geometry
    pub boundary: Option<MultiPolygon<f64>>,
    pub defect: Option<String>,
}

/// One quarter feature as read
#[derive(Debug, Clone, Default)]
pub struct QuarterRecord {
    pub row: usize,
    pub rank: Option<u32>,
    pub name: Option<String>,
    pub boundary: Option<MultiPolygon<f64>>,
    pub defect: Option<String>,
}

/// In-memory source, handy for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub pois: Vec<PoiRecord>,
    pub regions: Vec<RegionRecord>,
    pub quarters: Vec<QuarterRecord>,
}

impl DataSource for MemorySource {
    fn load_pois(&self) -> anyhow::Result<Vec<PoiRecord>> {
        Ok(self.pois.clone())
    }

    fn load_regions(&self) -> anyhow::Result<Vec<RegionRecord>> {
        Ok(self.regions.clone())
    }

    fn load_quarters(&self) -> anyhow::Result<Vec<QuarterRecord>> {
        Ok(self.quarters.clone())
    }
}
