//! Record validation and the reject threshold.

use anyhow::Context;
use hashbrown::HashSet;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use super::{DataSource, PoiRecord, QuarterRecord, RegionRecord};
use crate::error::LoadError;
use crate::geometry;
use crate::models::{Poi, PoiId, Quarter, Region};

/// Accept/reject counts for one entity kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindReport {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
}

impl KindReport {
    fn new(total: usize, accepted: usize) -> Self {
        Self {
            total,
            accepted,
            rejected: total - accepted,
        }
    }

    /// Rejected fraction, 0 for an empty input
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.rejected as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub pois: KindReport,
    pub regions: KindReport,
    pub quarters: KindReport,
    /// Degenerate polygons removed from otherwise usable boundaries
    pub dropped_polygons: usize,
}

/// Models that passed validation, ready for indexing
#[derive(Debug, Clone)]
pub struct ValidatedData {
    pub pois: Vec<Poi>,
    pub regions: Vec<Region>,
    pub quarters: Vec<Quarter>,
    pub report: LoadReport,
}

/// Read everything from `source` and validate it.
///
/// Bad records are logged and skipped. Fails if a whole input can't be read or
/// if any kind rejects more than `max_reject_ratio` of its records.
pub fn validate(source: &dyn DataSource, max_reject_ratio: f64) -> Result<ValidatedData, LoadError> {
    let poi_records = source.load_pois().context("Failed to load POIs")?;
    let region_records = source.load_regions().context("Failed to load regions")?;
    let quarter_records = source.load_quarters().context("Failed to load quarters")?;

    let (pois, poi_report) = validate_pois(poi_records);
    let (regions, region_report, dropped_regions) = validate_regions(region_records);
    let (quarters, quarter_report, dropped_quarters) = validate_quarters(quarter_records);

    let report = LoadReport {
        pois: poi_report,
        regions: region_report,
        quarters: quarter_report,
        dropped_polygons: dropped_regions + dropped_quarters,
    };

    for (kind, counts) in [
        ("POI", &report.pois),
        ("region", &report.regions),
        ("quarter", &report.quarters),
    ] {
        info!(
            "Loaded {} of {} {} records ({} rejected)",
            counts.accepted, counts.total, kind, counts.rejected
        );
        let ratio = counts.ratio();
        if ratio > max_reject_ratio {
            return Err(LoadError::TooManyRejected {
                kind,
                rejected: counts.rejected,
                total: counts.total,
                ratio,
                threshold: max_reject_ratio,
            });
        }
    }

    Ok(ValidatedData {
        pois,
        regions,
        quarters,
        report,
    })
}

fn validate_pois(records: Vec<PoiRecord>) -> (Vec<Poi>, KindReport) {
    let total = records.len();
    let checked: Vec<(usize, Result<Identified<Poi>, String>)> = records
        .into_par_iter()
        .map(|record| (record.row, poi_from_record(record)))
        .collect();

    let mut accepted = Vec::with_capacity(total);
    for (row, result) in checked {
        match result {
            Ok(poi) => accepted.push(poi),
            Err(reason) => warn!("Rejected POI row {}: {}", row, reason),
        }
    }
    let pois = settle_ids("POI row", accepted, |poi: &mut Poi, id| poi.id = id);

    let report = KindReport::new(total, pois.len());
    (pois, report)
}

/// An accepted record whose id may still be a row-number fallback
struct Identified<T> {
    row: usize,
    explicit: Option<u64>,
    value: T,
}

/// Give every accepted record its final id, dropping duplicates.
///
/// Explicit ids are claimed first, in row order, and a repeated explicit id
/// loses to the earlier row. Records without one then get their row number,
/// or an id past every id and row in the input when that number is already
/// claimed.
fn settle_ids<T>(kind: &str, items: Vec<Identified<T>>, set_id: impl Fn(&mut T, u64)) -> Vec<T> {
    let mut taken: HashSet<u64> = HashSet::with_capacity(items.len());
    let mut keep = vec![true; items.len()];
    for (slot, item) in items.iter().enumerate() {
        if let Some(id) = item.explicit {
            if !taken.insert(id) {
                warn!("Rejected {} {}: duplicate id {}", kind, item.row, id);
                keep[slot] = false;
            }
        }
    }

    let mut last_used = items
        .iter()
        .map(|item| item.explicit.unwrap_or(0).max(item.row as u64))
        .max()
        .unwrap_or(0);

    let mut settled = Vec::with_capacity(items.len());
    for (item, keep) in items.into_iter().zip(keep) {
        if !keep {
            continue;
        }
        let Identified { row, explicit, mut value } = item;
        let id = match explicit {
            Some(id) => id,
            None if taken.insert(row as u64) => row as u64,
            None => {
                let Some(id) = last_used.checked_add(1) else {
                    warn!("Rejected {} {}: no free id left", kind, row);
                    continue;
                };
                last_used = id;
                taken.insert(id);
                warn!("{} {} has no id and its row number is taken, using {}", kind, row, id);
                id
            }
        };
        set_id(&mut value, id);
        settled.push(value);
    }
    settled
}

fn poi_from_record(record: PoiRecord) -> Result<Identified<Poi>, String> {
    if let Some(defect) = record.defect {
        return Err(defect);
    }

    let lon = parse_number("longitude", record.lon.as_deref())?;
    let lat = parse_number("latitude", record.lat.as_deref())?;
    let location = geometry::validate_coord(lon, lat).map_err(|e| e.to_string())?;

    let explicit = match non_blank(record.id) {
        None => None,
        Some(raw) => Some(
            raw.parse::<PoiId>()
                .map_err(|_| format!("malformed id '{}'", raw))?,
        ),
    };

    let rating = match non_blank(record.rating) {
        None => None,
        Some(raw) => match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Some(v),
            _ => return Err(format!("malformed rating '{}'", raw)),
        },
    };

    let mut address = record.address;
    address.street = non_blank(address.street);
    address.city = non_blank(address.city);
    address.postcode = non_blank(address.postcode);
    address.full = non_blank(address.full);

    let poi = Poi {
        id: explicit.unwrap_or(record.row as PoiId),
        osm_id: non_blank(record.osm_id),
        name: non_blank(record.name),
        amenity: non_blank(record.amenity),
        address,
        location,
        rating,
    };
    Ok(Identified {
        row: record.row,
        explicit,
        value: poi,
    })
}

fn validate_regions(records: Vec<RegionRecord>) -> (Vec<Region>, KindReport, usize) {
    let total = records.len();
    let checked: Vec<(usize, Result<Identified<Region>, String>, Vec<String>)> = records
        .into_par_iter()
        .map(|record| {
            let row = record.row;
            let mut dropped = Vec::new();
            let result = region_from_record(record, &mut dropped);
            (row, result, dropped)
        })
        .collect();

    let mut dropped_count = 0;
    let mut accepted = Vec::with_capacity(total);
    for (row, result, dropped) in checked {
        for problem in &dropped {
            warn!("Region feature {}: dropped {}", row, problem);
        }
        dropped_count += dropped.len();
        match result {
            Ok(region) => accepted.push(region),
            Err(reason) => warn!("Rejected region feature {}: {}", row, reason),
        }
    }
    let regions = settle_ids("region feature", accepted, |region: &mut Region, id| {
        region.id = id
    });

    let report = KindReport::new(total, regions.len());
    (regions, report, dropped_count)
}

fn region_from_record(
    record: RegionRecord,
    dropped: &mut Vec<String>,
) -> Result<Identified<Region>, String> {
    if let Some(defect) = record.defect {
        return Err(defect);
    }
    let raw = record.boundary.ok_or("no polygonal geometry")?;
    let sanitized = geometry::sanitize_multi_polygon(raw);
    *dropped = sanitized.dropped;
    if sanitized.boundary.0.is_empty() {
        return Err("no valid polygons left".to_string());
    }

    Ok(Identified {
        row: record.row,
        explicit: record.id,
        value: Region {
            id: record.id.unwrap_or(record.row as u64),
            code: non_blank(record.code),
            names: record.names,
            boundary: sanitized.boundary,
        },
    })
}

fn validate_quarters(records: Vec<QuarterRecord>) -> (Vec<Quarter>, KindReport, usize) {
    let total = records.len();
    let checked: Vec<(usize, Result<Quarter, String>, Vec<String>)> = records
        .into_par_iter()
        .map(|record| {
            let row = record.row;
            let mut dropped = Vec::new();
            let result = quarter_from_record(record, &mut dropped);
            (row, result, dropped)
        })
        .collect();

    let mut dropped_count = 0;
    let mut seen = HashSet::with_capacity(total);
    let mut quarters = Vec::with_capacity(total);
    for (row, result, dropped) in checked {
        for problem in &dropped {
            warn!("Quarter feature {}: dropped {}", row, problem);
        }
        dropped_count += dropped.len();
        match result {
            Ok(quarter) if !seen.insert(quarter.rank) => {
                warn!("Rejected quarter feature {}: duplicate rank {}", row, quarter.rank);
            }
            Ok(quarter) => quarters.push(quarter),
            Err(reason) => warn!("Rejected quarter feature {}: {}", row, reason),
        }
    }

    let report = KindReport::new(total, quarters.len());
    (quarters, report, dropped_count)
}

fn quarter_from_record(record: QuarterRecord, dropped: &mut Vec<String>) -> Result<Quarter, String> {
    if let Some(defect) = record.defect {
        return Err(defect);
    }
    let rank = record.rank.ok_or("missing rank")?;
    if rank == 0 {
        return Err("rank must be at least 1".to_string());
    }
    let raw = record.boundary.ok_or("no polygonal geometry")?;
    let sanitized = geometry::sanitize_multi_polygon(raw);
    *dropped = sanitized.dropped;
    if sanitized.boundary.0.is_empty() {
        return Err("no valid polygons left".to_string());
    }

    Ok(Quarter {
        rank,
        name: non_blank(record.name),
        boundary: sanitized.boundary,
    })
}

fn parse_number(what: &str, raw: Option<&str>) -> Result<f64, String> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty());
    let Some(raw) = raw else {
        return Err(format!("missing {}", what));
    };
    raw.parse::<f64>()
        .map_err(|_| format!("malformed {} '{}'", what, raw))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
