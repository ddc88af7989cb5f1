//! File-backed [`DataSource`]: POIs from CSV, boundaries from GeoJSON.

use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use flate2::read::GzDecoder;
use geo_types::{MultiPolygon, Polygon};
use geojson::{Feature, GeoJson, JsonObject, JsonValue};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{DataSource, PoiRecord, QuarterRecord, RegionRecord};
use crate::config::DataConfig;
use crate::models::{Address, RegionNames};

/// Reads the files named in `[data]`. A missing path gives an empty set.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    pub pois: Option<PathBuf>,
    pub regions: Option<PathBuf>,
    pub quarters: Option<PathBuf>,
}

impl FileSource {
    pub fn from_config(config: &DataConfig) -> Self {
        Self {
            pois: config.pois.clone(),
            regions: config.regions.clone(),
            quarters: config.quarters.clone(),
        }
    }
}

impl DataSource for FileSource {
    fn load_pois(&self) -> Result<Vec<PoiRecord>> {
        match &self.pois {
            Some(path) => read_poi_csv(path),
            None => Ok(Vec::new()),
        }
    }

    fn load_regions(&self) -> Result<Vec<RegionRecord>> {
        let Some(path) = &self.regions else {
            return Ok(Vec::new());
        };
        let features = read_features(path)?;
        Ok(features
            .iter()
            .enumerate()
            .map(|(i, feature)| region_record(i + 1, feature))
            .collect())
    }

    fn load_quarters(&self) -> Result<Vec<QuarterRecord>> {
        let Some(path) = &self.quarters else {
            return Ok(Vec::new());
        };
        let features = read_features(path)?;
        Ok(features
            .iter()
            .enumerate()
            .map(|(i, feature)| quarter_record(i + 1, feature))
            .collect())
    }
}

/// Open a file, transparently gunzipping `.gz`
fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(reader)
}

/// Load POI rows from a header-driven CSV
pub fn read_poi_csv(path: &Path) -> Result<Vec<PoiRecord>> {
    info!("Loading POIs from {}", path.display());

    let reader = open_input(path)?;

    // id,osm_id,name,amenity,address,longitude,latitude,rating
    // 1,node/123,Bean Hub,cafe,"12 Some Street, Dublin",-6.2603,53.3498,4.5

    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .context("Failed to read CSV header")?
        .clone();

    // Find column indices
    let lon_idx = column(&headers, &["longitude", "lon", "lng"]).context("Column 'longitude' not found")?;
    let lat_idx = column(&headers, &["latitude", "lat"]).context("Column 'latitude' not found")?;
    let id_idx = column(&headers, &["id", "ogc_fid"]);
    let osm_idx = column(&headers, &["osm_id"]);
    let name_idx = column(&headers, &["name"]);
    let amenity_idx = column(&headers, &["amenity"]);
    let address_idx = column(&headers, &["address"]);
    let street_idx = column(&headers, &["addr_street"]);
    let city_idx = column(&headers, &["addr_city"]);
    let postcode_idx = column(&headers, &["addr_postcode"]);
    let rating_idx = column(&headers, &["rating"]);

    let mut rows = Vec::new();
    for (i, result) in csv_reader.records().enumerate() {
        let row = i + 1;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                rows.push(PoiRecord::unreadable(row, format!("unreadable row: {}", e)));
                continue;
            }
        };

        rows.push(PoiRecord {
            row,
            id: field(&record, id_idx),
            osm_id: field(&record, osm_idx),
            name: field(&record, name_idx),
            amenity: field(&record, amenity_idx),
            address: Address {
                street: field(&record, street_idx),
                city: field(&record, city_idx),
                postcode: field(&record, postcode_idx),
                full: field(&record, address_idx),
            },
            lon: field(&record, Some(lon_idx)),
            lat: field(&record, Some(lat_idx)),
            rating: field(&record, rating_idx),
            defect: None,
        });
    }

    info!("Read {} POI rows", rows.len());
    Ok(rows)
}

fn column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
}

fn field(record: &StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| record.get(i))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Read the features of a GeoJSON FeatureCollection
fn read_features(path: &Path) -> Result<Vec<Feature>> {
    info!("Loading features from {}", path.display());

    let mut content = String::new();
    open_input(path)?
        .read_to_string(&mut content)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let geo_json: GeoJson = content
        .parse()
        .with_context(|| format!("Failed to parse GeoJSON in {}", path.display()))?;

    match geo_json {
        GeoJson::FeatureCollection(collection) => {
            info!("Read {} features", collection.features.len());
            Ok(collection.features)
        }
        _ => bail!("{} is not a FeatureCollection", path.display()),
    }
}

fn region_record(row: usize, feature: &Feature) -> RegionRecord {
    let props = feature.properties.as_ref();
    let (boundary, defect) = match feature_boundary(feature) {
        Ok(boundary) => (boundary, None),
        Err(e) => (None, Some(e)),
    };

    RegionRecord {
        row,
        id: prop_u64(props, "ogc_fid"),
        code: prop_string(props, "co_id"),
        names: RegionNames {
            english: prop_string(props, "english"),
            countyname: prop_string(props, "countyname"),
            county: prop_string(props, "county"),
            gaeilge: prop_string(props, "gaeilge"),
            contae: prop_string(props, "contae"),
            province: prop_string(props, "province"),
            aliases: prop_list(props, "aliases"),
        },
        boundary,
        defect,
    }
}

fn quarter_record(row: usize, feature: &Feature) -> QuarterRecord {
    let props = feature.properties.as_ref();
    let (boundary, mut defect) = match feature_boundary(feature) {
        Ok(boundary) => (boundary, None),
        Err(e) => (None, Some(e)),
    };

    let rank = match prop_u64(props, "rank") {
        Some(rank) => match u32::try_from(rank) {
            Ok(rank) => Some(rank),
            Err(_) => {
                if defect.is_none() {
                    defect = Some(format!("rank {} out of range", rank));
                }
                None
            }
        },
        None => None,
    };

    QuarterRecord {
        row,
        rank,
        name: prop_string(props, "name"),
        boundary,
        defect,
    }
}

/// Polygonal geometry of a feature; `Ok(None)` when it has none
fn feature_boundary(feature: &Feature) -> std::result::Result<Option<MultiPolygon<f64>>, String> {
    let Some(geometry) = &feature.geometry else {
        return Ok(None);
    };

    match &geometry.value {
        geojson::Value::MultiPolygon(_) => {
            let multi_poly: MultiPolygon<f64> = (&geometry.value)
                .try_into()
                .map_err(|e: geojson::Error| format!("bad geometry: {}", e))?;
            Ok(Some(multi_poly))
        }
        geojson::Value::Polygon(_) => {
            let poly: Polygon<f64> = (&geometry.value)
                .try_into()
                .map_err(|e: geojson::Error| format!("bad geometry: {}", e))?;
            Ok(Some(MultiPolygon::new(vec![poly])))
        }
        _ => Ok(None),
    }
}

fn prop<'a>(props: Option<&'a JsonObject>, key: &str) -> Option<&'a JsonValue> {
    props.and_then(|p| p.get(key)).filter(|v| !v.is_null())
}

fn prop_string(props: Option<&JsonObject>, key: &str) -> Option<String> {
    match prop(props, key)? {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn prop_u64(props: Option<&JsonObject>, key: &str) -> Option<u64> {
    match prop(props, key)? {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A list property, given either as an array or as a `;`-separated string
fn prop_list(props: Option<&JsonObject>, key: &str) -> Vec<String> {
    let values: Vec<String> = match prop(props, key) {
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(JsonValue::String(s)) => s.split(';').map(str::to_string).collect(),
        _ => Vec::new(),
    };

    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}
