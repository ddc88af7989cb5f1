//! GeoJSON rendering of query results.

use anyhow::Result;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Value};
use serde::Serialize;

use cafemap::results::{QuarterExport, RegionExport};
use cafemap::{PoiHit, Projection};

pub fn poi_collection(hits: &[PoiHit], projection: Projection) -> Result<FeatureCollection> {
    let features = hits
        .iter()
        .map(|hit| {
            let projected = hit.project(projection);
            let geometry = Geometry::new(Value::Point(vec![projected.lon, projected.lat]));
            Ok(feature(geometry, to_properties(&projected)?))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(collection(features))
}

pub fn region_collection(regions: &[RegionExport]) -> FeatureCollection {
    let features = regions
        .iter()
        .map(|region| {
            let mut props = JsonObject::new();
            props.insert("id".to_string(), region.id.into());
            if let Some(code) = &region.code {
                props.insert("code".to_string(), code.clone().into());
            }
            props.insert("english_name".to_string(), region.english_name.clone().into());
            props.insert("gaeilge_name".to_string(), region.localized_name.clone().into());
            props.insert("province".to_string(), region.province.clone().into());
            feature(Geometry::new(Value::from(&region.boundary)), props)
        })
        .collect();

    collection(features)
}

pub fn quarter_collection(quarters: &[QuarterExport]) -> FeatureCollection {
    let features = quarters
        .iter()
        .map(|quarter| {
            let mut props = JsonObject::new();
            props.insert("rank".to_string(), quarter.rank.into());
            if let Some(name) = &quarter.name {
                props.insert("name".to_string(), name.clone().into());
            }
            feature(Geometry::new(Value::from(&quarter.boundary)), props)
        })
        .collect();

    collection(features)
}

fn to_properties<T: Serialize>(row: &T) -> Result<JsonObject> {
    match serde_json::to_value(row)? {
        JsonValue::Object(map) => Ok(map),
        other => anyhow::bail!("expected an object, got {}", other),
    }
}

fn feature(geometry: Geometry, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
