//! GeoJSON shaping: converting tabular rows to point features and joining
//! grouped overlay counts onto zone features.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Property under which a zone feature carries its name.
pub const ZONE_NAME_PROPERTY: &str = "NAME";

/// A GeoJSON feature. Geometry is passed through untouched — zone layers
/// carry polygons, converted tabular data carries points, and nothing here
/// needs to look inside either.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub feature_type: String,
    pub geometry: Value,
    pub properties: Map<String, Value>,
}

impl Feature {
    /// A point feature carrying `properties`.
    pub fn point(longitude: f64, latitude: f64, properties: Map<String, Value>) -> Self {
        Self {
            feature_type: "Feature".to_string(),
            geometry: serde_json::json!({
                "type": "Point",
                "coordinates": [longitude, latitude],
            }),
            properties,
        }
    }

    /// The feature's zone name, if it has one.
    pub fn zone_name(&self) -> Option<&str> {
        self.properties.get(ZONE_NAME_PROPERTY).and_then(Value::as_str)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub collection_type: String,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            collection_type: "FeatureCollection".to_string(),
            features,
        }
    }
}

/// Convert tabular data with `latitude`/`longitude` columns into a point
/// feature collection, carrying each full row in the feature's properties.
///
/// Expects the API shape `{"items": [...]}`; a bare array is accepted too.
pub fn convert_to_geojson(dataset: &str, data: &Value) -> Result<FeatureCollection> {
    let items = data
        .get("items")
        .and_then(Value::as_array)
        .or_else(|| data.as_array())
        .ok_or_else(|| Error::MissingField {
            dataset: dataset.to_string(),
            field: "items".to_string(),
        })?;

    let mut features = Vec::with_capacity(items.len());
    for item in items {
        let longitude = coordinate(dataset, item, "longitude")?;
        let latitude = coordinate(dataset, item, "latitude")?;
        let properties = match item {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other.clone());
                map
            }
        };
        features.push(Feature::point(longitude, latitude, properties));
    }

    Ok(FeatureCollection::new(features))
}

/// Write each zone's overlay count into its feature properties.
///
/// `items` is grouped tabular data of the shape
/// `{"group": <zone name>, "count": <n>}`. Zones with no matching group are
/// left untouched and logged. Returns the number of features joined.
pub fn join_overlay(collection: &mut FeatureCollection, overlay: &str, items: &[Value]) -> usize {
    let mut joined = 0;
    for feature in &mut collection.features {
        let Some(zone) = feature.zone_name().map(str::to_string) else {
            warn!(overlay, "feature without a {ZONE_NAME_PROPERTY} property, skipping");
            continue;
        };
        let matched = items
            .iter()
            .find(|item| item.get("group").and_then(Value::as_str) == Some(zone.as_str()));
        match matched.and_then(|item| item.get("count")) {
            Some(count) => {
                feature
                    .properties
                    .insert(overlay.to_string(), count.clone());
                joined += 1;
            }
            None => warn!(overlay, zone = %zone, "no overlay row for zone"),
        }
    }
    joined
}

/// Coordinate fields arrive as numbers or numeric strings depending on the
/// source; accept both.
fn coordinate(dataset: &str, item: &Value, field: &str) -> Result<f64> {
    let value = item.get(field).ok_or_else(|| Error::MissingField {
        dataset: dataset.to_string(),
        field: field.to_string(),
    })?;
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| Error::MissingField {
            dataset: dataset.to_string(),
            field: field.to_string(),
        }),
        Value::String(s) => s.parse().map_err(|_| Error::MissingField {
            dataset: dataset.to_string(),
            field: field.to_string(),
        }),
        _ => Err(Error::MissingField {
            dataset: dataset.to_string(),
            field: field.to_string(),
        }),
    }
}
