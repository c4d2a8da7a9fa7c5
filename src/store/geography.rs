//! Neighborhood polygons and names.

use std::collections::BTreeMap;

use geojson::{Feature, GeoJson, Value};
use serde::{Deserialize, Serialize};

use crate::category::LocationId;
use crate::error::{Dataset, LoadError};

/// Neighborhood names used when the name table cannot be loaded.
pub const FALLBACK_NEIGHBORHOOD_NAMES: [&str; 19] = [
    "Palace Hills",
    "Northwest",
    "Old Town",
    "Safe Town",
    "Southwest",
    "Downtown",
    "Wilson Forest",
    "Scenic Vista",
    "Broadview",
    "Chapparal",
    "Terrapin",
    "Pepper Mill",
    "Cheddarford",
    "Easton",
    "Weston",
    "Southton",
    "Oak Willow",
    "East Parton",
    "West Parton",
];

/// Id to name table built from [`FALLBACK_NEIGHBORHOOD_NAMES`] (ids 1 to 19).
#[must_use]
pub fn fallback_neighborhood_names() -> BTreeMap<LocationId, String> {
    (1u32..)
        .zip(FALLBACK_NEIGHBORHOOD_NAMES)
        .map(|(id, name)| (LocationId::from(id), name.to_string()))
        .collect()
}

/// One entry of the neighborhood name table.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborhoodName {
    pub id: LocationId,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct NeighborhoodNameRow {
    id: serde_json::Value,
    name: String,
}

/// Parses the `[{id, name}]` name table.
///
/// # Errors
///
/// Returns [`LoadError::Parse`] when the JSON is malformed or an id is unusable.
pub fn parse_neighborhood_map(json: &str) -> Result<Vec<NeighborhoodName>, LoadError> {
    let rows: Vec<NeighborhoodNameRow> = serde_json::from_str(json)
        .map_err(|e| LoadError::parse(Dataset::NeighborhoodMap, e.to_string()))?;
    rows.into_iter()
        .map(|row| {
            let id = LocationId::from_json(&row.id).ok_or_else(|| {
                LoadError::parse(Dataset::NeighborhoodMap, format!("invalid id {}", row.id))
            })?;
            Ok(NeighborhoodName { id, name: row.name })
        })
        .collect()
}

/// A neighborhood polygon with its display name and centroid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborhoodShape {
    /// Feature id from the `loc` property.
    pub id: LocationId,
    /// Display name from the feature properties.
    pub name: String,
    /// Exterior ring of each polygon part, as `[lon, lat]` pairs.
    pub rings: Vec<Vec<[f64; 2]>>,
    /// Mean of the first ring's points, as `[lon, lat]`.
    pub centroid: Option<[f64; 2]>,
}

/// All neighborhood shapes, in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Geography {
    features: Vec<NeighborhoodShape>,
}

impl Geography {
    /// Builds a geography from features, keyed by id.
    #[must_use]
    pub fn new(features: Vec<NeighborhoodShape>) -> Self {
        Self { features }
    }

    /// Parses a GeoJSON document whose features carry `loc` / `locName`.
    ///
    /// Features without a usable id are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Parse`] when the document is not valid GeoJSON.
    pub fn from_geojson_str(content: &str) -> Result<Self, LoadError> {
        let geojson: GeoJson = content
            .parse()
            .map_err(|e| LoadError::parse(Dataset::Geography, format!("{e}")))?;

        let features = match geojson {
            GeoJson::FeatureCollection(fc) => fc.features,
            GeoJson::Feature(f) => vec![f],
            GeoJson::Geometry(_) => {
                return Err(LoadError::parse(
                    Dataset::Geography,
                    "expected features, found a bare geometry",
                ))
            }
        };

        Ok(Self::new(features.iter().filter_map(shape_of).collect()))
    }

    /// Features in file order.
    #[must_use]
    pub fn features(&self) -> &[NeighborhoodShape] {
        &self.features
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// True when there are no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Feature for `id`.
    #[must_use]
    pub fn get(&self, id: &LocationId) -> Option<&NeighborhoodShape> {
        self.features.iter().find(|f| &f.id == id)
    }

    /// Id to name table taken from the features.
    #[must_use]
    pub fn names(&self) -> BTreeMap<LocationId, String> {
        self.features
            .iter()
            .map(|f| (f.id.clone(), f.name.clone()))
            .collect()
    }
}

fn shape_of(feature: &Feature) -> Option<NeighborhoodShape> {
    let props = feature.properties.as_ref();
    let id = props
        .and_then(|p| p.get("loc").or_else(|| p.get("id")))
        .and_then(LocationId::from_json)?;
    let name = props
        .and_then(|p| p.get("locName").or_else(|| p.get("name")))
        .and_then(serde_json::Value::as_str)
        .map_or_else(|| format!("Neighborhood {id}"), str::to_string);

    let rings = feature
        .geometry
        .as_ref()
        .map(|g| exterior_rings(&g.value))
        .unwrap_or_default();
    let centroid = rings.first().and_then(|ring| centroid_of(ring));

    Some(NeighborhoodShape {
        id,
        name,
        rings,
        centroid,
    })
}

fn to_ring(positions: &[Vec<f64>]) -> Vec<[f64; 2]> {
    positions
        .iter()
        .filter(|p| p.len() >= 2)
        .map(|p| [p[0], p[1]])
        .collect()
}

fn exterior_rings(value: &Value) -> Vec<Vec<[f64; 2]>> {
    match value {
        Value::Polygon(rings) => rings.first().map(|r| vec![to_ring(r)]).unwrap_or_default(),
        Value::MultiPolygon(polys) => polys
            .iter()
            .filter_map(|rings| rings.first())
            .map(|r| to_ring(r))
            .collect(),
        _ => Vec::new(),
    }
}

fn centroid_of(ring: &[[f64; 2]]) -> Option<[f64; 2]> {
    if ring.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = ring.len() as f64;
    let (sum_lon, sum_lat) = ring
        .iter()
        .fold((0.0, 0.0), |(lon, lat), p| (lon + p[0], lat + p[1]));
    Some([sum_lon / n, sum_lat / n])
}
