use crate::types::{GridError, GridResult, Region};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Attribute key holding the region name in the default provincial dataset
pub const DEFAULT_NAME_KEY: &str = "PROVINSI";

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Geometry,
    properties: serde_json::Map<String, serde_json::Value>,
}

/// GeoJSON positions may carry an altitude; only lon/lat are used.
type Position = Vec<f64>;
type Ring = Vec<Position>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon { coordinates: Vec<Ring> },
    MultiPolygon { coordinates: Vec<Vec<Ring>> },
}

/// Loads a named-polygon collection from a GeoJSON FeatureCollection in
/// geographic coordinates (EPSG:4326).
pub struct RegionReader {
    name_key: String,
}

impl RegionReader {
    pub fn new() -> Self {
        Self {
            name_key: DEFAULT_NAME_KEY.to_string(),
        }
    }

    /// Use a different property key for the region name
    pub fn with_name_key(name_key: impl Into<String>) -> Self {
        Self {
            name_key: name_key.into(),
        }
    }

    /// Read all regions from `path`, preserving feature order.
    pub fn read<P: AsRef<Path>>(&self, path: P) -> GridResult<Vec<Region>> {
        let path = path.as_ref();
        log::info!("Loading region polygons from {}", path.display());

        let reader = BufReader::new(File::open(path)?);
        let collection: FeatureCollection = serde_json::from_reader(reader)?;

        let regions = collection
            .features
            .into_iter()
            .enumerate()
            .map(|(i, feature)| self.to_region(i, feature))
            .collect::<GridResult<Vec<Region>>>()?;

        log::info!("Loaded {} region(s)", regions.len());
        Ok(regions)
    }

    /// Parse regions from an in-memory GeoJSON string.
    pub fn read_str(&self, geojson: &str) -> GridResult<Vec<Region>> {
        let collection: FeatureCollection = serde_json::from_str(geojson)?;
        collection
            .features
            .into_iter()
            .enumerate()
            .map(|(i, feature)| self.to_region(i, feature))
            .collect()
    }

    fn to_region(&self, index: usize, feature: Feature) -> GridResult<Region> {
        let name = feature
            .properties
            .get(&self.name_key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                GridError::InvalidFormat(format!(
                    "feature {} has no string property '{}'",
                    index, self.name_key
                ))
            })?
            .to_string();

        let geometry = match feature.geometry {
            Geometry::Polygon { coordinates } => {
                MultiPolygon::new(vec![to_polygon(&coordinates, index)?])
            }
            Geometry::MultiPolygon { coordinates } => MultiPolygon::new(
                coordinates
                    .iter()
                    .map(|rings| to_polygon(rings, index))
                    .collect::<GridResult<Vec<Polygon<f64>>>>()?,
            ),
        };

        Ok(Region { name, geometry })
    }
}

impl Default for RegionReader {
    fn default() -> Self {
        Self::new()
    }
}

fn to_polygon(rings: &[Ring], feature_index: usize) -> GridResult<Polygon<f64>> {
    let mut iter = rings.iter().map(|ring| to_line_string(ring, feature_index));
    let exterior = iter.next().ok_or_else(|| {
        GridError::InvalidFormat(format!("feature {}: polygon with no rings", feature_index))
    })??;
    let interiors = iter.collect::<GridResult<Vec<LineString<f64>>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn to_line_string(ring: &Ring, feature_index: usize) -> GridResult<LineString<f64>> {
    let coords = ring
        .iter()
        .map(|pos| {
            if pos.len() < 2 {
                return Err(GridError::InvalidFormat(format!(
                    "feature {}: position with fewer than 2 ordinates",
                    feature_index
                )));
            }
            Ok(Coord {
                x: pos[0],
                y: pos[1],
            })
        })
        .collect::<GridResult<Vec<Coord<f64>>>>()?;
    Ok(LineString::from(coords))
}
