use serde_json::Value;
use thiserror::Error;

use super::style::StyleParser;
use crate::map::{
  coordinates::WGS84Coordinate,
  geometry_collection::{GeoGeometry, Geometry, Metadata},
};

#[derive(Error, Debug)]
pub enum GeoJsonError {
  #[error("invalid json: {0}")]
  Json(#[from] serde_json::Error),
  #[error("GeoJSON must be an object")]
  NotAnObject,
  #[error("missing 'type' field for GeoJSON")]
  MissingType,
  #[error("unknown GeoJSON type: {0}")]
  UnknownType(String),
  #[error("{0} without coordinates")]
  MissingCoordinates(String),
  #[error("invalid position: {0}")]
  InvalidPosition(String),
  #[error("{kind} needs at least {required} positions, got {actual}")]
  TooFewPositions {
    kind: &'static str,
    required: usize,
    actual: usize,
  },
}

/// Converts `GeoJSON` documents into styled geometry. Strict: any malformed feature fails the whole
/// document, so callers can decide to skip it.
#[derive(Debug, Clone)]
pub struct GeoJsonParser {
  layer_name: String,
}

impl Default for GeoJsonParser {
  fn default() -> Self {
    Self::new("geojson")
  }
}

impl GeoJsonParser {
  #[must_use]
  pub fn new(layer_name: impl Into<String>) -> Self {
    Self {
      layer_name: layer_name.into(),
    }
  }

  pub fn parse_str(&self, data: &str) -> Result<Vec<GeoGeometry>, GeoJsonError> {
    let value: Value = serde_json::from_str(data)?;
    self.parse(&value)
  }

  /// Parse `GeoJSON` data into one geometry per feature.
  pub fn parse(&self, value: &Value) -> Result<Vec<GeoGeometry>, GeoJsonError> {
    let obj = value.as_object().ok_or(GeoJsonError::NotAnObject)?;
    let geotype = obj
      .get("type")
      .and_then(Value::as_str)
      .ok_or(GeoJsonError::MissingType)?;
    match geotype {
      "FeatureCollection" => {
        let features = obj
          .get("features")
          .and_then(Value::as_array)
          .ok_or_else(|| GeoJsonError::MissingCoordinates("FeatureCollection".to_string()))?;
        let mut geometries = Vec::with_capacity(features.len());
        for feature in features {
          if let Some(geometry) = self.parse_feature(feature)? {
            geometries.push(geometry);
          }
        }
        Ok(geometries)
      }
      "Feature" => Ok(self.parse_feature(value)?.into_iter().collect()),
      "Point" | "LineString" | "Polygon" | "MultiPoint" | "MultiLineString" | "MultiPolygon"
      | "GeometryCollection" => Ok(vec![self.parse_geometry(value, &Metadata::default())?]),
      other => Err(GeoJsonError::UnknownType(other.to_string())),
    }
  }

  /// Parse a `GeoJSON` Feature object. Features with a null geometry are skipped.
  fn parse_feature(&self, feature: &Value) -> Result<Option<GeoGeometry>, GeoJsonError> {
    let obj = feature.as_object().ok_or(GeoJsonError::NotAnObject)?;

    let mut metadata = Metadata::default();
    if let Some(Value::Object(props)) = obj.get("properties") {
      let label = props
        .get("name")
        .or_else(|| props.get("id"))
        .and_then(Value::as_str)
        .map(String::from);
      if let Some(label) = label {
        metadata = metadata.with_label(label);
      }
      metadata = metadata.with_popup(StyleParser::popup_from_properties(&self.layer_name, props));
    }

    match obj.get("geometry") {
      None | Some(Value::Null) => Ok(None),
      Some(geometry) => self.parse_geometry(geometry, &metadata).map(Some),
    }
  }

  /// Parse `GeoJSON` geometry with metadata
  fn parse_geometry(
    &self,
    geometry: &Value,
    metadata: &Metadata,
  ) -> Result<GeoGeometry, GeoJsonError> {
    let obj = geometry.as_object().ok_or(GeoJsonError::NotAnObject)?;
    let geom_type = obj
      .get("type")
      .and_then(Value::as_str)
      .ok_or(GeoJsonError::MissingType)?;

    if geom_type == "GeometryCollection" {
      let geometries = obj
        .get("geometries")
        .and_then(Value::as_array)
        .ok_or_else(|| GeoJsonError::MissingCoordinates(geom_type.to_string()))?
        .iter()
        .map(|geom| self.parse_geometry(geom, &Metadata::default()))
        .collect::<Result<Vec<_>, _>>()?;
      return Ok(Geometry::GeometryCollection(geometries, metadata.clone()));
    }

    let coordinates = obj
      .get("coordinates")
      .ok_or_else(|| GeoJsonError::MissingCoordinates(geom_type.to_string()))?;

    match geom_type {
      "Point" => Ok(Geometry::Point(
        Self::parse_coordinate(coordinates)?,
        metadata.clone(),
      )),
      "LineString" => Ok(Geometry::LineString(
        Self::parse_line(coordinates)?,
        metadata.clone(),
      )),
      "Polygon" => Ok(Geometry::Polygon(
        Self::parse_polygon(coordinates)?,
        metadata.clone(),
      )),
      "MultiPoint" => {
        let geometries = Self::as_array(coordinates, geom_type)?
          .iter()
          .map(|point| -> Result<GeoGeometry, GeoJsonError> {
            Ok(Geometry::Point(Self::parse_coordinate(point)?, Metadata::default()))
          })
          .collect::<Result<Vec<_>, _>>()?;
        Ok(Geometry::GeometryCollection(geometries, metadata.clone()))
      }
      "MultiLineString" => {
        let geometries = Self::as_array(coordinates, geom_type)?
          .iter()
          .map(|line| -> Result<GeoGeometry, GeoJsonError> {
            Ok(Geometry::LineString(Self::parse_line(line)?, Metadata::default()))
          })
          .collect::<Result<Vec<_>, _>>()?;
        Ok(Geometry::GeometryCollection(geometries, metadata.clone()))
      }
      "MultiPolygon" => {
        let geometries = Self::as_array(coordinates, geom_type)?
          .iter()
          .map(|polygon| -> Result<GeoGeometry, GeoJsonError> {
            Ok(Geometry::Polygon(
              Self::parse_polygon(polygon)?,
              Metadata::default(),
            ))
          })
          .collect::<Result<Vec<_>, _>>()?;
        Ok(Geometry::GeometryCollection(geometries, metadata.clone()))
      }
      other => Err(GeoJsonError::UnknownType(other.to_string())),
    }
  }

  fn as_array<'a>(value: &'a Value, kind: &str) -> Result<&'a Vec<Value>, GeoJsonError> {
    value
      .as_array()
      .ok_or_else(|| GeoJsonError::MissingCoordinates(kind.to_string()))
  }

  fn parse_line(coords: &Value) -> Result<Vec<WGS84Coordinate>, GeoJsonError> {
    let line = Self::parse_coordinate_array(coords)?;
    if line.len() < 2 {
      return Err(GeoJsonError::TooFewPositions {
        kind: "LineString",
        required: 2,
        actual: line.len(),
      });
    }
    Ok(line)
  }

  /// Only the exterior ring is kept.
  fn parse_polygon(rings: &Value) -> Result<Vec<WGS84Coordinate>, GeoJsonError> {
    let exterior = Self::as_array(rings, "Polygon")?
      .first()
      .ok_or_else(|| GeoJsonError::MissingCoordinates("Polygon".to_string()))?;
    let ring = Self::parse_coordinate_array(exterior)?;
    if ring.len() < 3 {
      return Err(GeoJsonError::TooFewPositions {
        kind: "Polygon",
        required: 3,
        actual: ring.len(),
      });
    }
    Ok(ring)
  }

  /// Parse a single coordinate [lon, lat] or [lon, lat, elevation]
  fn parse_coordinate(coord: &Value) -> Result<WGS84Coordinate, GeoJsonError> {
    let invalid = || GeoJsonError::InvalidPosition(coord.to_string());
    let array = coord.as_array().filter(|a| a.len() >= 2).ok_or_else(invalid)?;
    let lng = array[0].as_f64().ok_or_else(invalid)?;
    let lat = array[1].as_f64().ok_or_else(invalid)?;
    let coordinate = WGS84Coordinate::new(lat, lng);
    if coordinate.is_valid() {
      Ok(coordinate)
    } else {
      Err(invalid())
    }
  }

  /// Parse an array of coordinates [[lon, lat], [lon, lat], ...]
  fn parse_coordinate_array(coords: &Value) -> Result<Vec<WGS84Coordinate>, GeoJsonError> {
    Self::as_array(coords, "position list")?
      .iter()
      .map(Self::parse_coordinate)
      .collect()
  }
}
