use std::fmt::Display;

use egui::Color32;
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::asset::Asset;
use crate::parser::hex_color;

/// Ids of the thematic overlays every map starts with.
pub mod overlay_id {
  pub const INSAR: &str = "insar";
  pub const SOIL: &str = "soil";
  pub const MONITORING: &str = "monitoring";
  pub const SETTLEMENT: &str = "settlement";
  pub const BOREHOLES: &str = "boreholes";
  pub const GRID: &str = "grid";
}

/// A thematic layer that is switched on and off as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
  pub id: String,
  pub name: String,
  pub enabled: bool,
  #[serde(with = "hex_color")]
  pub color: Color32,
}

impl Overlay {
  fn new(id: &str, name: &str, enabled: bool, color: Color32) -> Self {
    Self {
      id: id.to_string(),
      name: name.to_string(),
      enabled,
      color,
    }
  }

  /// The overlays a freshly mounted map shows.
  #[must_use]
  pub fn initial() -> Vec<Overlay> {
    vec![
      Self::new(overlay_id::INSAR, "InSAR Data", false, Color32::from_rgb(0xa8, 0x55, 0xf7)),
      Self::new(overlay_id::SOIL, "Soil Sample Results", false, Color32::from_rgb(0xf9, 0x73, 0x16)),
      Self::new(overlay_id::MONITORING, "Monitoring Points", true, Color32::from_rgb(0x76, 0x9f, 0x86)),
      Self::new(overlay_id::SETTLEMENT, "Settlement Contours", false, Color32::from_rgb(0xef, 0x44, 0x44)),
      Self::new(overlay_id::BOREHOLES, "Borehole Locations", true, Color32::from_rgb(0x18, 0x61, 0x81)),
      Self::new(overlay_id::GRID, "Survey Grid", false, Color32::from_rgb(0x6b, 0x72, 0x80)),
    ]
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryType {
  Point,
  LineString,
  Polygon,
  MultiPoint,
  MultiLineString,
  MultiPolygon,
}

impl GeometryType {
  #[must_use]
  pub fn name(&self) -> &'static str {
    match self {
      GeometryType::Point => "Point",
      GeometryType::LineString => "LineString",
      GeometryType::Polygon => "Polygon",
      GeometryType::MultiPoint => "MultiPoint",
      GeometryType::MultiLineString => "MultiLineString",
      GeometryType::MultiPolygon => "MultiPolygon",
    }
  }
}

fn default_opacity() -> f32 {
  1.
}

fn default_visible() -> bool {
  true
}

fn clamped_opacity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
  let opacity = f32::deserialize(deserializer)?;
  Ok(if opacity.is_nan() { 1. } else { opacity.clamp(0., 1.) })
}

/// An uploaded feature collection drawn as its own layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapefileLayer {
  pub id: String,
  pub name: String,
  pub project_id: String,
  #[serde(default)]
  pub uploaded_by: Option<String>,
  pub geometry_type: GeometryType,
  #[serde(default)]
  pub feature_count: usize,
  #[serde(default = "default_visible")]
  pub visible: bool,
  #[serde(default = "default_opacity", deserialize_with = "clamped_opacity")]
  opacity: f32,
  #[serde(with = "hex_color")]
  pub color: Color32,
  #[serde(default)]
  pub description: Option<String>,
  /// Projection of the source file, e.g. `EPSG:27700`. Feature data is always WGS84.
  #[serde(default)]
  pub projection: Option<String>,
  #[serde(default, rename = "geoJsonData")]
  pub geo_json: Value,
}

impl ShapefileLayer {
  #[must_use]
  pub fn opacity(&self) -> f32 {
    self.opacity
  }

  /// Sets the opacity, clamped to `[0, 1]`. NaN is ignored. Returns whether the value changed.
  pub fn set_opacity(&mut self, opacity: f32) -> bool {
    if opacity.is_nan() {
      return false;
    }
    let opacity = opacity.clamp(0., 1.);
    let changed = (self.opacity - opacity).abs() > f32::EPSILON;
    self.opacity = opacity;
    changed
  }

  /// Lines shown under the layer name in the sidebar.
  #[must_use]
  pub fn details(&self) -> Vec<String> {
    let mut lines = vec![format!(
      "{} · {} features",
      self.geometry_type.name(),
      self.feature_count
    )];
    if let Some(projection) = &self.projection {
      lines.push(format!("Source projection: {projection}"));
    }
    if let Some(uploaded_by) = &self.uploaded_by {
      lines.push(format!("Uploaded by {uploaded_by}"));
    }
    lines.extend(self.description.clone());
    lines
  }

  /// Whether there is any feature data to draw.
  #[must_use]
  pub fn has_data(&self) -> bool {
    match &self.geo_json {
      Value::Null => false,
      Value::Object(obj) => !obj.is_empty(),
      _ => true,
    }
  }
}

/// The single tiled background of the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseLayer {
  #[default]
  Street,
  Satellite,
  Terrain,
  Topo,
}

impl BaseLayer {
  #[must_use]
  pub fn all() -> &'static [BaseLayer] {
    &[
      BaseLayer::Street,
      BaseLayer::Satellite,
      BaseLayer::Terrain,
      BaseLayer::Topo,
    ]
  }

  #[must_use]
  pub fn name(&self) -> &'static str {
    match self {
      BaseLayer::Street => "Street",
      BaseLayer::Satellite => "Satellite",
      BaseLayer::Terrain => "Terrain",
      BaseLayer::Topo => "Topo",
    }
  }

  /// Background colour the viewer paints instead of downloading tiles.
  #[must_use]
  pub fn tint(&self) -> Color32 {
    match self {
      BaseLayer::Street => Color32::from_rgb(0xf2, 0xef, 0xe9),
      BaseLayer::Satellite => Color32::from_rgb(0x2f, 0x3b, 0x2c),
      BaseLayer::Terrain => Color32::from_rgb(0xe8, 0xe4, 0xc9),
      BaseLayer::Topo => Color32::from_rgb(0xdd, 0xe6, 0xd5),
    }
  }
}

impl Display for BaseLayer {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.name())
  }
}

impl std::str::FromStr for BaseLayer {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "street" => Ok(BaseLayer::Street),
      "satellite" => Ok(BaseLayer::Satellite),
      "terrain" => Ok(BaseLayer::Terrain),
      "topo" => Ok(BaseLayer::Topo),
      other => Err(format!("unknown base layer: {other}")),
    }
  }
}

/// Visibility, opacity and colour of every overlay and shapefile layer of one mounted map.
///
/// Nothing is persisted. A new registry starts from [`Overlay::initial`]. Operations on unknown
/// ids do nothing and report that nothing changed.
#[derive(Debug, Clone)]
pub struct LayerRegistry {
  overlays: Vec<Overlay>,
  shapefiles: Vec<ShapefileLayer>,
  shapefiles_enabled: bool,
}

impl Default for LayerRegistry {
  fn default() -> Self {
    Self::new(Vec::new())
  }
}

impl LayerRegistry {
  #[must_use]
  pub fn new(shapefiles: Vec<ShapefileLayer>) -> Self {
    Self {
      overlays: Overlay::initial(),
      shapefiles,
      shapefiles_enabled: true,
    }
  }

  #[must_use]
  pub fn overlays(&self) -> &[Overlay] {
    &self.overlays
  }

  #[must_use]
  pub fn shapefiles(&self) -> &[ShapefileLayer] {
    &self.shapefiles
  }

  #[must_use]
  pub fn shapefiles_enabled(&self) -> bool {
    self.shapefiles_enabled
  }

  #[must_use]
  pub fn overlay(&self, id: &str) -> Option<&Overlay> {
    self.overlays.iter().find(|o| o.id == id)
  }

  #[must_use]
  pub fn overlay_enabled(&self, id: &str) -> bool {
    self.overlay(id).is_some_and(|o| o.enabled)
  }

  pub fn toggle_overlay(&mut self, id: &str) -> bool {
    if let Some(overlay) = self.overlays.iter_mut().find(|o| o.id == id) {
      overlay.enabled = !overlay.enabled;
      debug!("overlay {id} enabled: {}", overlay.enabled);
      true
    } else {
      debug!("toggle of unknown overlay {id}");
      false
    }
  }

  pub fn set_overlay_enabled(&mut self, id: &str, enabled: bool) -> bool {
    match self.overlays.iter_mut().find(|o| o.id == id) {
      Some(overlay) if overlay.enabled != enabled => {
        overlay.enabled = enabled;
        true
      }
      Some(_) => false,
      None => {
        debug!("unknown overlay {id}");
        false
      }
    }
  }

  fn shapefile_mut(&mut self, id: &str) -> Option<&mut ShapefileLayer> {
    let layer = self.shapefiles.iter_mut().find(|l| l.id == id);
    if layer.is_none() {
      debug!("unknown shapefile layer {id}");
    }
    layer
  }

  pub fn toggle_shapefile_visibility(&mut self, id: &str) -> bool {
    if let Some(layer) = self.shapefile_mut(id) {
      layer.visible = !layer.visible;
      true
    } else {
      false
    }
  }

  pub fn set_opacity(&mut self, id: &str, opacity: f32) -> bool {
    self
      .shapefile_mut(id)
      .is_some_and(|layer| layer.set_opacity(opacity))
  }

  pub fn set_color(&mut self, id: &str, color: Color32) -> bool {
    self.shapefile_mut(id).is_some_and(|layer| {
      let changed = layer.color != color;
      layer.color = color;
      changed
    })
  }

  /// The master switch for all shapefile layers.
  pub fn set_shapefiles_enabled(&mut self, enabled: bool) -> bool {
    let changed = self.shapefiles_enabled != enabled;
    self.shapefiles_enabled = enabled;
    changed
  }

  /// Shapefile layers to draw, in upload order.
  pub fn visible_shapefiles(&self) -> impl Iterator<Item = &ShapefileLayer> {
    self
      .shapefiles
      .iter()
      .filter(|layer| self.shapefiles_enabled && layer.visible)
  }

  #[must_use]
  pub fn is_asset_visible(&self, asset: &Asset) -> bool {
    self
      .overlay(asset.asset_type().overlay_id())
      .is_none_or(|o| o.enabled)
  }

  /// Assets whose overlay is not switched off. Assets without an overlay are always visible.
  #[must_use]
  pub fn visible_assets<'a>(&self, assets: &'a [Asset]) -> Vec<&'a Asset> {
    assets
      .iter()
      .filter(|asset| self.is_asset_visible(asset))
      .collect()
  }
}
