use std::fmt::Display;

use chrono::NaiveDate;
use egui::Color32;
use serde::{Deserialize, Serialize};

use super::{coordinates::WGS84Coordinate, geometry_collection::Popup};

/// Date assumed for assets that carry no date of their own, 2024-01-01.
#[must_use]
pub fn default_record_date() -> NaiveDate {
  NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
  #[must_use]
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  #[must_use]
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl Display for AssetId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for AssetId {
  fn from(id: &str) -> Self {
    Self::new(id)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
  pub lat: f64,
  pub lng: f64,
  #[serde(default)]
  pub address: String,
}

impl Location {
  #[must_use]
  pub fn coordinate(&self) -> WGS84Coordinate {
    WGS84Coordinate::new(self.lat, self.lng)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoilLayer {
  /// Depth range as logged, e.g. `0.0 - 2.5m`.
  pub depth: String,
  pub description: String,
  pub classification: String,
  pub n_value: u32,
  pub moisture: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
  Normal,
  Warning,
  Alert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
  pub parameter: String,
  pub value: f64,
  pub unit: String,
  pub status: ReadingStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InfrastructureStatus {
  Operational,
  UnderConstruction,
  Planned,
}

impl Display for InfrastructureStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      InfrastructureStatus::Operational => "Operational",
      InfrastructureStatus::UnderConstruction => "Under construction",
      InfrastructureStatus::Planned => "Planned",
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specification {
  pub key: String,
  pub value: String,
}

/// The type specific payload of an asset, tagged by `type` in documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AssetKind {
  #[serde(rename = "borehole", rename_all = "camelCase")]
  Borehole {
    depth: f64,
    date: NaiveDate,
    #[serde(default)]
    soil_layers: Vec<SoilLayer>,
  },
  #[serde(rename = "monitoring", rename_all = "camelCase")]
  MonitoringPoint {
    date: NaiveDate,
    instrument_type: String,
    #[serde(default)]
    parameters: Vec<String>,
    #[serde(default)]
    latest_readings: Vec<Reading>,
  },
  #[serde(rename = "infrastructure", rename_all = "camelCase")]
  Infrastructure {
    infrastructure_type: String,
    status: InfrastructureStatus,
    #[serde(default)]
    specifications: Vec<Specification>,
  },
}

/// The discriminant of [`AssetKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetType {
  Borehole,
  Monitoring,
  Infrastructure,
}

impl AssetType {
  /// Id of the overlay that switches assets of this type on and off.
  #[must_use]
  pub fn overlay_id(self) -> &'static str {
    match self {
      AssetType::Borehole => "boreholes",
      AssetType::Monitoring => "monitoring",
      AssetType::Infrastructure => "infrastructure",
    }
  }

  #[must_use]
  pub fn name(self) -> &'static str {
    match self {
      AssetType::Borehole => "Borehole",
      AssetType::Monitoring => "Monitoring",
      AssetType::Infrastructure => "Infrastructure",
    }
  }

  #[must_use]
  pub fn color(self) -> Color32 {
    match self {
      AssetType::Borehole => Color32::from_rgb(0x18, 0x61, 0x81),
      AssetType::Monitoring => Color32::from_rgb(0x76, 0x9f, 0x86),
      AssetType::Infrastructure => Color32::from_rgb(0x1d, 0x27, 0x59),
    }
  }

  #[must_use]
  pub fn icon(self) -> &'static str {
    match self {
      AssetType::Borehole => "layers",
      AssetType::Monitoring => "activity",
      AssetType::Infrastructure => "building-2",
    }
  }
}

/// How a marker is drawn. Depends on nothing but the asset type and the selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerStyle {
  pub fill: Color32,
  pub stroke: Color32,
  pub icon_color: Color32,
  pub icon: &'static str,
  pub scale: f32,
  pub halo: bool,
}

impl MarkerStyle {
  /// Diameter of an unscaled marker in screen pixels.
  pub const SIZE: f32 = 32.;

  #[must_use]
  pub fn new(asset_type: AssetType, selected: bool) -> Self {
    let color = asset_type.color();
    Self {
      fill: if selected { color } else { Color32::WHITE },
      stroke: color,
      icon_color: if selected { Color32::WHITE } else { color },
      icon: asset_type.icon(),
      scale: if selected { 1.2 } else { 1. },
      halo: selected,
    }
  }

  #[must_use]
  pub fn radius(&self) -> f32 {
    Self::SIZE * self.scale / 2.
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
  pub id: AssetId,
  pub name: String,
  pub location: Location,
  #[serde(flatten)]
  pub kind: AssetKind,
}

impl Asset {
  #[must_use]
  pub fn asset_type(&self) -> AssetType {
    match self.kind {
      AssetKind::Borehole { .. } => AssetType::Borehole,
      AssetKind::MonitoringPoint { .. } => AssetType::Monitoring,
      AssetKind::Infrastructure { .. } => AssetType::Infrastructure,
    }
  }

  #[must_use]
  pub fn coordinate(&self) -> WGS84Coordinate {
    self.location.coordinate()
  }

  /// The date the asset was recorded. Infrastructure has none and counts as recorded on
  /// [`default_record_date`].
  #[must_use]
  pub fn recorded_on(&self) -> NaiveDate {
    match &self.kind {
      AssetKind::Borehole { date, .. } | AssetKind::MonitoringPoint { date, .. } => *date,
      AssetKind::Infrastructure { .. } => default_record_date(),
    }
  }

  #[must_use]
  pub fn marker_style(&self, selected: bool) -> MarkerStyle {
    MarkerStyle::new(self.asset_type(), selected)
  }

  /// Popup of the asset marker: the name, the type and one type specific highlight.
  #[must_use]
  pub fn popup(&self) -> Popup {
    let popup = Popup::new(&self.name).with_line(self.asset_type().name());
    match &self.kind {
      AssetKind::Borehole { depth, .. } => popup.with_line(format!("Depth: {depth}m")),
      AssetKind::MonitoringPoint {
        instrument_type, ..
      } => popup.with_line(instrument_type.clone()),
      AssetKind::Infrastructure {
        infrastructure_type,
        status,
        ..
      } => popup.with_line(format!("{infrastructure_type} ({status})")),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rstest::rstest;

  fn borehole() -> Asset {
    serde_json::from_str(
      r#"{
        "id": "bh-001",
        "type": "borehole",
        "name": "BH-PAD-001",
        "location": { "lat": 51.5154, "lng": -0.1755, "address": "Paddington Station, London W2 1HQ" },
        "depth": 35.0,
        "date": "2024-02-10",
        "soilLayers": [{
          "depth": "0.0 - 2.5m",
          "description": "Made Ground - Gravel and brick rubble",
          "classification": "GP-GM",
          "nValue": 15,
          "moisture": 12
        }]
      }"#,
    )
    .unwrap()
  }

  #[test]
  fn parse_tagged_assets() {
    let asset = borehole();
    assert_eq!(asset.asset_type(), AssetType::Borehole);
    assert_eq!(asset.id.as_str(), "bh-001");
    let AssetKind::Borehole { soil_layers, .. } = &asset.kind else {
      panic!("borehole expected");
    };
    assert_eq!(soil_layers[0].n_value, 15);

    let shaft: Asset = serde_json::from_str(
      r#"{
        "id": "inf-001",
        "type": "infrastructure",
        "name": "Access Shaft A",
        "location": { "lat": 51.516, "lng": -0.176 },
        "infrastructureType": "Shaft",
        "status": "under-construction"
      }"#,
    )
    .unwrap();
    assert_eq!(shaft.asset_type(), AssetType::Infrastructure);
    assert_eq!(shaft.recorded_on(), default_record_date());
    assert_eq!(
      shaft.popup().lines,
      vec!["Infrastructure", "Shaft (Under construction)"]
    );
  }

  #[test]
  fn unknown_type_is_rejected() {
    let result = serde_json::from_str::<Asset>(
      r#"{ "id": "x", "type": "crane", "name": "C", "location": { "lat": 0, "lng": 0 } }"#,
    );
    assert!(result.is_err());
  }

  #[test]
  fn borehole_popup_shows_depth() {
    let popup = borehole().popup();
    assert_eq!(popup.title, "BH-PAD-001");
    assert_eq!(popup.lines, vec!["Borehole", "Depth: 35m"]);
    assert_eq!(
      borehole().recorded_on(),
      NaiveDate::from_ymd_opt(2024, 2, 10).unwrap()
    );
  }

  #[rstest]
  #[case(AssetType::Borehole, "layers", Color32::from_rgb(0x18, 0x61, 0x81))]
  #[case(AssetType::Monitoring, "activity", Color32::from_rgb(0x76, 0x9f, 0x86))]
  #[case(AssetType::Infrastructure, "building-2", Color32::from_rgb(0x1d, 0x27, 0x59))]
  fn marker_appearance(#[case] asset_type: AssetType, #[case] icon: &str, #[case] color: Color32) {
    let plain = MarkerStyle::new(asset_type, false);
    assert_eq!(plain.icon, icon);
    assert_eq!(plain.fill, Color32::WHITE);
    assert_eq!(plain.stroke, color);
    assert!(!plain.halo);

    let selected = MarkerStyle::new(asset_type, true);
    assert_eq!(selected.fill, color);
    assert_eq!(selected.icon_color, Color32::WHITE);
    assert!(selected.halo);
    assert!(selected.radius() > plain.radius());
    assert_eq!(selected, MarkerStyle::new(asset_type, true));
  }
}
