//! The mutually exclusive analysis tools of the map and their transient sessions.

use std::{collections::VecDeque, fmt::Display};

use egui::Color32;
use log::debug;
use serde::{Deserialize, Serialize};

use super::{
  coordinates::WGS84Coordinate,
  geometry_collection::Popup,
  spatial::{
    centroid, format_area, format_distance, haversine_distance, midpoint, path_length,
    polygon_area, utm_zone,
  },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ToolMode {
  #[default]
  None,
  Measurement,
  Coordinates,
  CrossSection,
  Heatmap,
}

impl ToolMode {
  #[must_use]
  pub fn all() -> &'static [ToolMode] {
    &[
      ToolMode::Measurement,
      ToolMode::Coordinates,
      ToolMode::CrossSection,
      ToolMode::Heatmap,
    ]
  }

  #[must_use]
  pub fn name(&self) -> &'static str {
    match self {
      ToolMode::None => "None",
      ToolMode::Measurement => "Measure",
      ToolMode::Coordinates => "Coordinates",
      ToolMode::CrossSection => "Cross-section",
      ToolMode::Heatmap => "Heatmap",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MeasurementMode {
  #[default]
  Distance,
  Area,
}

/// Outcome of a measurement in meters or square meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeasurementResult {
  Distance(f64),
  Area(f64),
}

impl Display for MeasurementResult {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      MeasurementResult::Distance(meters) => f.write_str(&format_distance(*meters)),
      MeasurementResult::Area(square_meters) => f.write_str(&format_area(*square_meters)),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementSession {
  mode: MeasurementMode,
  points: Vec<WGS84Coordinate>,
}

impl MeasurementSession {
  #[must_use]
  pub fn new(mode: MeasurementMode) -> Self {
    Self {
      mode,
      points: Vec::new(),
    }
  }

  #[must_use]
  pub fn mode(&self) -> MeasurementMode {
    self.mode
  }

  /// Switches between distance and area. The points are kept.
  pub fn set_mode(&mut self, mode: MeasurementMode) {
    self.mode = mode;
  }

  #[must_use]
  pub fn points(&self) -> &[WGS84Coordinate] {
    &self.points
  }

  pub fn add_point(&mut self, coord: WGS84Coordinate) {
    self.points.push(coord);
  }

  pub fn reset(&mut self) {
    self.points.clear();
  }

  /// Computed from all points on every call. Distances need two points and areas three; below
  /// that there is no result.
  #[must_use]
  pub fn result(&self) -> Option<MeasurementResult> {
    match self.mode {
      MeasurementMode::Distance if self.points.len() >= 2 => {
        Some(MeasurementResult::Distance(path_length(&self.points)))
      }
      MeasurementMode::Area => polygon_area(&self.points)
        .inspect_err(|e| debug!("no area yet: {e}"))
        .ok()
        .map(MeasurementResult::Area),
      MeasurementMode::Distance => None,
    }
  }
}

/// The two ends of a section line. A click after the line is complete starts over.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrossSectionSession {
  points: Vec<WGS84Coordinate>,
}

impl CrossSectionSession {
  pub fn add_point(&mut self, coord: WGS84Coordinate) {
    if self.points.len() >= 2 {
      self.points.clear();
    }
    self.points.push(coord);
  }

  #[must_use]
  pub fn points(&self) -> &[WGS84Coordinate] {
    &self.points
  }

  #[must_use]
  pub fn is_complete(&self) -> bool {
    self.points.len() == 2
  }

  /// Start, end and length in meters of a complete section.
  #[must_use]
  pub fn line(&self) -> Option<(WGS84Coordinate, WGS84Coordinate, f64)> {
    match self.points[..] {
      [start, end] => Some((start, end, haversine_distance(start, end))),
      _ => None,
    }
  }

  #[must_use]
  pub fn midpoint(&self) -> Option<WGS84Coordinate> {
    self.line().map(|(start, end, _)| midpoint(start, end))
  }

  pub fn reset(&mut self) {
    self.points.clear();
  }
}

/// The last clicked coordinate of the coordinate tool.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoordinateProbe {
  coord: Option<WGS84Coordinate>,
}

impl CoordinateProbe {
  pub fn set(&mut self, coord: WGS84Coordinate) {
    self.coord = Some(coord);
  }

  #[must_use]
  pub fn coordinate(&self) -> Option<WGS84Coordinate> {
    self.coord
  }

  pub fn clear(&mut self) {
    self.coord = None;
  }

  /// `Lat`, `Lng` and `UTM` lines of the readout.
  #[must_use]
  pub fn readout(&self) -> Option<[String; 3]> {
    self.coord.map(|c| {
      [
        format!("Lat: {:.6}°", c.lat),
        format!("Lng: {:.6}°", c.lng),
        format!("UTM: Zone {}N", utm_zone(c.lng)),
      ]
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeatmapCategory {
  #[default]
  Settlement,
  Groundwater,
  Strength,
}

impl HeatmapCategory {
  #[must_use]
  pub fn all() -> &'static [HeatmapCategory] {
    &[
      HeatmapCategory::Settlement,
      HeatmapCategory::Groundwater,
      HeatmapCategory::Strength,
    ]
  }

  #[must_use]
  pub fn name(&self) -> &'static str {
    match self {
      HeatmapCategory::Settlement => "Settlement",
      HeatmapCategory::Groundwater => "Groundwater",
      HeatmapCategory::Strength => "Strength",
    }
  }

  #[must_use]
  pub fn unit(&self) -> &'static str {
    match self {
      HeatmapCategory::Settlement => "mm",
      HeatmapCategory::Groundwater => "m",
      HeatmapCategory::Strength => "kPa",
    }
  }

  /// Colours from high to low intensity.
  #[must_use]
  pub fn palette(&self) -> [Color32; 3] {
    match self {
      HeatmapCategory::Settlement => [
        Color32::from_rgb(0xef, 0x44, 0x44),
        Color32::from_rgb(0xf5, 0x9e, 0x0b),
        Color32::from_rgb(0xfb, 0xbf, 0x24),
      ],
      HeatmapCategory::Groundwater => [
        Color32::from_rgb(0x3b, 0x82, 0xf6),
        Color32::from_rgb(0x60, 0xa5, 0xfa),
        Color32::from_rgb(0x93, 0xc5, 0xfd),
      ],
      HeatmapCategory::Strength => [
        Color32::from_rgb(0x22, 0xc5, 0x5e),
        Color32::from_rgb(0x84, 0xcc, 0x16),
        Color32::from_rgb(0xfa, 0xcc, 0x15),
      ],
    }
  }
}

/// Uniform draws in `[0, 1)` for the heatmap samples.
pub trait SampleSource {
  fn next_unit(&mut self) -> f64;
}

/// Draws from the thread local generator of `rand`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSource;

impl SampleSource for RandomSource {
  fn next_unit(&mut self) -> f64 {
    rand::random::<f64>()
  }
}

/// Replays fixed values in a loop. Replays 0.5 if empty.
#[derive(Debug, Default, Clone)]
pub struct FixedSource {
  values: VecDeque<f64>,
}

impl FixedSource {
  #[must_use]
  pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
    Self {
      values: values.into_iter().collect(),
    }
  }
}

impl SampleSource for FixedSource {
  fn next_unit(&mut self) -> f64 {
    let value = self.values.pop_front().unwrap_or(0.5);
    self.values.push_back(value);
    value
  }
}

const HEAT_SAMPLE_COUNT: usize = 5;
const HEAT_SAMPLE_SPREAD_DEG: f64 = 0.002;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatRing {
  pub radius_m: f64,
  pub color: Color32,
  pub fill_opacity: f32,
  pub stroke_opacity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatSample {
  pub coord: WGS84Coordinate,
  pub value: f64,
  /// 0 for the top tertile of values, 2 for the bottom.
  pub intensity: usize,
  pub color: Color32,
}

impl HeatSample {
  #[must_use]
  pub fn popup(&self, category: HeatmapCategory) -> Popup {
    Popup::new(category.name()).with_line(format!("Value: {:.1}{}", self.value, category.unit()))
  }
}

/// A decorative heatmap: rings around the site centre and a few random samples. Not an
/// interpolation of real readings.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapView {
  pub category: HeatmapCategory,
  pub center: WGS84Coordinate,
  pub rings: Vec<HeatRing>,
  pub samples: Vec<HeatSample>,
}

impl HeatmapView {
  /// `None` if there are no sites to centre on.
  #[must_use]
  #[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
  )]
  pub fn generate(
    category: HeatmapCategory,
    sites: &[WGS84Coordinate],
    source: &mut dyn SampleSource,
  ) -> Option<Self> {
    let center = centroid(sites.iter().copied())?;
    let palette = category.palette();
    let rings = palette
      .iter()
      .enumerate()
      .map(|(i, color)| HeatRing {
        radius_m: 800. - i as f64 * 250.,
        color: *color,
        fill_opacity: 0.15 - i as f32 * 0.03,
        stroke_opacity: 0.4,
      })
      .collect();
    let samples = sites
      .iter()
      .take(HEAT_SAMPLE_COUNT)
      .map(|site| {
        let d_lat = (source.next_unit() - 0.5) * HEAT_SAMPLE_SPREAD_DEG;
        let d_lng = (source.next_unit() - 0.5) * HEAT_SAMPLE_SPREAD_DEG;
        let value = source.next_unit() * 100.;
        let intensity = ((value / 33.).floor().max(0.) as usize).min(palette.len() - 1);
        HeatSample {
          coord: site.offset(d_lat, d_lng),
          value,
          intensity,
          color: palette[intensity],
        }
      })
      .collect();
    Some(Self {
      category,
      center,
      rings,
      samples,
    })
  }
}

/// Which tool is active and the transient state of every tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolState {
  mode: ToolMode,
  pub measurement: MeasurementSession,
  pub cross_section: CrossSectionSession,
  pub probe: CoordinateProbe,
  pub heatmap_category: HeatmapCategory,
  pub heatmap: Option<HeatmapView>,
}

impl ToolState {
  #[must_use]
  pub fn mode(&self) -> ToolMode {
    self.mode
  }

  /// Activates `tool`. The previous tool is cleared first. Selecting the active tool again switches
  /// it off.
  pub fn select(&mut self, tool: ToolMode) {
    let next = if tool == self.mode {
      ToolMode::None
    } else {
      tool
    };
    self.clear(self.mode);
    match next {
      ToolMode::Measurement => self.measurement = MeasurementSession::default(),
      ToolMode::Heatmap => self.heatmap_category = HeatmapCategory::default(),
      ToolMode::None | ToolMode::Coordinates | ToolMode::CrossSection => {}
    }
    debug!("tool {:?} -> {next:?}", self.mode);
    self.mode = next;
  }

  fn clear(&mut self, tool: ToolMode) {
    match tool {
      ToolMode::None => {}
      ToolMode::Measurement => self.measurement.reset(),
      ToolMode::Coordinates => self.probe.clear(),
      ToolMode::CrossSection => self.cross_section.reset(),
      ToolMode::Heatmap => self.heatmap = None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use assert_approx_eq::assert_approx_eq;
  use rstest::rstest;

  fn c(lat: f64, lng: f64) -> WGS84Coordinate {
    WGS84Coordinate::new(lat, lng)
  }

  #[test]
  fn distance_sums_the_legs() {
    let mut session = MeasurementSession::new(MeasurementMode::Distance);
    session.add_point(c(51.5154, -0.1755));
    assert_eq!(session.result(), None);
    session.add_point(c(51.5164, -0.1765));
    session.add_point(c(51.5149, -0.1745));

    let legs = haversine_distance(session.points()[0], session.points()[1])
      + haversine_distance(session.points()[1], session.points()[2]);
    let Some(MeasurementResult::Distance(total)) = session.result() else {
      panic!("distance expected");
    };
    assert_approx_eq!(total, legs);
    assert!(total > haversine_distance(session.points()[0], session.points()[2]));
    assert_eq!(
      session.result().unwrap().to_string(),
      "Distance: 0.35 km (348 m)"
    );
  }

  #[test]
  fn area_needs_three_points_and_keeps_them_on_mode_change() {
    let mut session = MeasurementSession::new(MeasurementMode::Area);
    session.add_point(c(0., 0.));
    session.add_point(c(0., 0.01));
    assert_eq!(session.result(), None);
    session.add_point(c(0.01, 0.01));
    session.add_point(c(0.01, 0.));
    assert_eq!(session.result().unwrap().to_string(), "Area: 1.24 km²");

    session.set_mode(MeasurementMode::Distance);
    assert_eq!(session.points().len(), 4);
    assert!(matches!(
      session.result(),
      Some(MeasurementResult::Distance(_))
    ));
    session.reset();
    assert_eq!(session.result(), None);
  }

  #[test]
  fn cross_section_never_holds_three_points() {
    let mut section = CrossSectionSession::default();
    section.add_point(c(51.5154, -0.1755));
    assert!(section.line().is_none());
    section.add_point(c(51.5164, -0.1765));
    let (_, _, length) = section.line().unwrap();
    assert_approx_eq!(length, 130.967, 0.001);
    section.add_point(c(51.5149, -0.1745));
    assert_eq!(section.points(), &[c(51.5149, -0.1745)]);
    for _ in 0..10 {
      section.add_point(c(51.5, -0.17));
      assert!(section.points().len() <= 2);
    }
  }

  #[test]
  fn coordinate_readout_replaces_the_last_click() {
    let mut probe = CoordinateProbe::default();
    assert!(probe.readout().is_none());
    probe.set(c(1., 2.));
    probe.set(c(51.515_4, -0.175_5));
    assert_eq!(
      probe.readout().unwrap(),
      [
        "Lat: 51.515400°".to_string(),
        "Lng: -0.175500°".to_string(),
        "UTM: Zone 30N".to_string()
      ]
    );
  }

  #[test]
  fn selecting_tools() {
    let mut tools = ToolState::default();
    assert_eq!(tools.mode(), ToolMode::None);

    tools.select(ToolMode::Measurement);
    tools.measurement.add_point(c(0., 0.));
    tools.measurement.set_mode(MeasurementMode::Area);

    tools.select(ToolMode::CrossSection);
    assert_eq!(tools.mode(), ToolMode::CrossSection);
    assert!(tools.measurement.points().is_empty());
    tools.cross_section.add_point(c(0., 0.));

    tools.select(ToolMode::Measurement);
    assert_eq!(tools.measurement.mode(), MeasurementMode::Distance);
    assert!(tools.cross_section.points().is_empty());

    tools.select(ToolMode::Measurement);
    assert_eq!(tools.mode(), ToolMode::None);
  }

  #[rstest]
  #[case(0.0, 0)]
  #[case(0.32, 0)]
  #[case(0.5, 1)]
  #[case(0.7, 2)]
  #[case(0.999, 2)]
  fn heat_sample_tertiles(#[case] draw: f64, #[case] intensity: usize) {
    let sites = [c(51.5154, -0.1755)];
    let mut source = FixedSource::new([0.5, 0.5, draw]);
    let view = HeatmapView::generate(HeatmapCategory::Settlement, &sites, &mut source).unwrap();
    assert_eq!(view.samples[0].intensity, intensity);
    assert_eq!(
      view.samples[0].color,
      HeatmapCategory::Settlement.palette()[intensity]
    );
  }

  #[test]
  fn heatmap_rings_and_samples() {
    let sites: Vec<_> = (0..7).map(|i| c(51.515 + f64::from(i) * 0.0001, -0.176)).collect();
    let mut source = FixedSource::new([1.0, 0.0, 0.25]);
    let view = HeatmapView::generate(HeatmapCategory::Groundwater, &sites, &mut source).unwrap();
    let radii: Vec<_> = view.rings.iter().map(|r| r.radius_m).collect();
    assert_eq!(radii, vec![800., 550., 300.]);
    assert_approx_eq!(view.rings[2].fill_opacity, 0.09, 1e-6);
    assert_eq!(view.samples.len(), 5);
    assert_approx_eq!(view.samples[0].coord.lat, 51.516);
    assert_approx_eq!(view.samples[0].coord.lng, -0.177);
    assert_eq!(
      view.samples[0].popup(HeatmapCategory::Groundwater).lines,
      vec!["Value: 25.0m"]
    );
    assert!(HeatmapView::generate(HeatmapCategory::Strength, &[], &mut source).is_none());
  }
}
