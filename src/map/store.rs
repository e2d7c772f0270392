//! The state of one mounted map and the actions that change it.
//!
//! All changes go through [`MapStore::dispatch`]. Every action bumps the revision of the concerns
//! it touched, so a canvas only redraws what changed.

use std::{collections::HashMap, time::Duration};

use egui::Color32;
use log::{debug, info};

use super::{
  asset::{Asset, AssetId, AssetType},
  coordinates::WGS84Coordinate,
  layers::{BaseLayer, LayerRegistry, ShapefileLayer, overlay_id},
  map_event::MapEvent,
  spatial::centroid,
  timeline::Timeline,
  tools::{
    HeatmapCategory, HeatmapView, MeasurementMode, RandomSource, SampleSource, ToolMode, ToolState,
  },
};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
  ToggleOverlay(String),
  ToggleShapefile(String),
  SetShapefilesEnabled(bool),
  SetShapefileOpacity(String, f32),
  SetShapefileColor(String, Color32),
  SetBaseLayer(BaseLayer),
  SetTool(ToolMode),
  SetMeasurementMode(MeasurementMode),
  ResetMeasurement,
  MapClick(WGS84Coordinate),
  /// A marker was clicked on the map. Selects the asset and tells the owner.
  ClickMarker(AssetId),
  /// Selects an asset without a click, e.g. from a list.
  SelectAsset(AssetId),
  ClearSelection,
  SetHeatmapCategory(HeatmapCategory),
  SetClustering(bool),
  SetTimeSeries(bool),
  SetGrid(bool),
  PlayPause,
  StepForward,
  StepBack,
  Tick(Duration),
}

/// The parts of the map that are drawn independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Concern {
  BaseLayer,
  Markers,
  Overlays,
  Grid,
  Shapefiles,
  Measurement,
  Probe,
  CrossSection,
  Heatmap,
  /// The view has to move to the selected asset.
  Focus,
}

impl Concern {
  #[must_use]
  pub fn all() -> &'static [Concern] {
    &[
      Concern::BaseLayer,
      Concern::Markers,
      Concern::Overlays,
      Concern::Grid,
      Concern::Shapefiles,
      Concern::Measurement,
      Concern::Probe,
      Concern::CrossSection,
      Concern::Heatmap,
      Concern::Focus,
    ]
  }
}

#[derive(Debug)]
pub struct MapState {
  pub assets: Vec<Asset>,
  pub registry: LayerRegistry,
  pub base_layer: BaseLayer,
  pub tools: ToolState,
  pub selected: Option<AssetId>,
  pub clustering: bool,
  pub time_series: bool,
  pub timeline: Timeline,
}

impl MapState {
  #[must_use]
  pub fn asset(&self, id: &AssetId) -> Option<&Asset> {
    self.assets.iter().find(|a| &a.id == id)
  }

  #[must_use]
  pub fn selected_asset(&self) -> Option<&Asset> {
    self.selected.as_ref().and_then(|id| self.asset(id))
  }

  #[must_use]
  pub fn is_selected(&self, asset: &Asset) -> bool {
    self.selected.as_ref() == Some(&asset.id)
  }

  /// Assets to draw markers for: not hidden by their overlay and, while the time series is on,
  /// recorded on or before the displayed date.
  #[must_use]
  pub fn visible_assets(&self) -> Vec<&Asset> {
    self
      .registry
      .visible_assets(&self.assets)
      .into_iter()
      .filter(|asset| !self.time_series || self.timeline.shows(asset.recorded_on()))
      .collect()
  }

  /// Mean location of all assets.
  #[must_use]
  pub fn site_center(&self) -> Option<WGS84Coordinate> {
    centroid(self.assets.iter().map(Asset::coordinate))
  }

  #[must_use]
  pub fn grid_enabled(&self) -> bool {
    self.registry.overlay_enabled(overlay_id::GRID)
  }

  /// Boreholes along a complete cross-section. A stand-in that lists the first two visible
  /// boreholes.
  #[must_use]
  pub fn section_boreholes(&self) -> Vec<&Asset> {
    if !self.tools.cross_section.is_complete() {
      return Vec::new();
    }
    self
      .visible_assets()
      .into_iter()
      .filter(|a| a.asset_type() == AssetType::Borehole)
      .take(2)
      .collect()
  }
}

pub struct MapStore {
  state: MapState,
  revisions: HashMap<Concern, u64>,
  samples: Box<dyn SampleSource>,
}

impl std::fmt::Debug for MapStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MapStore")
      .field("state", &self.state)
      .field("revisions", &self.revisions)
      .finish_non_exhaustive()
  }
}

impl MapStore {
  #[must_use]
  pub fn new(assets: Vec<Asset>, shapefiles: Vec<ShapefileLayer>) -> Self {
    Self {
      state: MapState {
        assets,
        registry: LayerRegistry::new(shapefiles),
        base_layer: BaseLayer::default(),
        tools: ToolState::default(),
        selected: None,
        clustering: false,
        time_series: false,
        timeline: Timeline::default(),
      },
      revisions: HashMap::new(),
      samples: Box::new(RandomSource),
    }
  }

  #[must_use]
  pub fn with_timeline(mut self, timeline: Timeline) -> Self {
    self.state.timeline = timeline;
    self
  }

  #[must_use]
  pub fn with_sample_source(mut self, samples: Box<dyn SampleSource>) -> Self {
    self.samples = samples;
    self
  }

  #[must_use]
  pub fn with_base_layer(mut self, base_layer: BaseLayer) -> Self {
    self.state.base_layer = base_layer;
    self
  }

  #[must_use]
  pub fn with_clustering(mut self, clustering: bool) -> Self {
    self.state.clustering = clustering;
    self
  }

  #[must_use]
  pub fn state(&self) -> &MapState {
    &self.state
  }

  /// Starts at 0 and grows with every change of `concern`.
  #[must_use]
  pub fn revision(&self, concern: Concern) -> u64 {
    self.revisions.get(&concern).copied().unwrap_or(0)
  }

  fn bump(&mut self, concerns: &[Concern]) {
    for concern in concerns {
      *self.revisions.entry(*concern).or_insert(0) += 1;
    }
  }

  fn bump_if(&mut self, changed: bool, concerns: &[Concern]) {
    if changed {
      self.bump(concerns);
    }
  }

  fn overlay_concern(id: &str) -> Concern {
    match id {
      overlay_id::GRID => Concern::Grid,
      overlay_id::SETTLEMENT | overlay_id::SOIL => Concern::Overlays,
      _ => Concern::Markers,
    }
  }

  fn refresh_heatmap(&mut self) {
    let tools = &mut self.state.tools;
    tools.heatmap = if tools.mode() == ToolMode::Heatmap {
      let sites: Vec<_> = self.state.assets.iter().map(Asset::coordinate).collect();
      HeatmapView::generate(tools.heatmap_category, &sites, self.samples.as_mut())
    } else {
      None
    };
  }

  /// Applies `action` and returns the events for the owner of the map.
  pub fn dispatch(&mut self, action: Action) -> Vec<MapEvent> {
    let mut events = Vec::new();
    match action {
      Action::ToggleOverlay(id) => {
        let changed = self.state.registry.toggle_overlay(&id);
        self.bump_if(changed, &[Self::overlay_concern(&id)]);
      }
      Action::ToggleShapefile(id) => {
        let changed = self.state.registry.toggle_shapefile_visibility(&id);
        self.bump_if(changed, &[Concern::Shapefiles]);
      }
      Action::SetShapefilesEnabled(enabled) => {
        let changed = self.state.registry.set_shapefiles_enabled(enabled);
        self.bump_if(changed, &[Concern::Shapefiles]);
      }
      Action::SetShapefileOpacity(id, opacity) => {
        let changed = self.state.registry.set_opacity(&id, opacity);
        self.bump_if(changed, &[Concern::Shapefiles]);
      }
      Action::SetShapefileColor(id, color) => {
        let changed = self.state.registry.set_color(&id, color);
        self.bump_if(changed, &[Concern::Shapefiles]);
      }
      Action::SetBaseLayer(base_layer) => {
        let changed = self.state.base_layer != base_layer;
        self.state.base_layer = base_layer;
        self.bump_if(changed, &[Concern::BaseLayer]);
      }
      Action::SetTool(tool) => {
        self.state.tools.select(tool);
        self.refresh_heatmap();
        self.bump(&[
          Concern::Measurement,
          Concern::Probe,
          Concern::CrossSection,
          Concern::Heatmap,
        ]);
      }
      Action::SetMeasurementMode(mode) => {
        if self.state.tools.mode() == ToolMode::Measurement {
          self.state.tools.measurement.set_mode(mode);
          self.bump(&[Concern::Measurement]);
        } else {
          debug!("measurement mode {mode:?} ignored, measurement tool is not active");
        }
      }
      Action::ResetMeasurement => {
        self.state.tools.measurement.reset();
        self.bump(&[Concern::Measurement]);
      }
      Action::MapClick(coord) => self.map_click(coord, &mut events),
      Action::ClickMarker(id) => {
        if self.select(id.clone()) {
          events.push(MapEvent::AssetClicked(id));
        }
      }
      Action::SelectAsset(id) => {
        self.select(id);
      }
      Action::ClearSelection => {
        let changed = self.state.selected.take().is_some();
        self.bump_if(changed, &[Concern::Markers]);
      }
      Action::SetHeatmapCategory(category) => {
        self.state.tools.heatmap_category = category;
        self.refresh_heatmap();
        self.bump(&[Concern::Heatmap]);
      }
      Action::SetClustering(clustering) => {
        let changed = self.state.clustering != clustering;
        self.state.clustering = clustering;
        self.bump_if(changed, &[Concern::Markers]);
      }
      Action::SetTimeSeries(enabled) => {
        let changed = self.state.time_series != enabled;
        self.state.time_series = enabled;
        if !enabled {
          self.state.timeline.stop();
        }
        self.bump_if(changed, &[Concern::Markers]);
      }
      Action::SetGrid(enabled) => {
        let changed = self
          .state
          .registry
          .set_overlay_enabled(overlay_id::GRID, enabled);
        self.bump_if(changed, &[Concern::Grid]);
      }
      Action::PlayPause if self.state.time_series => self.state.timeline.play_pause(),
      Action::StepForward if self.state.time_series => {
        self.state.timeline.step_forward();
        self.bump(&[Concern::Markers]);
      }
      Action::StepBack if self.state.time_series => {
        self.state.timeline.step_back();
        self.bump(&[Concern::Markers]);
      }
      Action::Tick(elapsed) if self.state.time_series => {
        let changed = self.state.timeline.tick(elapsed);
        self.bump_if(changed, &[Concern::Markers]);
      }
      Action::PlayPause | Action::StepForward | Action::StepBack | Action::Tick(_) => {}
    }
    events
  }

  fn select(&mut self, id: AssetId) -> bool {
    if self.state.asset(&id).is_none() {
      debug!("selection of unknown asset {id}");
      return false;
    }
    info!("selected asset {id}");
    self.state.selected = Some(id);
    self.bump(&[Concern::Markers, Concern::Focus]);
    true
  }

  fn map_click(&mut self, coord: WGS84Coordinate, events: &mut Vec<MapEvent>) {
    if !coord.is_valid() {
      debug!("ignoring click outside the world: {coord:?}");
      return;
    }
    let tools = &mut self.state.tools;
    match tools.mode() {
      ToolMode::Measurement => {
        tools.measurement.add_point(coord);
        self.bump(&[Concern::Measurement]);
      }
      ToolMode::Coordinates => {
        tools.probe.set(coord);
        self.bump(&[Concern::Probe]);
      }
      ToolMode::CrossSection => {
        tools.cross_section.add_point(coord);
        if let Some((start, end, length_m)) = tools.cross_section.line() {
          events.push(MapEvent::CrossSectionReady {
            start,
            end,
            length_m,
          });
        }
        self.bump(&[Concern::CrossSection]);
      }
      ToolMode::Heatmap | ToolMode::None => {}
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::map::{
    asset::{AssetKind, InfrastructureStatus, Location},
    timeline::FixedClock,
    tools::FixedSource,
  };
  use chrono::NaiveDate;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn asset(id: &str, lat: f64, lng: f64, kind: AssetKind) -> Asset {
    Asset {
      id: AssetId::new(id),
      name: id.to_uppercase(),
      location: Location {
        lat,
        lng,
        address: String::new(),
      },
      kind,
    }
  }

  fn store() -> MapStore {
    let assets = vec![
      asset(
        "bh-001",
        51.5154,
        -0.1755,
        AssetKind::Borehole {
          depth: 35.,
          date: date(2024, 2, 10),
          soil_layers: Vec::new(),
        },
      ),
      asset(
        "mon-001",
        51.5158,
        -0.1750,
        AssetKind::MonitoringPoint {
          date: date(2024, 3, 1),
          instrument_type: "Inclinometer".to_string(),
          parameters: Vec::new(),
          latest_readings: Vec::new(),
        },
      ),
      asset(
        "inf-001",
        51.5160,
        -0.1760,
        AssetKind::Infrastructure {
          infrastructure_type: "Shaft".to_string(),
          status: InfrastructureStatus::UnderConstruction,
          specifications: Vec::new(),
        },
      ),
    ];
    MapStore::new(assets, Vec::new())
      .with_timeline(Timeline::new(
        date(2024, 1, 1),
        Duration::from_secs(1),
        Box::new(FixedClock(date(2024, 6, 1))),
      ))
      .with_sample_source(Box::new(FixedSource::new([0.5])))
  }

  fn ids(assets: &[&Asset]) -> Vec<String> {
    assets.iter().map(|a| a.id.to_string()).collect()
  }

  #[test]
  fn marker_click_selects_and_emits_once() {
    let mut store = store();
    let events = store.dispatch(Action::ClickMarker(AssetId::new("bh-001")));
    assert_eq!(events, vec![MapEvent::AssetClicked(AssetId::new("bh-001"))]);
    assert_eq!(store.state().selected_asset().unwrap().name, "BH-001");
    assert_eq!(store.revision(Concern::Focus), 1);

    assert!(store.dispatch(Action::ClickMarker(AssetId::new("nope"))).is_empty());
    assert!(store.dispatch(Action::SelectAsset(AssetId::new("mon-001"))).is_empty());
    assert_eq!(store.state().selected, Some(AssetId::new("mon-001")));
    store.dispatch(Action::ClearSelection);
    assert!(store.state().selected.is_none());
  }

  #[test]
  fn clicks_go_to_the_active_tool() {
    let mut store = store();
    store.dispatch(Action::MapClick(WGS84Coordinate::new(51.5, -0.17)));
    assert_eq!(store.revision(Concern::Measurement), 0);

    store.dispatch(Action::SetTool(ToolMode::CrossSection));
    assert!(store.dispatch(Action::MapClick(WGS84Coordinate::new(51.5154, -0.1755))).is_empty());
    let events = store.dispatch(Action::MapClick(WGS84Coordinate::new(51.5164, -0.1765)));
    assert!(matches!(
      events.as_slice(),
      [MapEvent::CrossSectionReady { length_m, .. }] if (length_m - 130.967).abs() < 1e-3
    ));
    assert_eq!(ids(&store.state().section_boreholes()), vec!["bh-001"]);

    store.dispatch(Action::SetTool(ToolMode::Coordinates));
    assert!(store.state().tools.cross_section.points().is_empty());
    store.dispatch(Action::MapClick(WGS84Coordinate::new(f64::NAN, 0.)));
    assert!(store.state().tools.probe.coordinate().is_none());
    store.dispatch(Action::MapClick(WGS84Coordinate::new(51.5, -0.17)));
    assert!(store.state().tools.probe.coordinate().is_some());
  }

  #[test]
  fn measurement_mode_only_applies_to_active_tool() {
    let mut store = store();
    store.dispatch(Action::SetMeasurementMode(MeasurementMode::Area));
    store.dispatch(Action::SetTool(ToolMode::Measurement));
    assert_eq!(
      store.state().tools.measurement.mode(),
      MeasurementMode::Distance
    );
    store.dispatch(Action::SetMeasurementMode(MeasurementMode::Area));
    assert_eq!(store.state().tools.measurement.mode(), MeasurementMode::Area);
  }

  #[test]
  fn heatmap_follows_tool_and_category() {
    let mut store = store();
    store.dispatch(Action::SetHeatmapCategory(HeatmapCategory::Strength));
    assert!(store.state().tools.heatmap.is_none());

    store.dispatch(Action::SetTool(ToolMode::Heatmap));
    let heatmap = store.state().tools.heatmap.as_ref().unwrap();
    assert_eq!(heatmap.category, HeatmapCategory::Settlement);
    assert_eq!(heatmap.samples.len(), 3);

    store.dispatch(Action::SetHeatmapCategory(HeatmapCategory::Groundwater));
    assert_eq!(
      store.state().tools.heatmap.as_ref().unwrap().category,
      HeatmapCategory::Groundwater
    );
    store.dispatch(Action::SetTool(ToolMode::Heatmap));
    assert!(store.state().tools.heatmap.is_none());
  }

  #[test]
  fn time_series_filters_and_plays() {
    let mut store = store();
    assert_eq!(store.state().visible_assets().len(), 3);

    store.dispatch(Action::StepForward);
    assert_eq!(store.state().timeline.date(), date(2024, 1, 1));

    store.dispatch(Action::SetTimeSeries(true));
    assert_eq!(ids(&store.state().visible_assets()), vec!["inf-001"]);

    store.dispatch(Action::PlayPause);
    let markers = store.revision(Concern::Markers);
    store.dispatch(Action::Tick(Duration::from_millis(2500)));
    assert_eq!(store.state().timeline.date(), date(2024, 3, 1));
    assert!(store.revision(Concern::Markers) > markers);
    assert_eq!(store.state().visible_assets().len(), 3);

    store.dispatch(Action::SetTimeSeries(false));
    assert!(!store.state().timeline.is_playing());
  }

  #[test]
  fn overlays_bump_their_concern() {
    let mut store = store();
    store.dispatch(Action::ToggleOverlay(overlay_id::SETTLEMENT.to_string()));
    assert_eq!(store.revision(Concern::Overlays), 1);
    assert_eq!(store.revision(Concern::Markers), 0);

    store.dispatch(Action::ToggleOverlay(overlay_id::BOREHOLES.to_string()));
    assert_eq!(store.revision(Concern::Markers), 1);
    assert_eq!(ids(&store.state().visible_assets()), vec!["mon-001", "inf-001"]);

    store.dispatch(Action::SetGrid(true));
    store.dispatch(Action::SetGrid(true));
    assert_eq!(store.revision(Concern::Grid), 1);
    assert!(store.state().grid_enabled());

    store.dispatch(Action::ToggleOverlay("unknown".to_string()));
    assert_eq!(store.revision(Concern::Markers), 1);
  }
}
