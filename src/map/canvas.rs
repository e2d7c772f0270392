//! Draws the state of a [`MapStore`] onto a [`Renderer`].
//!
//! Primitives are kept in groups, one per drawn concern. Redrawing a group always removes every
//! primitive the group added before, then adds the new ones. The store's revision counters decide
//! which groups are redrawn.

use std::{
  collections::{BTreeMap, HashMap},
  f32::consts::TAU,
};

use egui::Color32;
use log::{debug, info, warn};

use super::{
  asset::{Asset, AssetId, MarkerStyle},
  cluster::{Clusterer, RadiusClusterer},
  coordinates::{GeoBounds, PixelPosition, Viewport, WGS84Coordinate},
  geometry_collection::{Popup, Style, with_opacity},
  layers::{ShapefileLayer, overlay_id},
  map_event::MapEvent,
  renderer::{Primitive, PrimitiveHandle, Renderer},
  spatial::format_km,
  store::{Action, Concern, MapState, MapStore},
  tools::{HeatmapView, MeasurementMode},
};
use crate::{
  config::{Config, DEFAULT_CLUSTER_THRESHOLD, DEFAULT_INITIAL_ZOOM, TileProvider},
  parser::GeoJsonParser,
};

/// Selecting an asset zooms in at least this far.
pub const FOCUS_ZOOM: f64 = 15.;

const MEASURE_COLOR: Color32 = Color32::from_rgb(0x18, 0x61, 0x81);
const SECTION_COLOR: Color32 = Color32::from_rgb(0xef, 0x44, 0x44);
const PROBE_COLOR: Color32 = Color32::from_rgb(0xef, 0x44, 0x44);
const GRID_COLOR: Color32 = Color32::from_rgb(0x9c, 0xa3, 0xaf);
const SOIL_COLOR: Color32 = Color32::from_rgb(0xf9, 0x73, 0x16);
const SETTLEMENT_RINGS: [(f64, Color32); 2] = [
  (300., Color32::from_rgb(0xef, 0x44, 0x44)),
  (500., Color32::from_rgb(0xf5, 0x9e, 0x0b)),
];
const SOIL_OFFSETS: [(f64, f64); 3] = [(0.001, 0.), (-0.001, 0.001), (0., -0.001)];

const GRID_STEP_DEG: f64 = 0.005;
/// Above this many lines per direction the grid would be noise.
const MAX_GRID_LINES: i64 = 400;
const SHAPE_POINT_RADIUS: f32 = 6.;
const SPREAD_LEG_COLOR: Color32 = Color32::from_rgb(0x4b, 0x55, 0x63);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Group {
  BaseTile,
  Markers,
  Overlays,
  Grid,
  Shapefiles,
  Measurement,
  Probe,
  CrossSection,
  Heatmap,
}

#[derive(Debug, Clone, PartialEq)]
enum ClickTarget {
  Asset(AssetId),
  Cluster(GeoBounds),
}

/// Keeps a renderer in line with a [`MapStore`] and routes clicks back into it.
///
/// The canvas owns the renderer. Pass `&mut renderer` to keep using it after the canvas is gone;
/// unmounting, explicitly or on drop, removes everything the canvas added.
pub struct MapCanvas<R: Renderer> {
  renderer: R,
  clusterer: Box<dyn Clusterer>,
  tile_providers: Vec<TileProvider>,
  cluster_threshold: usize,
  initial_zoom: f64,
  groups: HashMap<Group, Vec<PrimitiveHandle>>,
  targets: BTreeMap<PrimitiveHandle, (ClickTarget, Primitive)>,
  /// Bounds of a cluster whose members are spread around its centre.
  spread: Option<GeoBounds>,
  synced: HashMap<Concern, u64>,
  mounted: bool,
}

impl<R: Renderer> MapCanvas<R> {
  #[must_use]
  pub fn new(renderer: R) -> Self {
    Self {
      renderer,
      clusterer: Box::new(RadiusClusterer::default()),
      tile_providers: Vec::new(),
      cluster_threshold: DEFAULT_CLUSTER_THRESHOLD,
      initial_zoom: DEFAULT_INITIAL_ZOOM,
      groups: HashMap::new(),
      targets: BTreeMap::new(),
      spread: None,
      synced: HashMap::new(),
      mounted: false,
    }
  }

  #[must_use]
  pub fn with_config(mut self, config: &Config) -> Self {
    self.tile_providers.clone_from(&config.tile_provider);
    self.cluster_threshold = config.cluster_threshold();
    self.initial_zoom = config.initial_zoom();
    self.clusterer = Box::new(RadiusClusterer::new(config.cluster_radius_px()));
    self
  }

  #[must_use]
  pub fn with_clusterer(mut self, clusterer: Box<dyn Clusterer>) -> Self {
    self.clusterer = clusterer;
    self
  }

  #[must_use]
  pub fn renderer(&self) -> &R {
    &self.renderer
  }

  #[must_use]
  pub fn viewport(&self) -> Viewport {
    self.renderer.viewport()
  }

  #[must_use]
  pub fn is_mounted(&self) -> bool {
    self.mounted
  }

  /// The asset behind a marker handle.
  #[must_use]
  pub fn asset_at(&self, handle: PrimitiveHandle) -> Option<&AssetId> {
    match self.targets.get(&handle) {
      Some((ClickTarget::Asset(id), _)) => Some(id),
      _ => None,
    }
  }

  /// Centres the view on the site at the initial zoom and draws everything.
  pub fn mount(&mut self, store: &MapStore) {
    let current = self.renderer.viewport();
    let center = store.state().site_center().unwrap_or(current.center);
    self.renderer.set_viewport(
      Viewport::new(center, self.initial_zoom).with_size(current.width, current.height),
    );
    self.synced.clear();
    self.mounted = true;
    info!(
      "mounted map with {} assets at {center:?}",
      store.state().assets.len()
    );
    self.sync(store);
  }

  /// Removes everything the canvas drew.
  pub fn unmount(&mut self) {
    let groups: Vec<Group> = self.groups.keys().copied().collect();
    for group in groups {
      self.clear(group);
    }
    self.targets.clear();
    self.spread = None;
    self.synced.clear();
    self.mounted = false;
  }

  fn is_stale(&self, store: &MapStore, concern: Concern) -> bool {
    self.synced.get(&concern) != Some(&store.revision(concern))
  }

  /// Redraws the groups whose concern changed since the last sync. Returns whether anything was
  /// redrawn.
  pub fn sync(&mut self, store: &MapStore) -> bool {
    if !self.mounted {
      return false;
    }
    let stale: Vec<Concern> = Concern::all()
      .iter()
      .copied()
      .filter(|c| self.is_stale(store, *c))
      .collect();
    if stale.is_empty() {
      return false;
    }
    let state = store.state();

    let mut view_moved = false;
    if stale.contains(&Concern::Focus)
      && let Some(asset) = state.selected_asset()
    {
      let mut viewport = self.renderer.viewport();
      viewport.focus(asset.coordinate(), FOCUS_ZOOM);
      self.renderer.set_viewport(viewport);
      view_moved = true;
    }

    for concern in &stale {
      match concern {
        Concern::BaseLayer => self.draw_base_layer(state),
        Concern::Markers => self.draw_markers(state),
        Concern::Overlays => self.draw_overlays(state),
        Concern::Grid => self.draw_grid(state),
        Concern::Shapefiles => self.draw_shapefiles(state),
        Concern::Measurement => self.draw_measurement(state),
        Concern::Probe => self.draw_probe(state),
        Concern::CrossSection => self.draw_cross_section(state),
        Concern::Heatmap => self.draw_heatmap(state),
        Concern::Focus => {}
      }
      self.synced.insert(*concern, store.revision(*concern));
    }
    if view_moved {
      self.redraw_view_dependent(state, &stale);
    }
    true
  }

  /// Moves the view, e.g. after a pan or zoom, and redraws what depends on it.
  pub fn set_viewport(&mut self, viewport: Viewport, store: &MapStore) {
    let current = self.renderer.viewport();
    if viewport == current {
      return;
    }
    if (viewport.zoom - current.zoom).abs() > f64::EPSILON {
      self.spread = None;
    }
    self.renderer.set_viewport(viewport);
    if self.mounted {
      self.redraw_view_dependent(store.state(), &[]);
    }
  }

  /// Clusters depend on the zoom and the grid on the visible bounds.
  fn redraw_view_dependent(&mut self, state: &MapState, already_drawn: &[Concern]) {
    if !already_drawn.contains(&Concern::Markers) && self.clusters_active(state) {
      self.draw_markers(state);
    }
    if !already_drawn.contains(&Concern::Grid) && state.grid_enabled() {
      self.draw_grid(state);
    }
  }

  fn clusters_active(&self, state: &MapState) -> bool {
    state.clustering && state.visible_assets().len() > self.cluster_threshold
  }

  /// Routes a click at a screen position: markers select their asset, cluster badges zoom to
  /// their members, everything else goes to the active tool.
  pub fn click(&mut self, pos: PixelPosition, store: &mut MapStore) -> Vec<MapEvent> {
    let viewport = self.renderer.viewport();
    let target = self
      .targets
      .iter()
      .rev()
      .find(|(_, (_, primitive))| primitive.hit(&viewport, pos))
      .map(|(handle, (target, _))| (*handle, target.clone()));
    match target {
      Some((handle, ClickTarget::Asset(_))) => self.click_marker(handle, store),
      Some((handle, ClickTarget::Cluster(_))) => {
        self.click_cluster(handle, store);
        Vec::new()
      }
      None => {
        let events = store.dispatch(Action::MapClick(viewport.from_screen(pos)));
        self.sync(store);
        events
      }
    }
  }

  /// Selects the asset of a marker and reports the click.
  pub fn click_marker(&mut self, handle: PrimitiveHandle, store: &mut MapStore) -> Vec<MapEvent> {
    let Some(id) = self.asset_at(handle).cloned() else {
      debug!("click on {handle:?}, which is not a marker");
      return Vec::new();
    };
    let events = store.dispatch(Action::ClickMarker(id));
    self.sync(store);
    events
  }

  /// Zooms to the members of a cluster. A cluster that stays together at the closest zoom is
  /// spread out instead, one marker per member. Returns false if `handle` is not a cluster badge.
  pub fn click_cluster(&mut self, handle: PrimitiveHandle, store: &MapStore) -> bool {
    let Some((ClickTarget::Cluster(bounds), _)) = self.targets.get(&handle) else {
      return false;
    };
    let bounds = *bounds;
    let current = self.renderer.viewport();
    let mut viewport = current;
    viewport.fit(&bounds);
    if viewport.zoom > current.zoom {
      self.set_viewport(viewport, store);
      return true;
    }
    debug!("cluster cannot zoom past {}, spreading its members", current.zoom);
    viewport.zoom = current.zoom;
    self.spread = Some(bounds);
    self.renderer.set_viewport(viewport);
    if self.mounted {
      self.redraw_view_dependent(store.state(), &[]);
    }
    true
  }

  fn add(&mut self, group: Group, primitive: Primitive) -> PrimitiveHandle {
    let handle = self.renderer.add(primitive);
    self.groups.entry(group).or_default().push(handle);
    handle
  }

  fn add_target(&mut self, group: Group, primitive: Primitive, target: ClickTarget) {
    let handle = self.add(group, primitive.clone());
    self.targets.insert(handle, (target, primitive));
  }

  fn clear(&mut self, group: Group) {
    for handle in self.groups.remove(&group).unwrap_or_default() {
      if !self.renderer.remove(handle) {
        warn!("renderer lost primitive {handle:?} of {group:?}");
      }
      self.targets.remove(&handle);
    }
  }

  fn draw_base_layer(&mut self, state: &MapState) {
    self.clear(Group::BaseTile);
    let provider = TileProvider::lookup(&self.tile_providers, state.base_layer);
    debug!("base layer {} from {}", state.base_layer, provider.url);
    self.add(
      Group::BaseTile,
      Primitive::TileLayer {
        base_layer: state.base_layer,
        max_zoom: provider.get_max_zoom(),
        url: provider.url,
        attribution: provider.attribution,
      },
    );
  }

  fn marker(state: &MapState, asset: &Asset) -> Primitive {
    Primitive::Marker {
      coord: asset.coordinate(),
      style: asset.marker_style(state.is_selected(asset)),
      popup: asset.popup(),
    }
  }

  fn draw_markers(&mut self, state: &MapState) {
    self.clear(Group::Markers);
    let assets = state.visible_assets();

    if self.clusters_active(state) {
      let coords: Vec<WGS84Coordinate> = assets.iter().map(|a| a.coordinate()).collect();
      match self.clusterer.cluster(&coords, self.renderer.viewport().zoom) {
        Ok(clusters) => {
          for cluster in clusters {
            if cluster.is_single() {
              let asset = assets[cluster.members[0]];
              let target = ClickTarget::Asset(asset.id.clone());
              self.add_target(Group::Markers, Self::marker(state, asset), target);
            } else if self.spread == Some(cluster.bounds) {
              let members: Vec<&Asset> = cluster.members.iter().map(|i| assets[*i]).collect();
              self.draw_spread(state, cluster.center, &members);
            } else {
              let badge = Primitive::ClusterBadge {
                coord: cluster.center,
                count: cluster.members.len(),
                bounds: cluster.bounds,
              };
              self.add_target(Group::Markers, badge, ClickTarget::Cluster(cluster.bounds));
            }
          }
          return;
        }
        Err(e) => warn!("clustering failed, drawing plain markers: {e}"),
      }
    }

    for asset in assets {
      let target = ClickTarget::Asset(asset.id.clone());
      self.add_target(Group::Markers, Self::marker(state, asset), target);
    }
  }

  /// Places the members of a cluster on a circle around its centre, each joined to it by a leg.
  #[allow(clippy::cast_precision_loss)]
  fn draw_spread(&mut self, state: &MapState, center: WGS84Coordinate, members: &[&Asset]) {
    let viewport = self.renderer.viewport();
    let origin = viewport.to_screen(center);
    let count = members.len() as f32;
    let radius = (MarkerStyle::SIZE * count / TAU).max(MarkerStyle::SIZE);
    for (i, asset) in members.iter().enumerate() {
      let angle = TAU * i as f32 / count;
      let coord = viewport.from_screen(PixelPosition {
        x: origin.x + radius * angle.cos(),
        y: origin.y + radius * angle.sin(),
      });
      self.add(
        Group::Markers,
        Primitive::Polyline {
          coords: vec![center, coord],
          color: with_opacity(SPREAD_LEG_COLOR, 0.6),
          width: 1.5,
          dashed: false,
        },
      );
      let marker = Primitive::Marker {
        coord,
        style: asset.marker_style(state.is_selected(asset)),
        popup: asset.popup(),
      };
      self.add_target(Group::Markers, marker, ClickTarget::Asset(asset.id.clone()));
    }
  }

  fn draw_overlays(&mut self, state: &MapState) {
    self.clear(Group::Overlays);
    let Some(center) = state.site_center() else {
      return;
    };
    if state.registry.overlay_enabled(overlay_id::SETTLEMENT) {
      for (radius_m, color) in SETTLEMENT_RINGS {
        self.add(
          Group::Overlays,
          Primitive::Circle {
            center,
            radius_m,
            stroke: color,
            fill: with_opacity(color, 0.05),
            dashed: true,
          },
        );
      }
    }
    if state.registry.overlay_enabled(overlay_id::SOIL) {
      for (d_lat, d_lng) in SOIL_OFFSETS {
        self.add(
          Group::Overlays,
          Primitive::CircleMarker {
            coord: center.offset(d_lat, d_lng),
            radius_px: 12.,
            stroke: Color32::WHITE,
            fill: SOIL_COLOR,
            popup: Some(Popup::new("Soil Sample")),
          },
        );
      }
    }
  }

  #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
  fn draw_grid(&mut self, state: &MapState) {
    self.clear(Group::Grid);
    if !state.grid_enabled() {
      return;
    }
    let bounds = self.renderer.viewport().bounds();
    if !bounds.is_valid() {
      return;
    }
    let first_lng = (bounds.west / GRID_STEP_DEG).floor() as i64;
    let last_lng = (bounds.east / GRID_STEP_DEG).floor() as i64;
    let first_lat = (bounds.south / GRID_STEP_DEG).floor() as i64;
    let last_lat = (bounds.north / GRID_STEP_DEG).floor() as i64;
    if last_lng - first_lng > MAX_GRID_LINES || last_lat - first_lat > MAX_GRID_LINES {
      debug!("survey grid too dense at zoom {}", self.renderer.viewport().zoom);
      return;
    }

    let line = |coords| Primitive::Polyline {
      coords,
      color: with_opacity(GRID_COLOR, 0.3),
      width: 1.,
      dashed: true,
    };
    for i in first_lng..=last_lng {
      let lng = i as f64 * GRID_STEP_DEG;
      self.add(
        Group::Grid,
        line(vec![
          WGS84Coordinate::new(bounds.south, lng),
          WGS84Coordinate::new(bounds.north, lng),
        ]),
      );
    }
    for i in first_lat..=last_lat {
      let lat = i as f64 * GRID_STEP_DEG;
      self.add(
        Group::Grid,
        line(vec![
          WGS84Coordinate::new(lat, bounds.west),
          WGS84Coordinate::new(lat, bounds.east),
        ]),
      );
    }
  }

  fn layer_style(layer: &ShapefileLayer) -> Style {
    Style::default()
      .with_color(with_opacity(layer.color, layer.opacity()))
      .with_fill_color(with_opacity(layer.color, layer.opacity() * 0.5))
  }

  fn draw_shapefiles(&mut self, state: &MapState) {
    self.clear(Group::Shapefiles);
    for layer in state.registry.visible_shapefiles() {
      if !layer.has_data() {
        continue;
      }
      let geometries = match GeoJsonParser::new(&layer.name).parse(&layer.geo_json) {
        Ok(geometries) => geometries,
        Err(e) => {
          warn!("skipping shapefile layer {} ({}): {e}", layer.name, layer.id);
          continue;
        }
      };
      let style = Self::layer_style(layer);
      for geometry in &geometries {
        for leaf in geometry.flat_iterate_with_merged_style(&style) {
          self.add(
            Group::Shapefiles,
            Primitive::Shape {
              geometry: leaf,
              point_radius_px: SHAPE_POINT_RADIUS,
            },
          );
        }
      }
    }
  }

  fn vertex(coord: WGS84Coordinate, radius_px: f32, stroke: Color32, popup: Popup) -> Primitive {
    Primitive::CircleMarker {
      coord,
      radius_px,
      stroke,
      fill: Color32::WHITE,
      popup: Some(popup),
    }
  }

  fn draw_measurement(&mut self, state: &MapState) {
    self.clear(Group::Measurement);
    let session = &state.tools.measurement;
    let points = session.points();
    match session.mode() {
      MeasurementMode::Distance if points.len() >= 2 => {
        self.add(
          Group::Measurement,
          Primitive::Polyline {
            coords: points.to_vec(),
            color: with_opacity(MEASURE_COLOR, 0.7),
            width: 3.,
            dashed: true,
          },
        );
      }
      MeasurementMode::Area if points.len() >= 3 => {
        self.add(
          Group::Measurement,
          Primitive::Polygon {
            coords: points.to_vec(),
            stroke: MEASURE_COLOR,
            fill: with_opacity(MEASURE_COLOR, 0.2),
            dashed: false,
          },
        );
      }
      MeasurementMode::Distance | MeasurementMode::Area => {}
    }
    for (i, point) in points.iter().enumerate() {
      let popup = Popup::new(format!("Point {}", i + 1));
      self.add(
        Group::Measurement,
        Self::vertex(*point, 6., MEASURE_COLOR, popup),
      );
    }
  }

  fn draw_probe(&mut self, state: &MapState) {
    self.clear(Group::Probe);
    let probe = &state.tools.probe;
    let (Some(coord), Some(readout)) = (probe.coordinate(), probe.readout()) else {
      return;
    };
    let popup = readout
      .into_iter()
      .fold(Popup::new("Coordinates"), Popup::with_line);
    self.add(
      Group::Probe,
      Primitive::CircleMarker {
        coord,
        radius_px: 6.,
        stroke: Color32::WHITE,
        fill: PROBE_COLOR,
        popup: Some(popup),
      },
    );
  }

  fn draw_cross_section(&mut self, state: &MapState) {
    self.clear(Group::CrossSection);
    let section = &state.tools.cross_section;
    match (section.points(), section.line()) {
      ([start], _) => {
        let popup = Popup::new("Cross-section Start - Click another point");
        self.add(
          Group::CrossSection,
          Self::vertex(*start, 8., SECTION_COLOR, popup),
        );
      }
      (_, Some((start, end, length_m))) => {
        self.add(
          Group::CrossSection,
          Primitive::Polyline {
            coords: vec![start, end],
            color: with_opacity(SECTION_COLOR, 0.8),
            width: 4.,
            dashed: false,
          },
        );
        self.add(
          Group::CrossSection,
          Self::vertex(start, 8., SECTION_COLOR, Popup::new("Cross-section Start")),
        );
        self.add(
          Group::CrossSection,
          Self::vertex(end, 8., SECTION_COLOR, Popup::new("Cross-section End")),
        );
        if let Some(mid) = section.midpoint() {
          self.add(
            Group::CrossSection,
            Primitive::Label {
              coord: mid,
              text: format_km(length_m),
            },
          );
        }
      }
      _ => {}
    }
  }

  fn draw_heatmap(&mut self, state: &MapState) {
    self.clear(Group::Heatmap);
    let Some(HeatmapView {
      category,
      center,
      rings,
      samples,
    }) = &state.tools.heatmap
    else {
      return;
    };
    for ring in rings {
      self.add(
        Group::Heatmap,
        Primitive::Circle {
          center: *center,
          radius_m: ring.radius_m,
          stroke: with_opacity(ring.color, ring.stroke_opacity),
          fill: with_opacity(ring.color, ring.fill_opacity),
          dashed: false,
        },
      );
    }
    for sample in samples {
      self.add(
        Group::Heatmap,
        Primitive::CircleMarker {
          coord: sample.coord,
          radius_px: 5.,
          stroke: sample.color,
          fill: with_opacity(sample.color, 0.6),
          popup: Some(sample.popup(*category)),
        },
      );
    }
  }
}

impl<R: Renderer> Drop for MapCanvas<R> {
  fn drop(&mut self) {
    self.unmount();
  }
}
