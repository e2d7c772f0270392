use std::{collections::BTreeSet, time::Duration};

use assert_approx_eq::assert_approx_eq;
use chrono::NaiveDate;
use rstest::rstest;
use serde_json::json;
use sitecanvas::{
  MapEvent,
  map::{
    asset::AssetId,
    canvas::MapCanvas,
    cluster::Unavailable,
    coordinates::{PixelPosition, WGS84Coordinate},
    layers::{BaseLayer, overlay_id},
    renderer::{Primitive, PrimitiveHandle, Renderer, Scene},
    store::{Action, MapStore},
    timeline::{FixedClock, Timeline},
    tools::{FixedSource, ToolMode},
  },
  project::SiteProject,
};

fn demo_store() -> MapStore {
  SiteProject::demo()
    .unwrap()
    .into_store()
    .with_sample_source(Box::new(FixedSource::new([0.1, 0.5, 0.9])))
}

fn mounted(store: &MapStore) -> MapCanvas<Scene> {
  let mut canvas = MapCanvas::new(Scene::default());
  canvas.mount(store);
  canvas
}

fn marker_handles(scene: &Scene) -> Vec<PrimitiveHandle> {
  scene
    .primitives()
    .filter(|(_, p)| matches!(p, Primitive::Marker { .. }))
    .map(|(h, _)| h)
    .collect()
}

fn marker_ids<R: Renderer>(canvas: &MapCanvas<R>, handles: &[PrimitiveHandle]) -> BTreeSet<String> {
  handles
    .iter()
    .filter_map(|h| canvas.asset_at(*h))
    .map(|id| id.as_str().to_string())
    .collect()
}

fn shapes(scene: &Scene) -> usize {
  scene.count(|p| matches!(p, Primitive::Shape { .. }))
}

#[test]
fn demo_site_renders_markers_and_shapefiles() {
  let store = demo_store();
  let canvas = mounted(&store);
  let scene = canvas.renderer();

  let handles = marker_handles(scene);
  assert_eq!(
    marker_ids(&canvas, &handles),
    BTreeSet::from(["bh-001", "bh-002", "inf-001", "mon-001"].map(String::from))
  );
  // one polygon, two lines and two points
  assert_eq!(shapes(scene), 5);
  assert_eq!(scene.count(|p| matches!(p, Primitive::TileLayer { .. })), 1);
}

#[test]
fn boreholes_overlay_hides_exactly_the_boreholes() {
  let mut store = demo_store();
  let mut canvas = mounted(&store);
  let before = marker_handles(canvas.renderer());

  store.dispatch(Action::ToggleOverlay(overlay_id::BOREHOLES.to_string()));
  canvas.sync(&store);

  let after = marker_handles(canvas.renderer());
  assert_eq!(
    marker_ids(&canvas, &after),
    BTreeSet::from(["inf-001", "mon-001"].map(String::from))
  );
  // old markers are gone, not hidden
  assert!(before.iter().all(|h| canvas.renderer().get(*h).is_none()));

  store.dispatch(Action::ToggleOverlay(overlay_id::BOREHOLES.to_string()));
  canvas.sync(&store);
  assert_eq!(marker_handles(canvas.renderer()).len(), 4);
}

#[test]
fn dropping_the_canvas_leaves_an_empty_scene() {
  let store = demo_store();
  let mut scene = Scene::default();
  {
    let mut canvas = MapCanvas::new(&mut scene);
    canvas.mount(&store);
    assert!(canvas.is_mounted());
  }
  assert!(scene.is_empty());
}

#[test]
fn unmount_then_mount_draws_everything_once() {
  let store = demo_store();
  let mut canvas = mounted(&store);
  let drawn = canvas.renderer().len();

  canvas.unmount();
  assert!(canvas.renderer().is_empty());
  assert!(!canvas.sync(&store));

  canvas.mount(&store);
  assert_eq!(canvas.renderer().len(), drawn);
}

#[test]
fn bad_shapefile_layer_is_skipped() {
  let mut project = SiteProject::demo().unwrap();
  project.shapefile_layers[1].geo_json = json!({
    "type": "FeatureCollection",
    "features": [
      { "type": "Feature", "geometry": { "type": "Circle", "coordinates": [-0.175, 51.515] } }
    ]
  });
  let store = project.into_store();
  let canvas = mounted(&store);

  // the polygon and the two sample points still render
  assert_eq!(shapes(canvas.renderer()), 3);
  assert_eq!(marker_handles(canvas.renderer()).len(), 4);
}

#[test]
fn shapefile_master_switch() {
  let mut store = demo_store();
  let mut canvas = mounted(&store);

  store.dispatch(Action::SetShapefilesEnabled(false));
  canvas.sync(&store);
  assert_eq!(shapes(canvas.renderer()), 0);

  store.dispatch(Action::ToggleShapefile("shp-002".to_string()));
  store.dispatch(Action::SetShapefilesEnabled(true));
  canvas.sync(&store);
  assert_eq!(shapes(canvas.renderer()), 3);
}

#[rstest]
#[case(vec![BaseLayer::Satellite], BaseLayer::Satellite)]
#[case(vec![BaseLayer::Terrain, BaseLayer::Topo], BaseLayer::Topo)]
#[case(vec![BaseLayer::Topo, BaseLayer::Topo, BaseLayer::Street], BaseLayer::Street)]
fn single_base_tile_after_switching(#[case] switches: Vec<BaseLayer>, #[case] expected: BaseLayer) {
  let mut store = demo_store();
  let mut canvas = mounted(&store);
  for base_layer in switches {
    store.dispatch(Action::SetBaseLayer(base_layer));
    canvas.sync(&store);
  }
  let tiles: Vec<BaseLayer> = canvas
    .renderer()
    .primitives()
    .filter_map(|(_, p)| match p {
      Primitive::TileLayer { base_layer, .. } => Some(*base_layer),
      _ => None,
    })
    .collect();
  assert_eq!(tiles, vec![expected]);
}

#[test]
fn marker_click_reports_the_asset_once() {
  let mut store = demo_store();
  let mut canvas = mounted(&store);
  let handle = marker_handles(canvas.renderer())
    .into_iter()
    .find(|h| canvas.asset_at(*h).is_some_and(|id| id.as_str() == "mon-001"))
    .unwrap();

  let events = canvas.click_marker(handle, &mut store);
  assert_eq!(events, vec![MapEvent::AssetClicked(AssetId::new("mon-001"))]);
  assert_eq!(
    store.state().selected_asset().map(|a| a.name.as_str()),
    Some("INC-PAD-001")
  );
  // the marker was redrawn, its old handle is no longer a target
  assert!(canvas.click_marker(handle, &mut store).is_empty());
}

#[test]
fn cross_section_from_screen_clicks() {
  let mut store = demo_store();
  let mut canvas = mounted(&store);
  store.dispatch(Action::SetTool(ToolMode::CrossSection));
  canvas.sync(&store);

  assert!(
    canvas
      .click(PixelPosition { x: 10., y: 10. }, &mut store)
      .is_empty()
  );
  let events = canvas.click(PixelPosition { x: 790., y: 590. }, &mut store);
  let [MapEvent::CrossSectionReady { start, end, length_m }] = events.as_slice() else {
    panic!("expected a cross-section event, got {events:?}");
  };
  assert!(end.lng > start.lng);
  assert!(*length_m > 1000.);
  assert_eq!(
    canvas
      .renderer()
      .count(|p| matches!(p, Primitive::Polyline { .. })),
    1
  );
  assert_eq!(store.state().section_boreholes().len(), 2);

  // a third click starts over
  canvas.click(PixelPosition { x: 400., y: 10. }, &mut store);
  assert_eq!(store.state().tools.cross_section.points().len(), 1);
  assert_eq!(
    canvas
      .renderer()
      .count(|p| matches!(p, Primitive::Polyline { .. })),
    0
  );
}

#[test]
fn measurement_of_three_points() {
  let mut store = demo_store();
  let mut canvas = mounted(&store);
  store.dispatch(Action::SetTool(ToolMode::Measurement));
  let a = WGS84Coordinate::new(51.5154, -0.1755);
  let b = WGS84Coordinate::new(51.5164, -0.1765);
  let c = WGS84Coordinate::new(51.5158, -0.1750);
  for point in [a, b, c] {
    store.dispatch(Action::MapClick(point));
  }
  canvas.sync(&store);

  let legs = sitecanvas::map::spatial::haversine_distance(a, b)
    + sitecanvas::map::spatial::haversine_distance(b, c);
  match store.state().tools.measurement.result() {
    Some(sitecanvas::map::tools::MeasurementResult::Distance(d)) => assert_approx_eq!(d, legs, 1e-6),
    other => panic!("unexpected result {other:?}"),
  }
  // the path and one numbered vertex per point
  assert_eq!(
    canvas
      .renderer()
      .count(|p| matches!(p, Primitive::Polyline { .. })),
    1
  );
  assert_eq!(
    canvas
      .renderer()
      .count(|p| matches!(p, Primitive::CircleMarker { .. })),
    3
  );

  store.dispatch(Action::SetTool(ToolMode::Coordinates));
  canvas.sync(&store);
  assert_eq!(
    canvas
      .renderer()
      .count(|p| matches!(p, Primitive::Polyline { .. })),
    0
  );
}

#[test]
fn clustering_below_threshold_and_without_clusterer() {
  let store = demo_store().with_clustering(true);
  let canvas = mounted(&store);
  assert_eq!(marker_handles(canvas.renderer()).len(), 4);

  let mut fallback = MapCanvas::new(Scene::default()).with_clusterer(Box::new(Unavailable));
  fallback.mount(&store);
  assert_eq!(marker_handles(fallback.renderer()).len(), 4);
  assert_eq!(
    fallback
      .renderer()
      .count(|p| matches!(p, Primitive::ClusterBadge { .. })),
    0
  );
}

#[test]
fn time_series_steps_and_wraps() {
  let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
  let mut store = demo_store().with_timeline(Timeline::new(
    date(2024, 1, 1),
    Duration::from_secs(1),
    Box::new(FixedClock(date(2024, 3, 15))),
  ));
  let mut canvas = mounted(&store);
  let markers = |c: &MapCanvas<Scene>| marker_handles(c.renderer()).len();

  store.dispatch(Action::SetTimeSeries(true));
  canvas.sync(&store);
  assert_eq!(markers(&canvas), 1);

  store.dispatch(Action::StepForward);
  store.dispatch(Action::StepForward);
  canvas.sync(&store);
  assert_eq!(store.state().timeline.label(), "March 2024");
  assert_eq!(markers(&canvas), 4);

  // April is after today
  store.dispatch(Action::StepForward);
  canvas.sync(&store);
  assert_eq!(store.state().timeline.date(), date(2024, 1, 1));
  assert_eq!(markers(&canvas), 1);

  store.dispatch(Action::PlayPause);
  store.dispatch(Action::Tick(Duration::from_millis(1500)));
  assert_eq!(store.state().timeline.date(), date(2024, 2, 1));

  store.dispatch(Action::SetTimeSeries(false));
  canvas.sync(&store);
  assert!(!store.state().timeline.is_playing());
  assert_eq!(markers(&canvas), 4);
}

#[test]
fn heatmap_is_centred_on_the_site() {
  let mut store = demo_store();
  let mut canvas = mounted(&store);
  store.dispatch(Action::SetTool(ToolMode::Heatmap));
  canvas.sync(&store);

  let heatmap = store.state().tools.heatmap.as_ref().unwrap();
  let center = store.state().site_center().unwrap();
  assert_approx_eq!(heatmap.center.lat, center.lat, 1e-12);
  assert_eq!(heatmap.rings.len(), 3);
  assert_eq!(heatmap.samples.len(), 4);

  store.dispatch(Action::SetTool(ToolMode::Heatmap));
  canvas.sync(&store);
  assert!(store.state().tools.heatmap.is_none());
  assert_eq!(
    canvas
      .renderer()
      .count(|p| matches!(p, Primitive::Circle { .. })),
    0
  );
}

fn badge_position(canvas: &MapCanvas<Scene>) -> Option<PixelPosition> {
  canvas.renderer().primitives().find_map(|(_, p)| match p {
    Primitive::ClusterBadge { coord, .. } => Some(canvas.viewport().to_screen(*coord)),
    _ => None,
  })
}

fn marker_position(canvas: &MapCanvas<Scene>, id: &str) -> Option<PixelPosition> {
  canvas.renderer().primitives().find_map(|(h, p)| match p {
    Primitive::Marker { coord, .. } if canvas.asset_at(h).is_some_and(|a| a.as_str() == id) => {
      Some(canvas.viewport().to_screen(*coord))
    }
    _ => None,
  })
}

#[test]
fn clustered_leaf_markers_report_their_asset_once() {
  let mut project = SiteProject::demo().unwrap();
  for id in ["bh-101", "bh-102"] {
    let mut twin = project.assets[0].clone();
    twin.id = AssetId::new(id);
    twin.name = id.to_uppercase();
    project.assets.push(twin);
  }
  let mut store = project.into_store().with_clustering(true);
  let mut canvas = mounted(&store);
  assert!(marker_handles(canvas.renderer()).is_empty());

  // the first badge click separates the site, the twins of bh-001 stay together
  let badge = badge_position(&canvas).unwrap();
  assert!(canvas.click(badge, &mut store).is_empty());
  assert!(badge_position(&canvas).is_some());
  let events = canvas.click(marker_position(&canvas, "mon-001").unwrap(), &mut store);
  assert_eq!(events, vec![MapEvent::AssetClicked(AssetId::new("mon-001"))]);

  // at the closest zoom the remaining cluster spreads into its members
  for _ in 0..3 {
    let Some(badge) = badge_position(&canvas) else {
      break;
    };
    assert!(canvas.click(badge, &mut store).is_empty());
  }
  assert!(badge_position(&canvas).is_none());
  let events = canvas.click(marker_position(&canvas, "bh-102").unwrap(), &mut store);
  assert_eq!(events, vec![MapEvent::AssetClicked(AssetId::new("bh-102"))]);
  assert_eq!(
    store.state().selected_asset().map(|a| a.name.as_str()),
    Some("BH-102")
  );
}
