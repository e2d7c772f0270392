use std::collections::BTreeMap;

use egui::Color32;

use super::{
  asset::MarkerStyle,
  coordinates::{GeoBounds, PixelPosition, Viewport, WGS84Coordinate},
  geometry_collection::{GeoGeometry, Geometry, Popup},
  layers::BaseLayer,
};

/// Identifies a primitive added to a [`Renderer`]. Handles are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimitiveHandle(u64);

/// Everything the map draws.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
  TileLayer {
    base_layer: BaseLayer,
    url: String,
    attribution: String,
    max_zoom: u8,
  },
  Marker {
    coord: WGS84Coordinate,
    style: MarkerStyle,
    popup: Popup,
  },
  ClusterBadge {
    coord: WGS84Coordinate,
    count: usize,
    bounds: GeoBounds,
  },
  /// A circle with a radius in meters on the ground.
  Circle {
    center: WGS84Coordinate,
    radius_m: f64,
    stroke: Color32,
    fill: Color32,
    dashed: bool,
  },
  /// A circle with a radius in screen pixels.
  CircleMarker {
    coord: WGS84Coordinate,
    radius_px: f32,
    stroke: Color32,
    fill: Color32,
    popup: Option<Popup>,
  },
  Polyline {
    coords: Vec<WGS84Coordinate>,
    color: Color32,
    width: f32,
    dashed: bool,
  },
  Polygon {
    coords: Vec<WGS84Coordinate>,
    stroke: Color32,
    fill: Color32,
    dashed: bool,
  },
  Label {
    coord: WGS84Coordinate,
    text: String,
  },
  /// Styled feature geometry of a shapefile layer. Points are drawn as dots of `point_radius_px`.
  Shape {
    geometry: GeoGeometry,
    point_radius_px: f32,
  },
}

/// Radius in pixels of a cluster badge.
pub const CLUSTER_BADGE_RADIUS: f32 = 20.;
const LINE_HIT_TOLERANCE: f32 = 5.;

impl Primitive {
  #[must_use]
  pub fn popup(&self) -> Option<&Popup> {
    match self {
      Primitive::Marker { popup, .. } => Some(popup),
      Primitive::CircleMarker { popup, .. } => popup.as_ref(),
      Primitive::Shape { geometry, .. } => geometry.metadata().popup.as_ref(),
      _ => None,
    }
  }

  /// Whether a click at `pos` hits this primitive in `viewport`.
  #[must_use]
  pub fn hit(&self, viewport: &Viewport, pos: PixelPosition) -> bool {
    let near = |coord: WGS84Coordinate, radius: f32| {
      let p = viewport.to_screen(coord);
      (p.x - pos.x).hypot(p.y - pos.y) <= radius
    };
    match self {
      Primitive::Marker { coord, style, .. } => near(*coord, style.radius()),
      Primitive::ClusterBadge { coord, .. } => near(*coord, CLUSTER_BADGE_RADIUS),
      Primitive::CircleMarker {
        coord, radius_px, ..
      } => near(*coord, *radius_px),
      Primitive::Shape {
        geometry,
        point_radius_px,
      } => shape_hit(geometry, viewport, pos, *point_radius_px),
      _ => false,
    }
  }
}

fn shape_hit(
  geometry: &GeoGeometry,
  viewport: &Viewport,
  pos: PixelPosition,
  point_radius: f32,
) -> bool {
  let screen = |coords: &[WGS84Coordinate]| -> Vec<PixelPosition> {
    coords.iter().map(|c| viewport.to_screen(*c)).collect()
  };
  match geometry {
    Geometry::GeometryCollection(children, _) => children
      .iter()
      .any(|g| shape_hit(g, viewport, pos, point_radius)),
    Geometry::Point(coord, _) => {
      let p = viewport.to_screen(*coord);
      (p.x - pos.x).hypot(p.y - pos.y) <= point_radius
    }
    Geometry::LineString(coords, _) => screen(coords)
      .windows(2)
      .any(|s| segment_distance(pos, s[0], s[1]) <= LINE_HIT_TOLERANCE),
    Geometry::Polygon(coords, _) => ring_contains(&screen(coords), pos),
  }
}

fn segment_distance(p: PixelPosition, a: PixelPosition, b: PixelPosition) -> f32 {
  let (dx, dy) = (b.x - a.x, b.y - a.y);
  let len_sq = dx * dx + dy * dy;
  let t = if len_sq > 0. {
    (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0., 1.)
  } else {
    0.
  };
  (a.x + t * dx - p.x).hypot(a.y + t * dy - p.y)
}

/// Even-odd rule.
fn ring_contains(ring: &[PixelPosition], p: PixelPosition) -> bool {
  let mut inside = false;
  let mut j = ring.len().wrapping_sub(1);
  for (i, a) in ring.iter().enumerate() {
    let b = ring[j];
    if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
      inside = !inside;
    }
    j = i;
  }
  inside
}

/// The drawing surface the map canvas talks to. Implementations own the primitives and the view.
pub trait Renderer {
  fn add(&mut self, primitive: Primitive) -> PrimitiveHandle;
  /// Removes a primitive. Returns false for unknown or already removed handles.
  fn remove(&mut self, handle: PrimitiveHandle) -> bool;
  fn viewport(&self) -> Viewport;
  fn set_viewport(&mut self, viewport: Viewport);
}

impl<R: Renderer + ?Sized> Renderer for &mut R {
  fn add(&mut self, primitive: Primitive) -> PrimitiveHandle {
    (**self).add(primitive)
  }

  fn remove(&mut self, handle: PrimitiveHandle) -> bool {
    (**self).remove(handle)
  }

  fn viewport(&self) -> Viewport {
    (**self).viewport()
  }

  fn set_viewport(&mut self, viewport: Viewport) {
    (**self).set_viewport(viewport);
  }
}

/// A renderer that keeps its primitives in memory. The egui viewer paints it, tests inspect it.
#[derive(Debug, Default)]
pub struct Scene {
  primitives: BTreeMap<PrimitiveHandle, Primitive>,
  next_handle: u64,
  viewport: Viewport,
}

impl Scene {
  #[must_use]
  pub fn new(viewport: Viewport) -> Self {
    Self {
      viewport,
      ..Self::default()
    }
  }

  /// Primitives in the order they were added.
  pub fn primitives(&self) -> impl Iterator<Item = (PrimitiveHandle, &Primitive)> {
    self.primitives.iter().map(|(h, p)| (*h, p))
  }

  #[must_use]
  pub fn get(&self, handle: PrimitiveHandle) -> Option<&Primitive> {
    self.primitives.get(&handle)
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.primitives.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.primitives.is_empty()
  }

  /// Number of primitives matching `predicate`.
  pub fn count(&self, predicate: impl Fn(&Primitive) -> bool) -> usize {
    self.primitives.values().filter(|p| predicate(p)).count()
  }

  /// The topmost primitive under a screen position.
  #[must_use]
  pub fn hit_test(&self, pos: PixelPosition) -> Option<PrimitiveHandle> {
    self
      .primitives
      .iter()
      .rev()
      .find(|(_, p)| p.hit(&self.viewport, pos))
      .map(|(h, _)| *h)
  }

  pub fn viewport_mut(&mut self) -> &mut Viewport {
    &mut self.viewport
  }
}

impl Renderer for Scene {
  fn add(&mut self, primitive: Primitive) -> PrimitiveHandle {
    let handle = PrimitiveHandle(self.next_handle);
    self.next_handle += 1;
    self.primitives.insert(handle, primitive);
    handle
  }

  fn remove(&mut self, handle: PrimitiveHandle) -> bool {
    self.primitives.remove(&handle).is_some()
  }

  fn viewport(&self) -> Viewport {
    self.viewport
  }

  fn set_viewport(&mut self, viewport: Viewport) {
    self.viewport = viewport;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::map::{asset::AssetType, geometry_collection::Metadata};

  fn view() -> Viewport {
    Viewport::new(WGS84Coordinate::new(51.516, -0.176), 16.).with_size(800., 600.)
  }

  #[test]
  fn handles_are_unique() {
    let mut scene = Scene::new(view());
    let label = || Primitive::Label {
      coord: WGS84Coordinate::new(51.516, -0.176),
      text: "0.13 km".to_string(),
    };
    let a = scene.add(label());
    let b = scene.add(label());
    assert_ne!(a, b);
    assert!(scene.remove(a));
    assert!(!scene.remove(a));
    let c = scene.add(label());
    assert_ne!(a, c);
    assert_eq!(scene.len(), 2);
  }

  #[test]
  fn hit_test_finds_topmost_marker() {
    let mut scene = Scene::new(view());
    let coord = WGS84Coordinate::new(51.516, -0.176);
    scene.add(Primitive::Circle {
      center: coord,
      radius_m: 300.,
      stroke: Color32::RED,
      fill: Color32::TRANSPARENT,
      dashed: true,
    });
    let marker = scene.add(Primitive::Marker {
      coord,
      style: MarkerStyle::new(AssetType::Borehole, false),
      popup: Popup::new("BH-PAD-001"),
    });
    assert_eq!(scene.hit_test(PixelPosition { x: 405., y: 300. }), Some(marker));
    assert_eq!(scene.hit_test(PixelPosition { x: 500., y: 300. }), None);
  }

  #[test]
  fn shapes_are_hit() {
    let view = view();
    let ring = vec![
      WGS84Coordinate::new(51.5150, -0.1770),
      WGS84Coordinate::new(51.5150, -0.1740),
      WGS84Coordinate::new(51.5170, -0.1740),
      WGS84Coordinate::new(51.5170, -0.1770),
    ];
    let polygon = Primitive::Shape {
      geometry: Geometry::Polygon(ring.clone(), Metadata::default()),
      point_radius_px: 6.,
    };
    assert!(polygon.hit(&view, view.to_screen(WGS84Coordinate::new(51.516, -0.1755))));
    assert!(!polygon.hit(&view, view.to_screen(WGS84Coordinate::new(51.518, -0.1755))));

    let line = Primitive::Shape {
      geometry: Geometry::LineString(ring, Metadata::default()),
      point_radius_px: 6.,
    };
    assert!(line.hit(&view, view.to_screen(WGS84Coordinate::new(51.5150, -0.1755))));
    assert!(!line.hit(&view, view.to_screen(WGS84Coordinate::new(51.516, -0.1755))));
  }
}
