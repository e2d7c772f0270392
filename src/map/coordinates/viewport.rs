use serde::{Deserialize, Serialize};

use super::{GeoBounds, PixelCoordinate, PixelPosition, WGS84Coordinate};
use crate::map::spatial::EARTH_RADIUS_M;

pub const MIN_ZOOM: f64 = 1.;
pub const MAX_ZOOM: f64 = 19.;

/// The visible part of the map: a centre, a Web Mercator zoom level and the size of the canvas in
/// screen pixels. Screen positions are relative to the top left corner of the canvas.
#[derive(Debug, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct Viewport {
  pub center: WGS84Coordinate,
  pub zoom: f64,
  pub width: f32,
  pub height: f32,
}

impl Default for Viewport {
  fn default() -> Self {
    Self {
      center: WGS84Coordinate::new(0., 0.),
      zoom: MIN_ZOOM,
      width: 800.,
      height: 600.,
    }
  }
}

impl Viewport {
  #[must_use]
  pub fn new(center: WGS84Coordinate, zoom: f64) -> Self {
    Self {
      center,
      zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
      ..Self::default()
    }
  }

  #[must_use]
  pub fn with_size(mut self, width: f32, height: f32) -> Self {
    self.width = width;
    self.height = height;
    self
  }

  fn half_size(&self) -> PixelCoordinate {
    PixelCoordinate::new(f64::from(self.width) / 2., f64::from(self.height) / 2.)
  }

  /// Converts a coordinate to a position on the canvas.
  #[must_use]
  #[allow(clippy::cast_possible_truncation)]
  pub fn to_screen(&self, coord: WGS84Coordinate) -> PixelPosition {
    let p = PixelCoordinate::project(coord, self.zoom)
      - PixelCoordinate::project(self.center, self.zoom)
      + self.half_size();
    PixelPosition {
      x: p.x as f32,
      y: p.y as f32,
    }
  }

  /// Converts a point, e.g. from a click, to a coordinate.
  #[must_use]
  pub fn from_screen(&self, pos: PixelPosition) -> WGS84Coordinate {
    let p = PixelCoordinate::new(f64::from(pos.x), f64::from(pos.y)) - self.half_size()
      + PixelCoordinate::project(self.center, self.zoom);
    p.unproject(self.zoom)
  }

  #[must_use]
  pub fn bounds(&self) -> GeoBounds {
    let nw = self.from_screen(PixelPosition { x: 0., y: 0. });
    let se = self.from_screen(PixelPosition {
      x: self.width,
      y: self.height,
    });
    GeoBounds::from_iterator([nw, se])
  }

  /// Moves the map content by `delta` screen pixels.
  pub fn pan(&mut self, delta: PixelPosition) {
    let center = PixelCoordinate::project(self.center, self.zoom)
      - PixelCoordinate::new(f64::from(delta.x), f64::from(delta.y));
    self.center = center.unproject(self.zoom);
  }

  /// Zooms by `levels` while keeping the coordinate under `anchor` in place.
  pub fn zoom_around(&mut self, levels: f64, anchor: PixelPosition) {
    let new_zoom = (self.zoom + levels).clamp(MIN_ZOOM, MAX_ZOOM);
    if (new_zoom - self.zoom).abs() < f64::EPSILON {
      return;
    }
    let anchored = self.from_screen(anchor);
    self.zoom = new_zoom;
    let drift = self.to_screen(anchored);
    self.pan(PixelPosition {
      x: anchor.x - drift.x,
      y: anchor.y - drift.y,
    });
  }

  /// Ground distance covered by one screen pixel at latitude `lat`.
  #[must_use]
  pub fn meters_per_pixel(&self, lat: f64) -> f64 {
    let equator = 2. * std::f64::consts::PI * EARTH_RADIUS_M;
    equator * lat.to_radians().cos() / PixelCoordinate::world_size(self.zoom)
  }

  /// Centres on `center` and zooms in to at least `min_zoom`.
  pub fn focus(&mut self, center: WGS84Coordinate, min_zoom: f64) {
    self.center = center;
    self.zoom = self.zoom.max(min_zoom).clamp(MIN_ZOOM, MAX_ZOOM);
  }

  /// Shows a given bounding box on the map.
  pub fn fit(&mut self, bb: &GeoBounds) {
    if !bb.is_valid() {
      return;
    }
    self.center = bb.center();
    let nw = PixelCoordinate::project(WGS84Coordinate::new(bb.north, bb.west), 0.);
    let se = PixelCoordinate::project(WGS84Coordinate::new(bb.south, bb.east), 0.);
    let w = (se.x - nw.x).abs().max(f64::EPSILON);
    let h = (se.y - nw.y).abs().max(f64::EPSILON);
    let zoom_w = (f64::from(self.width) * 0.95 / w).log2();
    let zoom_h = (f64::from(self.height) * 0.95 / h).log2();
    self.zoom = zoom_w.min(zoom_h).clamp(MIN_ZOOM, MAX_ZOOM);
  }
}
