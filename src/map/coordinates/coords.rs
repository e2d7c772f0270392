use std::ops::{Add, AddAssign, Mul, Sub};

use serde::{Deserialize, Serialize};

/// Edge length of a Web Mercator tile in pixels.
pub const TILE_SIZE: f64 = 256.;

const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// The standard WGS84 coordinate system.
#[derive(Debug, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct WGS84Coordinate {
  #[serde(alias = "latitude")]
  pub lat: f64,
  #[serde(alias = "longitude", alias = "lon")]
  pub lng: f64,
}

impl WGS84Coordinate {
  #[must_use]
  pub fn new(lat: f64, lng: f64) -> Self {
    Self { lat, lng }
  }

  #[must_use]
  pub fn is_valid(&self) -> bool {
    (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
  }

  #[must_use]
  pub fn offset(&self, d_lat: f64, d_lng: f64) -> Self {
    Self {
      lat: self.lat + d_lat,
      lng: self.lng + d_lng,
    }
  }

  /// Exact equality comparison using bit representation
  #[must_use]
  pub fn exact_eq(&self, other: &Self) -> bool {
    self.lat.to_bits() == other.lat.to_bits() && self.lng.to_bits() == other.lng.to_bits()
  }
}

/// A position in the Web Mercator world plane at a given zoom level, measured in pixels from the
/// north-west corner of the world.
#[derive(Debug, Default, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct PixelCoordinate {
  pub x: f64,
  pub y: f64,
}

impl PixelCoordinate {
  #[must_use]
  pub fn new(x: f64, y: f64) -> Self {
    Self { x, y }
  }

  /// Size of the world in pixels at `zoom`.
  #[must_use]
  pub fn world_size(zoom: f64) -> f64 {
    TILE_SIZE * 2f64.powf(zoom)
  }

  /// Projects a coordinate into the world plane. Latitudes are clamped to the Mercator limit.
  #[must_use]
  pub fn project(coord: WGS84Coordinate, zoom: f64) -> Self {
    let size = Self::world_size(zoom);
    let lat = coord.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let x = (coord.lng + 180.) / 360. * size;
    let y = (1. - (lat.tan() + 1. / lat.cos()).ln() / std::f64::consts::PI) / 2. * size;
    Self { x, y }
  }

  /// Inverse of [`PixelCoordinate::project`].
  #[must_use]
  pub fn unproject(&self, zoom: f64) -> WGS84Coordinate {
    let size = Self::world_size(zoom);
    let lng = self.x / size * 360. - 180.;
    let n = std::f64::consts::PI * (1. - 2. * self.y / size);
    let lat = n.sinh().atan().to_degrees();
    WGS84Coordinate { lat, lng }
  }

  #[must_use]
  pub fn sq_dist(&self, p: &Self) -> f64 {
    let dx = p.x - self.x;
    let dy = p.y - self.y;
    dx * dx + dy * dy
  }
}

impl Add for PixelCoordinate {
  type Output = Self;

  fn add(self, rhs: Self) -> Self {
    Self {
      x: self.x + rhs.x,
      y: self.y + rhs.y,
    }
  }
}

impl Sub for PixelCoordinate {
  type Output = Self;

  fn sub(self, rhs: Self) -> Self {
    Self {
      x: self.x - rhs.x,
      y: self.y - rhs.y,
    }
  }
}

impl Mul<f64> for PixelCoordinate {
  type Output = Self;

  fn mul(self, rhs: f64) -> Self {
    Self {
      x: self.x * rhs,
      y: self.y * rhs,
    }
  }
}

/// Meant for actual pixel in the UI. Handled equivalently to a ``egui::Pos2``.
#[derive(Debug, Default, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct PixelPosition {
  pub x: f32,
  pub y: f32,
}

impl From<egui::Pos2> for PixelPosition {
  fn from(pos: egui::Pos2) -> Self {
    PixelPosition { x: pos.x, y: pos.y }
  }
}

impl From<PixelPosition> for egui::Pos2 {
  fn from(pp: PixelPosition) -> Self {
    egui::Pos2::new(pp.x, pp.y)
  }
}

impl Add<PixelPosition> for PixelPosition {
  type Output = Self;

  fn add(self, rhs: PixelPosition) -> Self {
    Self {
      x: self.x + rhs.x,
      y: self.y + rhs.y,
    }
  }
}

impl AddAssign for PixelPosition {
  fn add_assign(&mut self, other: Self) {
    self.x += other.x;
    self.y += other.y;
  }
}

/// An axis aligned box in WGS84.
#[derive(Debug, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct GeoBounds {
  pub south: f64,
  pub west: f64,
  pub north: f64,
  pub east: f64,
}

impl Default for GeoBounds {
  fn default() -> Self {
    Self::get_invalid()
  }
}

impl GeoBounds {
  #[must_use]
  pub fn get_invalid() -> Self {
    Self {
      south: f64::INFINITY,
      west: f64::INFINITY,
      north: f64::NEG_INFINITY,
      east: f64::NEG_INFINITY,
    }
  }

  #[must_use]
  pub fn is_valid(&self) -> bool {
    self.south <= self.north && self.west <= self.east
  }

  #[must_use]
  pub fn from_iterator(coords: impl IntoIterator<Item = WGS84Coordinate>) -> Self {
    coords
      .into_iter()
      .fold(Self::get_invalid(), |acc, c| acc.extend_with(c))
  }

  #[must_use]
  pub fn extend_with(mut self, coord: WGS84Coordinate) -> Self {
    self.south = self.south.min(coord.lat);
    self.north = self.north.max(coord.lat);
    self.west = self.west.min(coord.lng);
    self.east = self.east.max(coord.lng);
    self
  }

  #[must_use]
  pub fn center(&self) -> WGS84Coordinate {
    WGS84Coordinate::new(
      (self.south + self.north) / 2.,
      (self.west + self.east) / 2.,
    )
  }

  #[must_use]
  pub fn contains(&self, coord: WGS84Coordinate) -> bool {
    (self.south..=self.north).contains(&coord.lat) && (self.west..=self.east).contains(&coord.lng)
  }
}
