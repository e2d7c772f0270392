use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;

use super::{
  coordinates::{GeoBounds, PixelCoordinate, WGS84Coordinate},
  spatial::centroid,
};

#[derive(Error, Debug, PartialEq)]
pub enum ClusterError {
  #[error("marker clustering is not available")]
  Unavailable,
  #[error("invalid cluster radius: {0}")]
  InvalidRadius(f64),
}

/// A group of points drawn as one badge. `members` index into the clustered input.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
  pub members: Vec<usize>,
  pub center: WGS84Coordinate,
  pub bounds: GeoBounds,
}

impl Cluster {
  #[must_use]
  pub fn is_single(&self) -> bool {
    self.members.len() == 1
  }
}

/// Groups points that are close to each other at a zoom level.
pub trait Clusterer {
  /// Every input index ends up in exactly one cluster.
  fn cluster(&self, points: &[WGS84Coordinate], zoom: f64) -> Result<Vec<Cluster>, ClusterError>;
}

#[derive(Clone, Copy)]
struct ClusterItem {
  index: usize,
  position: [f64; 2],
}

impl RTreeObject for ClusterItem {
  type Envelope = AABB<[f64; 2]>;
  fn envelope(&self) -> Self::Envelope {
    AABB::from_point(self.position)
  }
}

/// Greedy grouping: in input order, every point not yet taken starts a cluster and takes all free
/// points within `radius_px` screen pixels of it.
#[derive(Debug, Clone, Copy)]
pub struct RadiusClusterer {
  radius_px: f64,
}

impl RadiusClusterer {
  #[must_use]
  pub fn new(radius_px: f64) -> Self {
    Self { radius_px }
  }
}

impl Default for RadiusClusterer {
  fn default() -> Self {
    Self::new(50.)
  }
}

impl Clusterer for RadiusClusterer {
  fn cluster(&self, points: &[WGS84Coordinate], zoom: f64) -> Result<Vec<Cluster>, ClusterError> {
    if !self.radius_px.is_finite() || self.radius_px < 0. {
      return Err(ClusterError::InvalidRadius(self.radius_px));
    }
    let items: Vec<ClusterItem> = points
      .iter()
      .enumerate()
      .map(|(index, coord)| {
        let p = PixelCoordinate::project(*coord, zoom);
        ClusterItem {
          index,
          position: [p.x, p.y],
        }
      })
      .collect();
    let tree = RTree::bulk_load(items.clone());

    let r = self.radius_px;
    let mut taken = vec![false; points.len()];
    let mut clusters = Vec::new();
    for item in &items {
      if taken[item.index] {
        continue;
      }
      let [x, y] = item.position;
      let envelope = AABB::from_corners([x - r, y - r], [x + r, y + r]);
      let mut members: Vec<usize> = tree
        .locate_in_envelope_intersecting(&envelope)
        .filter(|other| {
          let (dx, dy) = (other.position[0] - x, other.position[1] - y);
          !taken[other.index] && dx * dx + dy * dy <= r * r
        })
        .map(|other| other.index)
        .collect();
      members.sort_unstable();
      for member in &members {
        taken[*member] = true;
      }
      let coords = members.iter().map(|m| points[*m]);
      clusters.push(Cluster {
        center: centroid(coords.clone()).unwrap_or(points[item.index]),
        bounds: GeoBounds::from_iterator(coords),
        members,
      });
    }
    Ok(clusters)
  }
}

/// Stands in when no clustering implementation could be set up.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl Clusterer for Unavailable {
  fn cluster(&self, _: &[WGS84Coordinate], _: f64) -> Result<Vec<Cluster>, ClusterError> {
    Err(ClusterError::Unavailable)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn c(lat: f64, lng: f64) -> WGS84Coordinate {
    WGS84Coordinate::new(lat, lng)
  }

  fn paddington() -> Vec<WGS84Coordinate> {
    vec![
      c(51.5154, -0.1755),
      c(51.5164, -0.1765),
      c(51.5158, -0.1750),
      c(51.5160, -0.1760),
      c(51.4750, -0.1540),
      c(51.4755, -0.1545),
    ]
  }

  #[test]
  fn every_point_in_one_cluster() {
    let points = paddington();
    let clusters = RadiusClusterer::default().cluster(&points, 13.).unwrap();
    let mut members: Vec<usize> = clusters.iter().flat_map(|c| c.members.clone()).collect();
    members.sort_unstable();
    assert_eq!(members, (0..points.len()).collect::<Vec<_>>());
  }

  #[test]
  fn zoom_splits_clusters() {
    let points = paddington();
    let clusterer = RadiusClusterer::default();
    let far = clusterer.cluster(&points, 9.).unwrap();
    assert_eq!(far.len(), 1);
    assert_eq!(far[0].members.len(), 6);

    let city = clusterer.cluster(&points, 13.).unwrap();
    assert_eq!(city.len(), 2);
    assert_eq!(city[0].members, vec![0, 1, 2, 3]);
    assert!(city[0].bounds.contains(points[1]));

    let street = clusterer.cluster(&points, 19.).unwrap();
    assert!(street.iter().all(Cluster::is_single));
  }

  #[test]
  fn unavailable_and_invalid() {
    assert_eq!(
      Unavailable.cluster(&paddington(), 13.),
      Err(ClusterError::Unavailable)
    );
    assert!(matches!(
      RadiusClusterer::new(f64::NAN).cluster(&paddington(), 13.),
      Err(ClusterError::InvalidRadius(_))
    ));
  }
}
