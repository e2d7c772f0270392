//! Lightweight spatial calculations on WGS84 coordinates.
//!
//! Everything here is a spherical approximation with the mean earth radius. NaN inputs give NaN
//! outputs; callers that take user input have to guard against that themselves.

use thiserror::Error;

use super::coordinates::WGS84Coordinate;

/// Mean earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SpatialError {
  #[error("at least {required} points are required, got {actual}")]
  TooFewPoints { required: usize, actual: usize },
}

/// Great circle distance in meters.
#[must_use]
pub fn haversine_distance(a: WGS84Coordinate, b: WGS84Coordinate) -> f64 {
  let d_lat = (b.lat - a.lat).to_radians();
  let d_lng = (b.lng - a.lng).to_radians();
  let h = (d_lat / 2.0).sin().powi(2)
    + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
  let c = 2.0 * f64::atan2(h.sqrt(), (1.0 - h).sqrt());
  EARTH_RADIUS_M * c
}

/// Length of the polyline through `points`, i.e. the sum of its legs.
#[must_use]
pub fn path_length(points: &[WGS84Coordinate]) -> f64 {
  points
    .windows(2)
    .map(|leg| haversine_distance(leg[0], leg[1]))
    .sum()
}

/// Area in square meters of the ring through `points`, closed implicitly.
///
/// This is the planar shoelace formula on radians scaled by the squared earth radius. Good enough
/// for site sized polygons, not a geodesic area. Self intersecting rings give a defined but
/// meaningless value.
pub fn polygon_area(points: &[WGS84Coordinate]) -> Result<f64, SpatialError> {
  if points.len() < 3 {
    return Err(SpatialError::TooFewPoints {
      required: 3,
      actual: points.len(),
    });
  }
  let twice_area: f64 = points
    .iter()
    .zip(points.iter().cycle().skip(1))
    .map(|(p, q)| {
      let (xi, yi) = (p.lng.to_radians(), p.lat.to_radians());
      let (xj, yj) = (q.lng.to_radians(), q.lat.to_radians());
      xi * yj - xj * yi
    })
    .sum();
  Ok((twice_area / 2.0).abs() * EARTH_RADIUS_M * EARTH_RADIUS_M)
}

/// UTM zone number of a longitude.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn utm_zone(lng: f64) -> i32 {
  ((lng + 180.0) / 6.0).floor() as i32 + 1
}

/// Arithmetic mean of the coordinates.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn centroid(points: impl IntoIterator<Item = WGS84Coordinate>) -> Option<WGS84Coordinate> {
  let (count, lat, lng) = points
    .into_iter()
    .fold((0usize, 0.0, 0.0), |(n, lat, lng), c| {
      (n + 1, lat + c.lat, lng + c.lng)
    });
  (count > 0).then(|| WGS84Coordinate::new(lat / count as f64, lng / count as f64))
}

#[must_use]
pub fn midpoint(a: WGS84Coordinate, b: WGS84Coordinate) -> WGS84Coordinate {
  WGS84Coordinate::new((a.lat + b.lat) / 2.0, (a.lng + b.lng) / 2.0)
}

#[must_use]
pub fn format_km(meters: f64) -> String {
  format!("{:.2} km", meters / 1000.0)
}

#[must_use]
pub fn format_distance(meters: f64) -> String {
  format!("Distance: {} ({meters:.0} m)", format_km(meters))
}

#[must_use]
pub fn format_area(square_meters: f64) -> String {
  if square_meters > 1_000_000.0 {
    format!("Area: {:.2} km²", square_meters / 1_000_000.0)
  } else {
    format!("Area: {square_meters:.0} m²")
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
  fn distance() {
    assert_approx_eq!(haversine_distance(c(0., 0.), c(0., 1.)), 111_194.93, 0.01);

    let alexanderplatz = c(52.520_754, 13.409_496);
    let hamburg_hbf = c(53.552_7, 10.006_6);
    assert_approx_eq!(haversine_distance(alexanderplatz, hamburg_hbf), 254_785., 10.);
  }

  #[rstest]
  #[case(c(51.5154, -0.1755), c(51.5164, -0.1765))]
  #[case(c(-33.86, 151.21), c(40.71, -74.0))]
  #[case(c(0., 179.9), c(0., -179.9))]
  fn distance_is_symmetric(#[case] a: WGS84Coordinate, #[case] b: WGS84Coordinate) {
    assert_approx_eq!(haversine_distance(a, b), haversine_distance(b, a), 1e-6);
    assert!(haversine_distance(a, a).abs() < f64::EPSILON);
  }

  #[test]
  fn path_length_sums_legs() {
    let points = [c(51.5154, -0.1755), c(51.5164, -0.1765), c(51.5149, -0.1745)];
    let expected = haversine_distance(points[0], points[1]) + haversine_distance(points[1], points[2]);
    assert_approx_eq!(path_length(&points), expected);
    assert_approx_eq!(path_length(&points), 347.70, 0.01);
    assert!(path_length(&points[..1]).abs() < f64::EPSILON);
  }

  #[test]
  fn square_area_near_equator() {
    let square = [c(0., 0.), c(0., 0.01), c(0.01, 0.01), c(0.01, 0.)];
    assert_approx_eq!(polygon_area(&square).unwrap(), 1_236_431.17, 0.01);

    let mut reversed = square;
    reversed.reverse();
    assert_approx_eq!(polygon_area(&reversed).unwrap(), 1_236_431.17, 0.01);
  }

  #[test]
  fn area_needs_three_points() {
    assert_eq!(
      polygon_area(&[c(0., 0.), c(0., 1.)]),
      Err(SpatialError::TooFewPoints {
        required: 3,
        actual: 2
      })
    );
  }

  #[test]
  fn nan_propagates() {
    assert!(haversine_distance(c(f64::NAN, 0.), c(0., 0.)).is_nan());
  }

  #[rstest]
  #[case(-0.175, 30)]
  #[case(0.175, 31)]
  #[case(-180.0, 1)]
  #[case(13.4, 33)]
  #[case(151.2, 56)]
  fn zones(#[case] lng: f64, #[case] zone: i32) {
    assert_eq!(utm_zone(lng), zone);
  }

  #[test]
  fn formatting() {
    assert_eq!(format_distance(1234.4), "Distance: 1.23 km (1234 m)");
    assert_eq!(format_area(12_500.2), "Area: 12500 m²");
    assert_eq!(format_area(2_500_000.0), "Area: 2.50 km²");
    assert_eq!(format_km(130.9), "0.13 km");
  }

  #[test]
  fn centroid_of_points() {
    let center = centroid([c(1., 2.), c(3., 4.)]).unwrap();
    assert_approx_eq!(center.lat, 2.);
    assert_approx_eq!(center.lng, 3.);
    assert!(centroid([]).is_none());
  }
}
