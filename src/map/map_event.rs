use super::{asset::AssetId, coordinates::WGS84Coordinate};

/// What the map tells its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
  /// A marker, or a marker inside a cluster, was clicked. Sent once per click.
  AssetClicked(AssetId),
  /// The cross-section tool has both ends of a section line.
  CrossSectionReady {
    start: WGS84Coordinate,
    end: WGS84Coordinate,
    length_m: f64,
  },
}
