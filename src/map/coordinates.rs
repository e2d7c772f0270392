mod coords;
mod viewport;

/// Coordinates and bounds.
pub use coords::*;
/// The visible part of the map.
pub use viewport::{MAX_ZOOM, Viewport};
