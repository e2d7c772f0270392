//! Parsing of uploaded feature data.

mod geojson;
pub use geojson::{GeoJsonError, GeoJsonParser};
mod style;
pub use style::{POPUP_PROPERTY_LIMIT, StyleParser, hex_color};
