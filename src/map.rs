/// Site assets and how they look on the map.
pub mod asset;
/// The adapter between map state and a renderer.
pub mod canvas;
/// Marker grouping.
pub mod cluster;
/// Contains everything needed to handle coordinates.
pub mod coordinates;
/// Handles geometry.
pub mod geometry_collection;
/// Overlays and shapefile layers.
pub mod layers;
/// Events emitted by the map to its owner.
pub mod map_event;
/// The egui map widget.
pub mod map_widget;
/// Render primitives and the in-memory scene.
pub mod renderer;
/// Distances, areas and zones.
pub mod spatial;
/// The map state container.
pub mod store;
/// Time series playback.
pub mod timeline;
/// Analysis tools.
pub mod tools;
