pub mod config;
pub mod map;
pub mod parser;
pub mod project;
pub mod site_ui;

pub use map::map_event::MapEvent;
