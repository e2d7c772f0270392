use egui::Color32;
use serde_json::{Map, Value};

use crate::map::geometry_collection::Popup;

/// How many feature properties a popup lists before summarising the rest.
pub const POPUP_PROPERTY_LIMIT: usize = 5;

/// Shared style parsing utilities for JSON-based parsers
pub struct StyleParser;

impl StyleParser {
  /// Builds the popup of a feature: the layer name followed by the first properties.
  pub fn popup_from_properties(title: &str, props: &Map<String, Value>) -> Popup {
    let mut popup = Popup::new(title);
    for (key, value) in props.iter().take(POPUP_PROPERTY_LIMIT) {
      let value = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
      };
      popup = popup.with_line(format!("{key}: {value}"));
    }
    if props.len() > POPUP_PROPERTY_LIMIT {
      popup = popup.with_line(format!(
        "+{} more properties",
        props.len() - POPUP_PROPERTY_LIMIT
      ));
    }
    popup
  }

  /// Parse color string (hex, rgb, named colors)
  pub fn parse_color(color_str: &str) -> Option<Color32> {
    let color_str = color_str.trim();

    if let Some(hex) = color_str.strip_prefix('#') {
      return Self::parse_hex_color(hex);
    }

    if color_str.starts_with("rgb(") && color_str.ends_with(')') {
      return Self::parse_rgb_color(&color_str[4..color_str.len() - 1]);
    }

    match color_str.to_lowercase().as_str() {
      "red" => Some(Color32::RED),
      "green" => Some(Color32::GREEN),
      "blue" => Some(Color32::BLUE),
      "yellow" => Some(Color32::YELLOW),
      "black" => Some(Color32::BLACK),
      "white" => Some(Color32::WHITE),
      "gray" | "grey" => Some(Color32::GRAY),
      _ => None,
    }
  }

  /// Parse hex color string
  pub fn parse_hex_color(hex: &str) -> Option<Color32> {
    if !hex.is_ascii() {
      return None;
    }
    match hex.len() {
      3 => {
        let r = u8::from_str_radix(&hex[0..1].repeat(2), 16).ok()?;
        let g = u8::from_str_radix(&hex[1..2].repeat(2), 16).ok()?;
        let b = u8::from_str_radix(&hex[2..3].repeat(2), 16).ok()?;
        Some(Color32::from_rgb(r, g, b))
      }
      6 => {
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Color32::from_rgb(r, g, b))
      }
      8 => {
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        let a = u8::from_str_radix(&hex[6..8], 16).ok()?;
        Some(Color32::from_rgba_unmultiplied(r, g, b, a))
      }
      _ => None,
    }
  }

  /// Parse `rgb()` color string
  pub fn parse_rgb_color(rgb: &str) -> Option<Color32> {
    let parts: Vec<&str> = rgb.split(',').map(str::trim).collect();
    if parts.len() >= 3 {
      let r = parts[0].parse::<u8>().ok()?;
      let g = parts[1].parse::<u8>().ok()?;
      let b = parts[2].parse::<u8>().ok()?;
      Some(Color32::from_rgb(r, g, b))
    } else {
      None
    }
  }

  /// `#rrggbb` of an opaque colour.
  #[must_use]
  pub fn to_hex(color: Color32) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r(), color.g(), color.b())
  }
}

/// Serde adapter storing a [`Color32`] as a css colour string.
pub mod hex_color {
  use egui::Color32;
  use serde::{Deserialize, Deserializer, Serializer, de::Error};

  use super::StyleParser;

  pub fn serialize<S: Serializer>(color: &Color32, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&StyleParser::to_hex(*color))
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Color32, D::Error> {
    let s = String::deserialize(deserializer)?;
    StyleParser::parse_color(&s).ok_or_else(|| D::Error::custom(format!("invalid colour: {s}")))
  }
}
