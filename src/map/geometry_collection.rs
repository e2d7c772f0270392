use egui::Color32;
use itertools::Either;
use serde::{Deserialize, Serialize};

use super::coordinates::WGS84Coordinate;

type Color = Color32;

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Style {
  color: Option<Color>,
  fill_color: Option<Color>,
}

pub const DEFAULT_STYLE: Style = Style {
  color: Some(Color32::BLUE),
  fill_color: None,
};

impl Default for Style {
  fn default() -> Self {
    DEFAULT_STYLE.clone()
  }
}

/// Applies an opacity in `[0, 1]` to a colour.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn with_opacity(color: Color, opacity: f32) -> Color {
  let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
  Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), alpha)
}

impl Style {
  #[must_use]
  pub fn with_color(mut self, color: Color) -> Self {
    self.color = Some(color);
    self
  }

  #[must_use]
  pub fn with_fill_color(mut self, fill_color: Color) -> Self {
    self.fill_color = Some(fill_color);
    self
  }

  fn overwrite_with(&self, style: &Style) -> Style {
    Style {
      color: style.color.or(self.color),
      fill_color: style.fill_color.or(self.fill_color),
    }
  }

  fn optional_overwrite_with(&self, style: Option<&Style>) -> Style {
    style.map_or_else(|| self.clone(), |s| self.overwrite_with(s))
  }

  #[must_use]
  pub fn color(&self) -> Color {
    self.color.unwrap_or(Color32::BLUE)
  }

  #[must_use]
  pub fn fill_color(&self) -> Color {
    self.fill_color.unwrap_or(Color32::TRANSPARENT)
  }
}

/// Text shown when a primitive is clicked.
#[derive(Clone, Default, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Popup {
  pub title: String,
  pub lines: Vec<String>,
}

impl Popup {
  #[must_use]
  pub fn new(title: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      lines: Vec::new(),
    }
  }

  #[must_use]
  pub fn with_line(mut self, line: impl Into<String>) -> Self {
    self.lines.push(line.into());
    self
  }
}

#[derive(Clone, Default, PartialEq, Debug, Serialize, Deserialize)]
pub struct Metadata {
  pub label: Option<String>,
  pub style: Option<Style>,
  pub popup: Option<Popup>,
}

impl Metadata {
  #[must_use]
  pub fn with_label(mut self, label: String) -> Self {
    self.label = Some(label);
    self
  }

  #[must_use]
  pub fn with_style(mut self, style: Style) -> Self {
    self.style = Some(style);
    self
  }

  #[must_use]
  pub fn with_popup(mut self, popup: Popup) -> Self {
    self.popup = Some(popup);
    self
  }
}

/// A styled shape in WGS84, possibly nested.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum Geometry {
  GeometryCollection(Vec<Geometry>, Metadata),
  Point(WGS84Coordinate, Metadata),
  LineString(Vec<WGS84Coordinate>, Metadata),
  Polygon(Vec<WGS84Coordinate>, Metadata),
}

impl Geometry {
  pub fn flat_iterate_with_merged_style(
    &self,
    base_style: &Style,
  ) -> impl Iterator<Item = Geometry> + use<'_> {
    if let Geometry::GeometryCollection(geometries, metadata) = self {
      let style = base_style.optional_overwrite_with(metadata.style.as_ref());
      let popup = metadata.popup.clone();

      Either::Left(geometries.iter().cloned().flat_map(move |geometry| {
        let geometry = match (&popup, geometry.metadata().popup.is_none()) {
          (Some(popup), true) => geometry.with_popup(popup.clone()),
          _ => geometry,
        };
        geometry
          .flat_iterate_with_merged_style(&style)
          .collect::<Vec<_>>()
      }))
    } else {
      let style = base_style.optional_overwrite_with(self.get_style().as_ref());
      Either::Right(std::iter::once(self.clone().with_style(&style)))
    }
  }

  #[must_use]
  pub fn with_style(mut self, style: &Style) -> Self {
    self.metadata_mut().style = Some(style.clone());
    self
  }

  #[must_use]
  pub fn with_popup(mut self, popup: Popup) -> Self {
    self.metadata_mut().popup = Some(popup);
    self
  }

  #[must_use]
  pub fn get_style(&self) -> &Option<Style> {
    &self.metadata().style
  }

  #[must_use]
  pub fn metadata(&self) -> &Metadata {
    match self {
      Geometry::GeometryCollection(_, metadata)
      | Geometry::Point(_, metadata)
      | Geometry::Polygon(_, metadata)
      | Geometry::LineString(_, metadata) => metadata,
    }
  }

  fn metadata_mut(&mut self) -> &mut Metadata {
    match self {
      Geometry::GeometryCollection(_, metadata)
      | Geometry::Point(_, metadata)
      | Geometry::Polygon(_, metadata)
      | Geometry::LineString(_, metadata) => metadata,
    }
  }
}

pub type GeoGeometry = Geometry;
