//! Paints a [`Scene`] with egui and feeds pointer input back into the canvas.

use egui::{
  Align2, Color32, FontId, Pos2, Rect, Response, Sense, Shape, Stroke, Ui, Vec2,
  epaint::{CircleShape, PathShape, PathStroke},
};
use log::debug;

use super::{
  asset::MarkerStyle,
  canvas::MapCanvas,
  coordinates::{PixelPosition, Viewport, WGS84Coordinate},
  geometry_collection::{GeoGeometry, Geometry, Popup, with_opacity},
  layers::BaseLayer,
  map_event::MapEvent,
  renderer::{CLUSTER_BADGE_RADIUS, Primitive, Renderer, Scene},
  store::MapStore,
};

const CLUSTER_COLOR: Color32 = Color32::from_rgb(0x18, 0x61, 0x81);
const SHAPE_STROKE_WIDTH: f32 = 2.;
const CIRCLE_SEGMENTS: usize = 64;

/// The map area of the viewer.
pub struct SiteMap {
  canvas: MapCanvas<Scene>,
  popup: Option<(Popup, WGS84Coordinate)>,
}

impl SiteMap {
  #[must_use]
  pub fn new(canvas: MapCanvas<Scene>) -> Self {
    Self {
      canvas,
      popup: None,
    }
  }

  #[must_use]
  pub fn canvas(&self) -> &MapCanvas<Scene> {
    &self.canvas
  }

  pub fn mount(&mut self, store: &MapStore) {
    self.popup = None;
    self.canvas.mount(store);
  }

  pub fn sync(&mut self, store: &MapStore) {
    self.canvas.sync(store);
  }

  fn handle_mouse_wheel(&mut self, ui: &Ui, response: &Response, store: &MapStore) {
    if !response.hovered() {
      return;
    }
    let levels = ui.input(|i| {
      i.events.iter().find_map(|e| match e {
        egui::Event::MouseWheel { unit, delta, .. } => Some(match unit {
          egui::MouseWheelUnit::Point => delta.y / 100.,
          egui::MouseWheelUnit::Line => delta.y / 2.,
          egui::MouseWheelUnit::Page => delta.y,
        }),
        _ => None,
      })
    });
    if let Some(levels) = levels {
      let cursor = response.hover_pos().unwrap_or_default() - response.rect.min;
      let mut viewport = self.canvas.viewport();
      viewport.zoom_around(
        f64::from(levels.clamp(-1., 1.)),
        PixelPosition {
          x: cursor.x,
          y: cursor.y,
        },
      );
      self.canvas.set_viewport(viewport, store);
    }
  }

  /// Shows the map, handles input and returns what the map reported.
  pub fn ui(&mut self, ui: &mut Ui, store: &mut MapStore) -> Vec<MapEvent> {
    let size = ui.available_size();
    let (rect, response) = ui.allocate_exact_size(size, Sense::click_and_drag());

    let viewport = self.canvas.viewport();
    if (viewport.width - rect.width()).abs() > f32::EPSILON
      || (viewport.height - rect.height()).abs() > f32::EPSILON
    {
      self
        .canvas
        .set_viewport(viewport.with_size(rect.width(), rect.height()), store);
    }

    self.handle_mouse_wheel(ui, &response, store);

    if response.dragged() {
      let mut viewport = self.canvas.viewport();
      viewport.pan(PixelPosition {
        x: response.drag_delta().x,
        y: response.drag_delta().y,
      });
      self.canvas.set_viewport(viewport, store);
    }

    let mut events = Vec::new();
    if response.clicked()
      && let Some(pos) = response.interact_pointer_pos()
    {
      let local = pos - rect.min;
      let local = PixelPosition {
        x: local.x,
        y: local.y,
      };
      let scene = self.canvas.renderer();
      self.popup = scene
        .hit_test(local)
        .and_then(|handle| scene.get(handle))
        .and_then(|primitive| primitive.popup().cloned())
        .map(|popup| (popup, self.canvas.viewport().from_screen(local)));
      events = self.canvas.click(local, store);
      debug!("click at {local:?}: {events:?}");
    }

    if ui.is_rect_visible(rect) {
      paint_scene(ui, rect, self.canvas.renderer());
    }
    self.show_popup(ui, rect);

    events
  }

  fn show_popup(&mut self, ui: &Ui, rect: Rect) {
    let Some((popup, coord)) = &self.popup else {
      return;
    };
    let anchor = to_pos(&self.canvas.viewport(), rect, *coord);
    if !rect.contains(anchor) {
      return;
    }
    let mut close_requested = false;
    egui::Area::new(egui::Id::new("map_popup"))
      .fixed_pos(anchor + Vec2::new(12., -12.))
      .show(ui.ctx(), |ui| {
        egui::Frame::popup(ui.style()).show(ui, |ui| {
          ui.set_max_width(260.);
          ui.strong(&popup.title);
          for line in &popup.lines {
            ui.label(line);
          }
          if ui.small_button("Close").clicked() {
            close_requested = true;
          }
        });
      });
    if close_requested {
      self.popup = None;
    }
  }
}

fn to_pos(viewport: &Viewport, rect: Rect, coord: WGS84Coordinate) -> Pos2 {
  let p = viewport.to_screen(coord);
  rect.min + Vec2::new(p.x, p.y)
}

/// Draws areas and lines first, point symbols on top of them.
fn paint_scene(ui: &Ui, rect: Rect, scene: &Scene) {
  let painter = ui.painter_at(rect);
  let viewport = scene.viewport();

  let base_layer = scene.primitives().find_map(|(_, p)| match p {
    Primitive::TileLayer { base_layer, .. } => Some(*base_layer),
    _ => None,
  });
  painter.rect_filled(rect, 0.0, base_layer.unwrap_or_default().tint());

  let (points, areas): (Vec<_>, Vec<_>) = scene.primitives().map(|(_, p)| p).partition(|p| {
    matches!(
      p,
      Primitive::Marker { .. }
        | Primitive::ClusterBadge { .. }
        | Primitive::CircleMarker { .. }
        | Primitive::Label { .. }
    )
  });
  for primitive in areas.into_iter().chain(points) {
    paint_primitive(&painter, &viewport, rect, primitive);
  }

  if let Some(attribution) = scene.primitives().find_map(|(_, p)| match p {
    Primitive::TileLayer { attribution, .. } => Some(attribution.clone()),
    _ => None,
  }) {
    let text_color = if base_layer == Some(BaseLayer::Satellite) {
      Color32::LIGHT_GRAY
    } else {
      Color32::DARK_GRAY
    };
    painter.text(
      rect.right_bottom() - Vec2::new(6., 4.),
      Align2::RIGHT_BOTTOM,
      attribution,
      FontId::proportional(10.),
      text_color,
    );
  }
}

fn paint_primitive(painter: &egui::Painter, viewport: &Viewport, rect: Rect, primitive: &Primitive) {
  let pos = |coord: WGS84Coordinate| to_pos(viewport, rect, coord);
  match primitive {
    Primitive::TileLayer { .. } => {}
    Primitive::Marker { coord, style, .. } => paint_marker(painter, pos(*coord), style),
    Primitive::ClusterBadge { coord, count, .. } => {
      let center = pos(*coord);
      let radius = match count {
        0..=5 => CLUSTER_BADGE_RADIUS * 0.8,
        6..=10 => CLUSTER_BADGE_RADIUS * 0.9,
        _ => CLUSTER_BADGE_RADIUS,
      };
      painter.circle(center, radius, CLUSTER_COLOR, Stroke::new(3., Color32::WHITE));
      painter.text(
        center,
        Align2::CENTER_CENTER,
        count.to_string(),
        FontId::proportional(14.),
        Color32::WHITE,
      );
    }
    Primitive::Circle {
      center,
      radius_m,
      stroke,
      fill,
      dashed,
    } => {
      #[allow(clippy::cast_possible_truncation)]
      let radius = (radius_m / viewport.meters_per_pixel(center.lat)) as f32;
      let center = pos(*center);
      painter.circle_filled(center, radius, *fill);
      let stroke = Stroke::new(SHAPE_STROKE_WIDTH, *stroke);
      if *dashed {
        let ring = circle_points(center, radius);
        painter.extend(Shape::dashed_line(&ring, stroke, 5., 5.));
      } else {
        painter.circle_stroke(center, radius, stroke);
      }
    }
    Primitive::CircleMarker {
      coord,
      radius_px,
      stroke,
      fill,
      ..
    } => {
      painter.add(CircleShape {
        center: pos(*coord),
        radius: *radius_px,
        fill: *fill,
        stroke: Stroke::new(2., *stroke),
      });
    }
    Primitive::Polyline {
      coords,
      color,
      width,
      dashed,
    } => {
      let points: Vec<Pos2> = coords.iter().map(|c| pos(*c)).collect();
      let stroke = Stroke::new(*width, *color);
      if *dashed {
        let (dash, gap) = if *width <= 1. { (2., 4.) } else { (10., 5.) };
        painter.extend(Shape::dashed_line(&points, stroke, dash, gap));
      } else {
        painter.line(points, stroke);
      }
    }
    Primitive::Polygon {
      coords,
      stroke,
      fill,
      dashed,
    } => {
      let points: Vec<Pos2> = coords.iter().map(|c| pos(*c)).collect();
      let stroke = Stroke::new(SHAPE_STROKE_WIDTH, *stroke);
      if *dashed {
        painter.add(PathShape::convex_polygon(points.clone(), *fill, Stroke::NONE));
        let mut ring = points;
        ring.extend(ring.first().copied());
        painter.extend(Shape::dashed_line(&ring, stroke, 10., 5.));
      } else {
        painter.add(PathShape::convex_polygon(points, *fill, stroke));
      }
    }
    Primitive::Label { coord, text } => {
      let center = pos(*coord);
      let galley = painter.layout_no_wrap(text.clone(), FontId::proportional(12.), Color32::BLACK);
      let label_rect = Align2::CENTER_CENTER
        .anchor_size(center, galley.size())
        .expand(4.);
      painter.rect_filled(label_rect, 3.0, Color32::WHITE);
      painter.galley(label_rect.min + Vec2::splat(4.), galley, Color32::BLACK);
    }
    Primitive::Shape {
      geometry,
      point_radius_px,
    } => paint_geometry(painter, &pos, geometry, *point_radius_px),
  }
}

fn paint_marker(painter: &egui::Painter, center: Pos2, style: &MarkerStyle) {
  let radius = style.radius();
  if style.halo {
    painter.circle_filled(center, radius + 5., with_opacity(style.stroke, 0.3));
  }
  painter.circle(center, radius, style.fill, Stroke::new(2., style.stroke));
  painter.text(
    center,
    Align2::CENTER_CENTER,
    icon_glyph(style.icon),
    FontId::proportional(radius),
    style.icon_color,
  );
}

fn icon_glyph(icon: &str) -> &'static str {
  match icon {
    "layers" => "B",
    "activity" => "M",
    "building-2" => "I",
    _ => "?",
  }
}

#[allow(clippy::cast_precision_loss)]
fn circle_points(center: Pos2, radius: f32) -> Vec<Pos2> {
  (0..=CIRCLE_SEGMENTS)
    .map(|i| {
      let angle = std::f32::consts::TAU * i as f32 / CIRCLE_SEGMENTS as f32;
      center + radius * Vec2::angled(angle)
    })
    .collect()
}

fn paint_geometry(
  painter: &egui::Painter,
  pos: &dyn Fn(WGS84Coordinate) -> Pos2,
  geometry: &GeoGeometry,
  point_radius: f32,
) {
  let style = geometry.get_style().clone().unwrap_or_default();
  match geometry {
    Geometry::GeometryCollection(children, _) => {
      for child in children {
        paint_geometry(painter, pos, child, point_radius);
      }
    }
    Geometry::Point(coord, _) => {
      painter.circle(
        pos(*coord),
        point_radius,
        style.color(),
        Stroke::new(2., Color32::WHITE),
      );
    }
    Geometry::LineString(coords, _) => {
      painter.add(PathShape::line(
        coords.iter().map(|c| pos(*c)).collect(),
        PathStroke::new(SHAPE_STROKE_WIDTH, style.color()),
      ));
    }
    Geometry::Polygon(coords, _) => {
      painter.add(PathShape {
        points: coords.iter().map(|c| pos(*c)).collect(),
        closed: true,
        fill: style.fill_color(),
        stroke: PathStroke::new(SHAPE_STROKE_WIDTH, style.color()),
      });
    }
  }
}
