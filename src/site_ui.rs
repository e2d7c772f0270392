use std::time::Instant;

use egui::{Color32, RichText, Ui};
use log::{debug, info};

use crate::{
  MapEvent,
  map::{
    asset::{Asset, AssetKind, ReadingStatus},
    layers::BaseLayer,
    map_widget::SiteMap,
    spatial::format_km,
    store::{Action, MapState, MapStore},
    tools::{HeatmapCategory, MeasurementMode, ToolMode},
  },
};

const REPAINT_WHILE_PLAYING: std::time::Duration = std::time::Duration::from_millis(50);

/// Holds the UI data of the site viewer.
pub struct SiteApp {
  store: MapStore,
  map: SiteMap,
  project_name: String,
  sidebar_open: bool,
  last_frame: Instant,
}

impl SiteApp {
  #[must_use]
  pub fn new(store: MapStore, mut map: SiteMap, project_name: String) -> Self {
    map.mount(&store);
    Self {
      store,
      map,
      project_name,
      sidebar_open: true,
      last_frame: Instant::now(),
    }
  }

  fn dispatch(&mut self, action: Action) {
    debug!("{action:?}");
    let events = self.store.dispatch(action);
    log_events(&events);
  }

  fn handle_keys(&mut self, ctx: &egui::Context) {
    let (toggle_sidebar, escape) = ctx.input(|i| {
      (
        i.key_pressed(egui::Key::F1) || (i.modifiers.ctrl && i.key_pressed(egui::Key::B)),
        i.key_pressed(egui::Key::Escape),
      )
    });
    if toggle_sidebar {
      self.sidebar_open = !self.sidebar_open;
    }
    if escape {
      self.dispatch(Action::ClearSelection);
    }
  }

  fn advance_timeline(&mut self, ctx: &egui::Context) {
    let now = Instant::now();
    let elapsed = now - self.last_frame;
    self.last_frame = now;
    if self.store.state().timeline.is_playing() {
      self.dispatch(Action::Tick(elapsed));
      ctx.request_repaint_after(REPAINT_WHILE_PLAYING);
    }
  }
}

impl eframe::App for SiteApp {
  // Required by eframe 0.34; rendering still happens in `update`, which eframe keeps calling.
  fn ui(&mut self, _ui: &mut Ui, _frame: &mut eframe::Frame) {}

  #[allow(deprecated)]
  fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
    self.handle_keys(ctx);
    self.advance_timeline(ctx);

    let mut actions = Vec::new();
    if self.sidebar_open {
      egui::SidePanel::left("sidebar")
        .default_width(300.0)
        .width_range(240.0..=480.0)
        .resizable(true)
        .show(ctx, |ui| {
          sidebar_ui(ui, &self.project_name, self.store.state(), &mut actions);
        });
    }
    for action in actions {
      self.dispatch(action);
    }
    self.map.sync(&self.store);

    egui::CentralPanel::default()
      .frame(egui::Frame::NONE)
      .show(ctx, |ui| {
        let events = self.map.ui(ui, &mut self.store);
        log_events(&events);
      });
  }
}

fn log_events(events: &[MapEvent]) {
  for event in events {
    match event {
      MapEvent::AssetClicked(id) => info!("asset clicked: {id}"),
      MapEvent::CrossSectionReady { length_m, .. } => {
        info!("cross-section ready: {}", format_km(*length_m));
      }
    }
  }
}

fn sidebar_ui(ui: &mut Ui, project_name: &str, state: &MapState, actions: &mut Vec<Action>) {
  ui.heading(project_name);
  ui.separator();

  egui::ScrollArea::vertical()
    .auto_shrink([false; 2])
    .show(ui, |ui| {
      egui::CollapsingHeader::new("Overlays")
        .default_open(true)
        .show(ui, |ui| overlays_ui(ui, state, actions));
      egui::CollapsingHeader::new("Shapefiles")
        .default_open(true)
        .show(ui, |ui| shapefiles_ui(ui, state, actions));
      egui::CollapsingHeader::new("Base Layer")
        .default_open(false)
        .show(ui, |ui| base_layer_ui(ui, state, actions));
      egui::CollapsingHeader::new("Tools")
        .default_open(true)
        .show(ui, |ui| tools_ui(ui, state, actions));
      egui::CollapsingHeader::new("Display")
        .default_open(true)
        .show(ui, |ui| display_ui(ui, state, actions));
      if let Some(asset) = state.selected_asset() {
        egui::CollapsingHeader::new("Selected Asset")
          .default_open(true)
          .show(ui, |ui| asset_details_ui(ui, asset, actions));
      }
    });
}

fn overlays_ui(ui: &mut Ui, state: &MapState, actions: &mut Vec<Action>) {
  for overlay in state.registry.overlays() {
    let mut enabled = overlay.enabled;
    let label = RichText::new(&overlay.name).color(overlay.color);
    if ui.checkbox(&mut enabled, label).changed() {
      actions.push(Action::ToggleOverlay(overlay.id.clone()));
    }
  }
}

fn shapefiles_ui(ui: &mut Ui, state: &MapState, actions: &mut Vec<Action>) {
  let mut enabled = state.registry.shapefiles_enabled();
  if ui.checkbox(&mut enabled, "Show shapefile layers").changed() {
    actions.push(Action::SetShapefilesEnabled(enabled));
  }
  if state.registry.shapefiles().is_empty() {
    ui.weak("No shapefile layers");
    return;
  }

  ui.add_enabled_ui(enabled, |ui| {
    for layer in state.registry.shapefiles() {
      ui.separator();
      ui.horizontal(|ui| {
        let mut visible = layer.visible;
        if ui.checkbox(&mut visible, &layer.name).changed() {
          actions.push(Action::ToggleShapefile(layer.id.clone()));
        }
        let mut color = layer.color;
        if ui.color_edit_button_srgba(&mut color).changed() {
          actions.push(Action::SetShapefileColor(layer.id.clone(), color));
        }
      });
      for line in layer.details() {
        ui.weak(line);
      }
      let mut opacity = layer.opacity();
      if ui
        .add(egui::Slider::new(&mut opacity, 0.0..=1.0).text("Opacity"))
        .changed()
      {
        actions.push(Action::SetShapefileOpacity(layer.id.clone(), opacity));
      }
    }
  });
}

fn base_layer_ui(ui: &mut Ui, state: &MapState, actions: &mut Vec<Action>) {
  let mut current = state.base_layer;
  for base_layer in BaseLayer::all() {
    ui.radio_value(&mut current, *base_layer, base_layer.name());
  }
  if current != state.base_layer {
    actions.push(Action::SetBaseLayer(current));
  }
}

fn tools_ui(ui: &mut Ui, state: &MapState, actions: &mut Vec<Action>) {
  let active = state.tools.mode();
  ui.horizontal_wrapped(|ui| {
    for tool in ToolMode::all() {
      if ui.selectable_label(active == *tool, tool.name()).clicked() {
        actions.push(Action::SetTool(*tool));
      }
    }
  });

  match active {
    ToolMode::None => {
      ui.weak("Select a tool to analyse the site");
    }
    ToolMode::Measurement => measurement_ui(ui, state, actions),
    ToolMode::Coordinates => match state.tools.probe.readout() {
      Some(lines) => {
        for line in lines {
          ui.monospace(line);
        }
      }
      None => {
        ui.label("Click on the map to read coordinates");
      }
    },
    ToolMode::CrossSection => cross_section_ui(ui, state),
    ToolMode::Heatmap => heatmap_ui(ui, state, actions),
  }
}

fn measurement_ui(ui: &mut Ui, state: &MapState, actions: &mut Vec<Action>) {
  let session = &state.tools.measurement;
  let mut mode = session.mode();
  ui.horizontal(|ui| {
    ui.radio_value(&mut mode, MeasurementMode::Distance, "Distance");
    ui.radio_value(&mut mode, MeasurementMode::Area, "Area");
  });
  if mode != session.mode() {
    actions.push(Action::SetMeasurementMode(mode));
  }

  match session.result() {
    Some(result) => {
      ui.strong(result.to_string());
    }
    None => {
      ui.label("Click on the map to add points");
    }
  }
  ui.horizontal(|ui| {
    ui.weak(format!("{} points", session.points().len()));
    if ui.button("Reset").clicked() {
      actions.push(Action::ResetMeasurement);
    }
  });
}

fn cross_section_ui(ui: &mut Ui, state: &MapState) {
  let section = &state.tools.cross_section;
  match section.line() {
    Some((_, _, length_m)) => {
      ui.label("Section profile ready. Click new point to restart.");
      ui.strong(format_km(length_m));
      ui.label("Intersecting boreholes:");
      let boreholes = state.section_boreholes();
      if boreholes.is_empty() {
        ui.weak("None");
      }
      for borehole in boreholes {
        ui.label(format!("• {}", borehole.name));
      }
    }
    None if section.points().is_empty() => {
      ui.label("Click start point on map");
    }
    None => {
      ui.label("Click end point on map");
    }
  }
}

fn heatmap_ui(ui: &mut Ui, state: &MapState, actions: &mut Vec<Action>) {
  let mut category = state.tools.heatmap_category;
  for c in HeatmapCategory::all() {
    ui.radio_value(&mut category, *c, c.name());
  }
  if category != state.tools.heatmap_category {
    actions.push(Action::SetHeatmapCategory(category));
  }

  if let Some(heatmap) = &state.tools.heatmap {
    ui.horizontal(|ui| {
      for color in category.palette() {
        let (rect, _) = ui.allocate_exact_size(egui::vec2(24.0, 10.0), egui::Sense::hover());
        ui.painter().rect_filled(rect, 2.0, color);
      }
    });
    for sample in &heatmap.samples {
      ui.label(
        RichText::new(format!("{:.1}{}", sample.value, category.unit())).color(sample.color),
      );
    }
    ui.weak("Illustrative only, not interpolated from readings");
  }
}

fn display_ui(ui: &mut Ui, state: &MapState, actions: &mut Vec<Action>) {
  let mut clustering = state.clustering;
  if ui.checkbox(&mut clustering, "Cluster markers").changed() {
    actions.push(Action::SetClustering(clustering));
  }
  let mut time_series = state.time_series;
  if ui.checkbox(&mut time_series, "Time series").changed() {
    actions.push(Action::SetTimeSeries(time_series));
  }

  if state.time_series {
    ui.horizontal(|ui| {
      if ui.button("⏮").clicked() {
        actions.push(Action::StepBack);
      }
      let play = if state.timeline.is_playing() {
        "⏸"
      } else {
        "▶"
      };
      if ui.button(play).clicked() {
        actions.push(Action::PlayPause);
      }
      if ui.button("⏭").clicked() {
        actions.push(Action::StepForward);
      }
      ui.strong(state.timeline.label());
    });
  }
}

fn reading_color(status: ReadingStatus) -> Color32 {
  match status {
    ReadingStatus::Normal => Color32::from_rgb(0x22, 0xc5, 0x5e),
    ReadingStatus::Warning => Color32::from_rgb(0xf5, 0x9e, 0x0b),
    ReadingStatus::Alert => Color32::from_rgb(0xef, 0x44, 0x44),
  }
}

fn asset_details_ui(ui: &mut Ui, asset: &Asset, actions: &mut Vec<Action>) {
  ui.strong(&asset.name);
  ui.label(RichText::new(asset.asset_type().name()).color(asset.asset_type().color()));
  if !asset.location.address.is_empty() {
    ui.weak(&asset.location.address);
  }
  ui.monospace(format!("{:.6}, {:.6}", asset.location.lat, asset.location.lng));

  match &asset.kind {
    AssetKind::Borehole {
      depth,
      date,
      soil_layers,
    } => {
      ui.label(format!("Depth: {depth}m"));
      ui.label(format!("Drilled: {date}"));
      for layer in soil_layers {
        ui.label(format!(
          "{}: {} ({}, N={})",
          layer.depth, layer.description, layer.classification, layer.n_value
        ));
      }
    }
    AssetKind::MonitoringPoint {
      date,
      instrument_type,
      latest_readings,
      ..
    } => {
      ui.label(instrument_type);
      ui.label(format!("Installed: {date}"));
      for reading in latest_readings {
        ui.label(
          RichText::new(format!(
            "{}: {} {}",
            reading.parameter, reading.value, reading.unit
          ))
          .color(reading_color(reading.status)),
        );
      }
    }
    AssetKind::Infrastructure {
      infrastructure_type,
      status,
      specifications,
    } => {
      ui.label(format!("{infrastructure_type} ({status})"));
      for item in specifications {
        ui.label(format!("{}: {}", item.key, item.value));
      }
    }
  }

  if ui.button("Clear selection").clicked() {
    actions.push(Action::ClearSelection);
  }
}
