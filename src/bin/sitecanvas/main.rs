use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser as CliParser;
use log::info;
use sitecanvas::{
  config::Config,
  map::{
    canvas::MapCanvas, layers::BaseLayer, map_widget::SiteMap, renderer::Scene,
    timeline::{SystemClock, Timeline},
  },
  project::SiteProject,
  site_ui::SiteApp,
};

#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  /// A site project JSON document. The built-in demo site is shown if this is not provided.
  #[arg(short, long)]
  project: Option<PathBuf>,

  /// Base layer to start with. Values: street, satellite, terrain, topo.
  #[arg(short, long)]
  base_layer: Option<BaseLayer>,

  /// Starts with marker clustering switched on.
  #[arg(short, long)]
  clustering: bool,
}

fn main() -> anyhow::Result<()> {
  let args = Args::parse();

  // init logger.
  env_logger::init();

  let config = Config::new();
  let project = match &args.project {
    Some(path) => SiteProject::load(path)
      .with_context(|| format!("failed to load project {}", path.display()))?,
    None => SiteProject::demo().context("built-in demo project is invalid")?,
  };
  info!("showing {} ({})", project.name, project.location);

  let name = project.name.clone();
  let store = project
    .into_store()
    .with_base_layer(args.base_layer.unwrap_or_else(|| config.base_layer()))
    .with_clustering(args.clustering)
    .with_timeline(Timeline::new(
      config.timeline_start(),
      config.playback_interval(),
      Box::new(SystemClock),
    ));
  let map = SiteMap::new(MapCanvas::new(Scene::default()).with_config(&config));

  let options = eframe::NativeOptions {
    viewport: egui::ViewportBuilder {
      inner_size: Some(egui::vec2(1400.0, 900.0)),
      clamp_size_to_monitor_size: Some(true),
      ..Default::default()
    },
    ..Default::default()
  };

  eframe::run_native(
    "sitecanvas",
    options,
    Box::new(|_cc| Ok(Box::new(SiteApp::new(store, map, name)))),
  )
  .map_err(|e| anyhow::anyhow!("viewer failed: {e}"))
}
