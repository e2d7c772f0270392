use std::{path::PathBuf, time::Duration};

use chrono::NaiveDate;
use dirs::home_dir;
use log::{error, warn};

use crate::map::{asset::default_record_date, layers::BaseLayer};

/// Where the tiles of a base layer come from. Tiles are never downloaded; the viewer only shows
/// the attribution.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct TileProvider {
  pub base_layer: BaseLayer,
  pub url: String,
  pub attribution: String,
  #[serde(default)]
  pub max_zoom: Option<u8>,
}

impl TileProvider {
  /// The provider a base layer uses unless configured otherwise.
  #[must_use]
  pub fn builtin(base_layer: BaseLayer) -> Self {
    let (url, attribution, max_zoom) = match base_layer {
      BaseLayer::Street => (
        "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
        "© OpenStreetMap contributors",
        19,
      ),
      BaseLayer::Satellite => (
        "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}",
        "© Esri, Maxar, Earthstar Geographics",
        19,
      ),
      BaseLayer::Terrain => (
        "https://{s}.tile.opentopomap.org/{z}/{x}/{y}.png",
        "© OpenTopoMap contributors",
        17,
      ),
      BaseLayer::Topo => (
        "https://server.arcgisonline.com/ArcGIS/rest/services/World_Topo_Map/MapServer/tile/{z}/{y}/{x}",
        "© Esri",
        19,
      ),
    };
    Self {
      base_layer,
      url: url.to_string(),
      attribution: attribution.to_string(),
      max_zoom: Some(max_zoom),
    }
  }

  /// Get the maximum zoom level for this provider. Returns 19 if not specified.
  #[must_use]
  pub fn get_max_zoom(&self) -> u8 {
    self.max_zoom.unwrap_or(19)
  }

  /// The first provider for `base_layer` in `providers`, or the builtin one.
  #[must_use]
  pub fn lookup(providers: &[TileProvider], base_layer: BaseLayer) -> TileProvider {
    providers
      .iter()
      .find(|p| p.base_layer == base_layer)
      .cloned()
      .unwrap_or_else(|| Self::builtin(base_layer))
  }
}

pub const DEFAULT_CLUSTER_THRESHOLD: usize = 5;
pub const DEFAULT_CLUSTER_RADIUS_PX: f64 = 50.;
pub const DEFAULT_PLAYBACK_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_INITIAL_ZOOM: f64 = 13.;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Default)]
pub struct Config {
  pub config_path: Option<PathBuf>,
  #[serde(default)]
  pub tile_provider: Vec<TileProvider>,
  #[serde(default)]
  pub base_layer: Option<BaseLayer>,
  /// Clustering only kicks in above this many visible assets.
  #[serde(default)]
  pub cluster_threshold: Option<usize>,
  #[serde(default)]
  pub cluster_radius_px: Option<f64>,
  #[serde(default)]
  pub playback_interval_ms: Option<u64>,
  #[serde(default)]
  pub timeline_start: Option<NaiveDate>,
  #[serde(default)]
  pub initial_zoom: Option<f64>,
}

impl Config {
  #[must_use]
  pub fn new() -> Self {
    let from_env = Self::from_env();
    let from_file = Self::from_file();
    let default = Self::defaults();

    let mut merged = from_env;
    if let Some(from_file) = &from_file {
      merged = merged.merge(from_file);
    }
    merged = merged.merge(&default);

    if merged.config_path.is_some() && from_file.is_none() {
      merged.init_cfg_file();
    }

    merged
  }

  fn from_env() -> Self {
    let config_path = std::env::var("SITECANVAS_CONFIG").ok().map(PathBuf::from);
    let base_layer = std::env::var("SITECANVAS_BASE_LAYER")
      .ok()
      .and_then(|v| {
        v.parse::<BaseLayer>()
          .inspect_err(|e| warn!("SITECANVAS_BASE_LAYER: {e}"))
          .ok()
      });

    Self {
      config_path,
      base_layer,
      ..Self::default()
    }
  }

  /// Values of `self` win, gaps are filled from `other`.
  fn merge(mut self, other: &Self) -> Self {
    self.config_path = self.config_path.or(other.config_path.clone());
    for tile in &other.tile_provider {
      if !self.tile_provider.iter().any(|t| t == tile) {
        self.tile_provider.push(tile.clone());
      }
    }
    self.base_layer = self.base_layer.or(other.base_layer);
    self.cluster_threshold = self.cluster_threshold.or(other.cluster_threshold);
    self.cluster_radius_px = self.cluster_radius_px.or(other.cluster_radius_px);
    self.playback_interval_ms = self.playback_interval_ms.or(other.playback_interval_ms);
    self.timeline_start = self.timeline_start.or(other.timeline_start);
    self.initial_zoom = self.initial_zoom.or(other.initial_zoom);
    self
  }

  fn from_file() -> Option<Self> {
    let config_path = std::env::var("SITECANVAS_CONFIG")
      .ok()
      .map(PathBuf::from)
      .or_else(|| home_dir().map(|p| p.join(".config").join("sitecanvas")))?;
    let config_path = config_path.join("config.json");

    serde_json::from_str(&std::fs::read_to_string(&config_path).ok()?)
      .inspect_err(|e| error!("Failed to read config file: {e}"))
      .ok()?
  }

  fn init_cfg_file(&self) {
    let Some(path) = &self.config_path else {
      return;
    };
    if !path.exists() {
      let _ = std::fs::create_dir_all(path).inspect_err(|e| {
        error!("Failed to create config directory: {e}");
      });
    }

    let path = path.join("config.json");
    if !path.exists() {
      if let Ok(config) = serde_json::to_string_pretty(self) {
        let _ = std::fs::write(path, config).inspect_err(|e| {
          error!("Failed to write config file: {e}");
        });
      } else {
        error!("Failed to serialize config");
      }
    }
  }

  /// Every setting filled with its default.
  #[must_use]
  pub fn defaults() -> Self {
    Self {
      config_path: home_dir().map(|p| p.join(".config").join("sitecanvas")),
      tile_provider: BaseLayer::all()
        .iter()
        .map(|b| TileProvider::builtin(*b))
        .collect(),
      base_layer: Some(BaseLayer::default()),
      cluster_threshold: Some(DEFAULT_CLUSTER_THRESHOLD),
      cluster_radius_px: Some(DEFAULT_CLUSTER_RADIUS_PX),
      playback_interval_ms: Some(DEFAULT_PLAYBACK_INTERVAL_MS),
      timeline_start: Some(default_record_date()),
      initial_zoom: Some(DEFAULT_INITIAL_ZOOM),
    }
  }

  #[must_use]
  pub fn base_layer(&self) -> BaseLayer {
    self.base_layer.unwrap_or_default()
  }

  #[must_use]
  pub fn cluster_threshold(&self) -> usize {
    self.cluster_threshold.unwrap_or(DEFAULT_CLUSTER_THRESHOLD)
  }

  #[must_use]
  pub fn cluster_radius_px(&self) -> f64 {
    self.cluster_radius_px.unwrap_or(DEFAULT_CLUSTER_RADIUS_PX)
  }

  #[must_use]
  pub fn playback_interval(&self) -> Duration {
    Duration::from_millis(
      self
        .playback_interval_ms
        .unwrap_or(DEFAULT_PLAYBACK_INTERVAL_MS),
    )
  }

  #[must_use]
  pub fn timeline_start(&self) -> NaiveDate {
    self.timeline_start.unwrap_or_else(default_record_date)
  }

  #[must_use]
  pub fn initial_zoom(&self) -> f64 {
    self.initial_zoom.unwrap_or(DEFAULT_INITIAL_ZOOM)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn first_value_wins_in_merge() {
    let from_env = Config {
      base_layer: Some(BaseLayer::Topo),
      ..Config::default()
    };
    let from_file = Config {
      base_layer: Some(BaseLayer::Satellite),
      cluster_threshold: Some(10),
      tile_provider: vec![TileProvider {
        base_layer: BaseLayer::Street,
        url: "https://tiles.example.org/{z}/{x}/{y}.png".to_string(),
        attribution: "Example".to_string(),
        max_zoom: None,
      }],
      ..Config::default()
    };
    let merged = from_env.merge(&from_file).merge(&Config::defaults());

    assert_eq!(merged.base_layer(), BaseLayer::Topo);
    assert_eq!(merged.cluster_threshold(), 10);
    assert!((merged.cluster_radius_px() - 50.).abs() < f64::EPSILON);
    assert_eq!(merged.playback_interval(), Duration::from_secs(1));
    let street = TileProvider::lookup(&merged.tile_provider, BaseLayer::Street);
    assert_eq!(street.attribution, "Example");
    assert_eq!(street.get_max_zoom(), 19);
    let terrain = TileProvider::lookup(&merged.tile_provider, BaseLayer::Terrain);
    assert_eq!(terrain.get_max_zoom(), 17);
  }

  #[test]
  fn empty_config_falls_back_to_defaults() {
    let config: Config = serde_json::from_str("{}").unwrap();
    assert_eq!(config.base_layer(), BaseLayer::Street);
    assert_eq!(config.cluster_threshold(), 5);
    assert_eq!(config.timeline_start(), default_record_date());
    assert_eq!(
      TileProvider::lookup(&config.tile_provider, BaseLayer::Satellite),
      TileProvider::builtin(BaseLayer::Satellite)
    );
  }
}
