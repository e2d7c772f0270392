use std::{collections::HashSet, path::Path};

use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::map::{
  asset::{Asset, AssetId},
  layers::ShapefileLayer,
  store::MapStore,
};

const DEMO_PROJECT: &str = include_str!("../assets/demo_project.json");

#[derive(Error, Debug)]
pub enum ProjectError {
  #[error("failed to read project file: {0}")]
  Io(#[from] std::io::Error),
  #[error("invalid project document: {0}")]
  Json(#[from] serde_json::Error),
  #[error("asset id {0} is used more than once")]
  DuplicateAsset(AssetId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProjectStatus {
  #[default]
  Active,
  Completed,
  Planned,
  Archived,
}

/// A site with its assets and uploaded shapefile layers, as exchanged in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteProject {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub location: String,
  #[serde(default)]
  pub status: ProjectStatus,
  #[serde(default)]
  pub start_date: Option<NaiveDate>,
  #[serde(default)]
  pub assets: Vec<Asset>,
  #[serde(default)]
  pub shapefile_layers: Vec<ShapefileLayer>,
}

impl SiteProject {
  /// Parses a project. Shapefile layers of other projects are dropped.
  pub fn from_json(data: &str) -> Result<Self, ProjectError> {
    let mut project: SiteProject = serde_json::from_str(data)?;

    let mut seen = HashSet::new();
    if let Some(duplicate) = project.assets.iter().find(|a| !seen.insert(&a.id)) {
      return Err(ProjectError::DuplicateAsset(duplicate.id.clone()));
    }

    let id = project.id.clone();
    project.shapefile_layers.retain(|layer| {
      let own = layer.project_id == id;
      if !own {
        warn!(
          "dropping shapefile layer {} of project {}",
          layer.id, layer.project_id
        );
      }
      own
    });
    Ok(project)
  }

  pub fn load(path: &Path) -> Result<Self, ProjectError> {
    let project = Self::from_json(&std::fs::read_to_string(path)?)?;
    info!(
      "loaded project {} with {} assets and {} shapefile layers",
      project.name,
      project.assets.len(),
      project.shapefile_layers.len()
    );
    Ok(project)
  }

  /// The Paddington site shipped with the crate.
  pub fn demo() -> Result<Self, ProjectError> {
    Self::from_json(DEMO_PROJECT)
  }

  #[must_use]
  pub fn into_store(self) -> MapStore {
    MapStore::new(self.assets, self.shapefile_layers)
  }
}
