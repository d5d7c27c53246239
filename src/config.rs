//! Tagger configuration
//!
//! Loaded from TOML at startup, falls back to defaults if no config file exists.
//! Command-line flags and the `OMERO_GRAPH` environment variable override the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use omerotag_engine::DEFAULT_TAG_DESCRIPTION;

pub const DEFAULT_CONFIG_PATH: &str = "omerotag.toml";
pub const GRAPH_ENV: &str = "OMERO_GRAPH";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggerConfig {
    pub store: StoreConfig,
    pub report: ReportConfig,
    pub tags: TagConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Snapshot file backing the object graph.
    pub graph: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Dry-run CSV, appended to on every run.
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    /// Description given to tags the tagger creates.
    pub description: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("tags.csv"),
        }
    }
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            description: DEFAULT_TAG_DESCRIPTION.to_string(),
        }
    }
}

impl TaggerConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Graph location: flag, then environment, then file.
    pub fn graph_path(&self, flag: Option<&Path>, env: Option<String>) -> Option<PathBuf> {
        flag.map(Path::to_path_buf)
            .or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
            .or_else(|| self.store.graph.clone())
    }

    pub fn report_path(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .unwrap_or_else(|| self.report.path.clone())
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}
