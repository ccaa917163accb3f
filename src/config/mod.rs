use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const DEFAULT_GEOCODER_URL: &str =
    "https://geodata.md.gov/imap/rest/services/GeocodeServices/MD_CompositeLocator/GeocodeServer";

fn default_timeout_secs() -> u64 {
    30
}
fn default_geocoder_url() -> String {
    DEFAULT_GEOCODER_URL.to_string()
}
fn default_reverse_distance_m() -> f64 {
    100.0
}
fn default_max_locations() -> u32 {
    10
}
fn default_page_size() -> u64 {
    1000
}

/// Settings file, e.g. `mdgeo.toml`:
///
/// ```toml
/// timeout_secs = 30
///
/// [geocoder]
/// reverse_distance_m = 250
///
/// [socrata]
/// app_token = "..."
/// ```
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FileConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub socrata: SocrataConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            geocoder: GeocoderConfig::default(),
            socrata: SocrataConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GeocoderConfig {
    #[serde(default = "default_geocoder_url")]
    pub base_url: String,
    /// Search radius for reverse lookups when the caller gives none
    #[serde(default = "default_reverse_distance_m")]
    pub reverse_distance_m: f64,
    #[serde(default = "default_max_locations")]
    pub max_locations: u32,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoder_url(),
            reverse_distance_m: default_reverse_distance_m(),
            max_locations: default_max_locations(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SocrataConfig {
    #[serde(default)]
    pub app_token: Option<String>,
    /// Rows per request for paged queries
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

impl Default for SocrataConfig {
    fn default() -> Self {
        Self {
            app_token: None,
            page_size: default_page_size(),
        }
    }
}

impl FileConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidInput(format!("failed to read config file {}: {e}", path.display()))
        })?;
        toml::from_str(&contents).map_err(|e| {
            Error::Parse(format!("failed to parse config file {}: {e}", path.display()))
        })
    }

    /// First parseable config file on the search path, if any
    pub fn load() -> Option<Self> {
        Self::load_from(&get_config_paths())
    }

    fn load_from(paths: &[PathBuf]) -> Option<Self> {
        for path in paths {
            if !path.exists() {
                continue;
            }
            match Self::from_path(path) {
                Ok(config) => {
                    debug!(path = %path.display(), "loaded config file");
                    return Some(config);
                }
                Err(e) => warn!("skipping config file: {e}"),
            }
        }
        None
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("mdgeo.toml"), PathBuf::from(".mdgeo.toml")];

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("mdgeo").join("config.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".mdgeo.toml"));
    }

    paths
}
