//! Pipeline configuration.
//!
//! Settings are read from a TOML file and then selectively overridden from
//! the environment. Every field has a default, so an empty file (or no file
//! at all) yields a usable configuration once the event is specified.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::broker::{alerce, catshtm};
use crate::services::cosmology::Cosmology;
use crate::services::region::HemisphereMask;
use crate::skymap::loader::DEFAULT_MAX_ORDER;

pub const CONFIG_FILE_NAME: &str = "gw-followup.toml";

/// Environment variable naming an explicit config file.
pub const ENV_CONFIG_PATH: &str = "GW_FOLLOWUP_CONFIG";
pub const ENV_SKYMAP_URL: &str = "GW_SKYMAP_URL";
pub const ENV_TRIGGER_MJD: &str = "GW_TRIGGER_MJD";
pub const ENV_ALERCE_URL: &str = "ALERCE_API_URL";
pub const ENV_CATSHTM_URL: &str = "CATSHTM_API_URL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("No {0} found in standard locations")]
    NotFound(&'static str),

    #[error("Invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub event: EventSettings,
    #[serde(default)]
    pub region: RegionSettings,
    #[serde(default)]
    pub window: WindowSettings,
    #[serde(default)]
    pub query: QuerySettings,
    #[serde(default)]
    pub stellar: StellarSettings,
    #[serde(default)]
    pub crossmatch: CrossmatchSettings,
    #[serde(default)]
    pub distance: DistanceSettings,
    #[serde(default)]
    pub cosmology: Cosmology,
    #[serde(default)]
    pub broker: BrokerSettings,
    #[serde(default)]
    pub skymap: SkymapSettings,
}

/// The gravitational-wave event under study.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSettings {
    /// Event label used in logs and output.
    #[serde(default)]
    pub name: Option<String>,
    /// Sky-map URL or local path.
    #[serde(default)]
    pub skymap: Option<String>,
    /// Merger epoch. Falls back to the map's `MJD-OBS`/`DATE-OBS` header.
    #[serde(default)]
    pub trigger_mjd: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSettings {
    /// Credible masses to extract, reported in the output.
    #[serde(default = "default_masses")]
    pub masses: Vec<f64>,
    /// Mass whose region drives the cone query.
    #[serde(default = "default_query_mass")]
    pub query_mass: f64,
    #[serde(default)]
    pub hemisphere: HemisphereMask,
    /// Drop candidates outside the query region's cells.
    #[serde(default = "default_true")]
    pub require_in_region: bool,
}

impl Default for RegionSettings {
    fn default() -> Self {
        Self {
            masses: default_masses(),
            query_mass: default_query_mass(),
            hemisphere: HemisphereMask::default(),
            require_in_region: true,
        }
    }
}

/// First-detection window, in days relative to the trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSettings {
    #[serde(default)]
    pub start_offset_days: f64,
    #[serde(default = "default_end_offset")]
    pub end_offset_days: f64,
    /// Re-query with this end offset when the first query finds nothing.
    #[serde(default)]
    pub extended_end_offset_days: Option<f64>,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            start_offset_days: 0.0,
            end_offset_days: default_end_offset(),
            extended_end_offset_days: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySettings {
    #[serde(default = "default_min_detections")]
    pub min_detections: u32,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            min_detections: default_min_detections(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StellarSettings {
    /// Objects with a point-source score above this are treated as stars.
    #[serde(default = "default_sgscore_threshold")]
    pub sgscore_threshold: f64,
}

impl Default for StellarSettings {
    fn default() -> Self {
        Self {
            sgscore_threshold: default_sgscore_threshold(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossmatchSettings {
    #[serde(default = "default_catalog")]
    pub catalog: String,
    #[serde(default = "default_match_radius")]
    pub radius_arcsec: f64,
    /// Lookups in flight at once; 1 means sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "catshtm::default_name_columns")]
    pub name_columns: Vec<String>,
    #[serde(default = "default_redshift_column")]
    pub redshift_column: String,
    #[serde(default = "default_separation_column")]
    pub separation_column: String,
}

impl Default for CrossmatchSettings {
    fn default() -> Self {
        Self {
            catalog: default_catalog(),
            radius_arcsec: default_match_radius(),
            concurrency: default_concurrency(),
            name_columns: catshtm::default_name_columns(),
            redshift_column: default_redshift_column(),
            separation_column: default_separation_column(),
        }
    }
}

impl CrossmatchSettings {
    pub fn columns(&self) -> catshtm::ColumnNames {
        catshtm::ColumnNames {
            name: self.name_columns.clone(),
            redshift: self.redshift_column.clone(),
            separation: self.separation_column.clone(),
        }
    }
}

/// Luminosity-distance window. Explicit bounds take precedence over the
/// map-derived `mean ± n_sigma·std`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceSettings {
    #[serde(default)]
    pub low_mpc: Option<f64>,
    #[serde(default)]
    pub high_mpc: Option<f64>,
    #[serde(default = "default_n_sigma")]
    pub n_sigma: f64,
    /// Use each candidate's own pixel `distmu ± n_sigma·distsigma` instead of
    /// the map-wide summary, when the map carries a distance layer.
    #[serde(default)]
    pub per_pixel: bool,
}

impl Default for DistanceSettings {
    fn default() -> Self {
        Self {
            low_mpc: None,
            high_mpc: None,
            n_sigma: default_n_sigma(),
            per_pixel: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerSettings {
    #[serde(default = "default_alerce_url")]
    pub alerce_url: String,
    #[serde(default = "default_stamps_url")]
    pub stamps_url: String,
    #[serde(default = "default_catshtm_url")]
    pub catshtm_url: String,
    #[serde(default = "default_broker_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Searches with more pages than this fail instead of truncating.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            alerce_url: default_alerce_url(),
            stamps_url: default_stamps_url(),
            catshtm_url: default_catshtm_url(),
            timeout_secs: default_broker_timeout(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
        }
    }
}

impl BrokerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkymapSettings {
    /// Multi-order maps are flattened to at most this order.
    #[serde(default = "default_max_order")]
    pub max_order: u32,
    #[serde(default = "default_download_timeout")]
    pub timeout_secs: u64,
}

impl Default for SkymapSettings {
    fn default() -> Self {
        Self {
            max_order: default_max_order(),
            timeout_secs: default_download_timeout(),
        }
    }
}

fn default_masses() -> Vec<f64> {
    vec![0.5, 0.9]
}

fn default_query_mass() -> f64 {
    0.9
}

fn default_true() -> bool {
    true
}

fn default_end_offset() -> f64 {
    14.0
}

fn default_min_detections() -> u32 {
    2
}

fn default_sgscore_threshold() -> f64 {
    0.5
}

fn default_catalog() -> String {
    "GWGC".to_string()
}

fn default_match_radius() -> f64 {
    30.0
}

fn default_concurrency() -> usize {
    1
}

fn default_redshift_column() -> String {
    "z".to_string()
}

fn default_separation_column() -> String {
    "Dist".to_string()
}

fn default_n_sigma() -> f64 {
    2.0
}

fn default_alerce_url() -> String {
    alerce::DEFAULT_API_URL.to_string()
}

fn default_stamps_url() -> String {
    alerce::DEFAULT_STAMPS_URL.to_string()
}

fn default_catshtm_url() -> String {
    catshtm::DEFAULT_API_URL.to_string()
}

fn default_broker_timeout() -> u64 {
    60
}

fn default_page_size() -> u32 {
    1000
}

fn default_max_pages() -> u32 {
    alerce::DEFAULT_MAX_PAGES
}

fn default_max_order() -> u32 {
    DEFAULT_MAX_ORDER
}

fn default_download_timeout() -> u64 {
    120
}

fn in_unit_interval(v: f64) -> bool {
    v > 0.0 && v <= 1.0
}

fn positive(v: f64) -> bool {
    v > 0.0
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from the default location.
    ///
    /// Searches for `gw-followup.toml` in:
    /// 1. Current directory
    /// 2. `backend/` directory
    /// 3. Parent directory
    pub fn from_default_location() -> Result<Self, ConfigError> {
        let search_paths = [
            PathBuf::from(CONFIG_FILE_NAME),
            PathBuf::from("backend").join(CONFIG_FILE_NAME),
            PathBuf::from("..").join(CONFIG_FILE_NAME),
        ];

        for path in search_paths {
            if path.exists() {
                log::info!("Using configuration {}", path.display());
                return Self::from_file(&path);
            }
        }

        Err(ConfigError::NotFound(CONFIG_FILE_NAME))
    }

    /// Resolve the configuration the way the command-line runner does:
    /// `GW_FOLLOWUP_CONFIG`, else the default locations, else built-in
    /// defaults; then environment overrides; then validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(ENV_CONFIG_PATH) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => match Self::from_default_location() {
                Ok(config) => config,
                Err(ConfigError::NotFound(_)) => {
                    log::info!("No {} found, using defaults", CONFIG_FILE_NAME);
                    Self::default()
                }
                Err(e) => return Err(e),
            },
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SKYMAP_URL) {
            self.event.skymap = Some(url);
        }
        if let Some(value) = lookup(ENV_TRIGGER_MJD) {
            let mjd = value.trim().parse::<f64>().map_err(|_| ConfigError::Env {
                var: ENV_TRIGGER_MJD,
                value: value.clone(),
            })?;
            self.event.trigger_mjd = Some(mjd);
        }
        if let Some(url) = lookup(ENV_ALERCE_URL) {
            self.broker.alerce_url = url;
        }
        if let Some(url) = lookup(ENV_CATSHTM_URL) {
            self.broker.catshtm_url = url;
        }
        Ok(())
    }

    /// Reject out-of-range settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.region.masses.is_empty() {
            return invalid("region.masses must not be empty".to_string());
        }
        if let Some(m) = self.region.masses.iter().find(|m| !in_unit_interval(**m)) {
            return invalid(format!("region.masses entry {} is outside (0, 1]", m));
        }
        if !in_unit_interval(self.region.query_mass) {
            return invalid(format!("region.query_mass {} is outside (0, 1]", self.region.query_mass));
        }
        if let HemisphereMask::DeclinationBand { min_deg, max_deg } = self.region.hemisphere {
            if min_deg.is_nan() || max_deg.is_nan() || min_deg >= max_deg || min_deg < -90.0 || max_deg > 90.0 {
                return invalid(format!("declination band ({}, {}] is empty or off the sky", min_deg, max_deg));
            }
        }
        if self.window.end_offset_days <= self.window.start_offset_days {
            return invalid("window.end_offset_days must exceed start_offset_days".to_string());
        }
        if let Some(extended) = self.window.extended_end_offset_days {
            if extended <= self.window.end_offset_days {
                return invalid("window.extended_end_offset_days must exceed end_offset_days".to_string());
            }
        }
        if !(0.0..=1.0).contains(&self.stellar.sgscore_threshold) {
            return invalid(format!(
                "stellar.sgscore_threshold {} is outside [0, 1]",
                self.stellar.sgscore_threshold
            ));
        }
        if !positive(self.crossmatch.radius_arcsec) {
            return invalid("crossmatch.radius_arcsec must be positive".to_string());
        }
        if self.crossmatch.concurrency == 0 {
            return invalid("crossmatch.concurrency must be at least 1".to_string());
        }
        if self.crossmatch.name_columns.is_empty() {
            return invalid("crossmatch.name_columns must not be empty".to_string());
        }
        if let (Some(low), Some(high)) = (self.distance.low_mpc, self.distance.high_mpc) {
            if low < 0.0 || high < low {
                return invalid(format!("distance window [{}, {}] is invalid", low, high));
            }
        }
        if !positive(self.distance.n_sigma) {
            return invalid("distance.n_sigma must be positive".to_string());
        }
        if !positive(self.cosmology.h0) {
            return invalid("cosmology.h0 must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.cosmology.omega_m) {
            return invalid("cosmology.omega_m must lie in [0, 1]".to_string());
        }
        if self.broker.page_size == 0 || self.broker.max_pages == 0 || self.broker.timeout_secs == 0 {
            return invalid(
                "broker.page_size, broker.max_pages and broker.timeout_secs must be positive".to_string(),
            );
        }
        if self.skymap.max_order > 29 {
            return invalid(format!("skymap.max_order {} exceeds 29", self.skymap.max_order));
        }
        Ok(())
    }
}
