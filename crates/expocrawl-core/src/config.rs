//! Configuration schema (expocrawl.toml)

use crate::exposure::ExposureMaturity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "expocrawl.toml";

/// How exposures are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Register exposures into manifest.json
    Manifest,

    /// Write a dbt properties file (`version: 2`, `exposures:`)
    Properties,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Manifest
    }
}

/// Where and how results are written
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output path; defaults to overwriting the input manifest
    #[serde(default)]
    pub destination: Option<PathBuf>,

    #[serde(default)]
    pub format: OutputFormat,
}

/// Values stamped onto every generated exposure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureDefaults {
    #[serde(default)]
    pub maturity: ExposureMaturity,

    #[serde(default = "default_tags")]
    pub tags: Vec<String>,
}

fn default_tags() -> Vec<String> {
    vec!["tableau".to_string()]
}

impl Default for ExposureDefaults {
    fn default() -> Self {
        Self {
            maturity: ExposureMaturity::default(),
            tags: default_tags(),
        }
    }
}

/// What to do when fetching metadata for one dashboard fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchErrorPolicy {
    /// Log the failure and continue with the remaining dashboards
    Skip,

    /// Abort the whole run
    Abort,
}

impl Default for FetchErrorPolicy {
    fn default() -> Self {
        Self::Skip
    }
}

/// Tableau connection settings
///
/// Credentials are not part of the file; they are read from the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableauConfig {
    /// Server URL (e.g., "https://tableau.example.com")
    #[serde(default)]
    pub server_url: Option<String>,

    /// Site content URL ("" for the default site)
    #[serde(default)]
    pub site: Option<String>,

    /// REST API version
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Only SQL running against this connection type is scanned
    #[serde(default = "default_connection_type")]
    pub connection_type: String,

    /// Metadata API page size
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Timeout applied to every platform call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Upper bound on concurrent dashboard metadata fetches
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    #[serde(default)]
    pub on_fetch_error: FetchErrorPolicy,
}

fn default_api_version() -> String {
    "3.19".to_string()
}

fn default_connection_type() -> String {
    "snowflake".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_concurrent_requests() -> usize {
    4
}

impl Default for TableauConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            site: None,
            api_version: default_api_version(),
            connection_type: default_connection_type(),
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout(),
            max_concurrent_requests: default_max_concurrent_requests(),
            on_fetch_error: FetchErrorPolicy::default(),
        }
    }
}

impl TableauConfig {
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Debug-level logging
    #[serde(default)]
    pub verbose: bool,

    /// dbt package the exposures belong to; defaults to the manifest's project
    #[serde(default)]
    pub dbt_package_name: Option<String>,

    /// Dashboard projects whose dashboards never produce exposures
    #[serde(default)]
    pub ignored_projects: BTreeSet<String>,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub exposures: ExposureDefaults,

    #[serde(default)]
    pub tableau: TableauConfig,
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(toml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(path.display().to_string(), e.to_string()))?;

        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tableau.max_concurrent_requests == 0 {
            return Err(ConfigError::InvalidValue(
                "tableau.max_concurrent_requests must be at least 1".to_string(),
            ));
        }

        if self.tableau.page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "tableau.page_size must be at least 1".to_string(),
            ));
        }

        if self.tableau.connection_type.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "tableau.connection_type must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether dashboards in `project` are ignored by name
    pub fn is_project_ignored(&self, project: &str) -> bool {
        self.ignored_projects.contains(project)
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    IoError(String, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid configuration: {0}")]
    InvalidValue(String),
}
