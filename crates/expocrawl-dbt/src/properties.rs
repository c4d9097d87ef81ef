//! dbt properties file rendering (`version: 2` / `exposures:`)

use expocrawl_core::exposure::{ExposureMaturity, ExposureOwner, ExposureType};
use expocrawl_core::Exposure;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One exposure entry of a properties file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureProperties {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(rename = "type")]
    pub exposure_type: ExposureType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maturity: Option<ExposureMaturity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default)]
    pub description: String,

    /// `ref('...')` / `source('...', '...')` expressions
    pub depends_on: Vec<String>,

    pub owner: ExposureOwner,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, serde_json::Value>,
}

impl From<&Exposure> for ExposureProperties {
    fn from(exposure: &Exposure) -> Self {
        let refs = exposure
            .refs
            .iter()
            .map(|r| format!("ref('{}')", r.name));
        let sources = exposure
            .sources
            .iter()
            .filter_map(|pair| match pair.as_slice() {
                [source_name, table] => Some(format!("source('{}', '{}')", source_name, table)),
                _ => None,
            });

        Self {
            name: exposure.name.clone(),
            label: exposure.label.clone(),
            exposure_type: exposure.exposure_type,
            maturity: exposure.maturity,
            url: exposure.url.clone(),
            description: exposure.description.clone(),
            depends_on: refs.chain(sources).collect(),
            owner: exposure.owner.clone(),
            tags: exposure.tags.clone(),
            meta: exposure.meta.clone(),
        }
    }
}

/// A dbt properties document holding exposures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertiesFile {
    pub version: u32,

    pub exposures: Vec<ExposureProperties>,
}

impl PropertiesFile {
    pub fn from_exposures(exposures: &[Exposure]) -> Self {
        Self {
            version: 2,
            exposures: exposures.iter().map(ExposureProperties::from).collect(),
        }
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Write the document, creating parent directories as needed
    pub fn save_to_file(&self, path: &Path) -> Result<(), PropertiesError> {
        let yaml = self.to_yaml()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, yaml)?;
        Ok(())
    }
}

/// Errors writing a properties file
#[derive(Debug, thiserror::Error)]
pub enum PropertiesError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML serialization error: {0}")]
    SerializeError(#[from] serde_yaml::Error),
}
