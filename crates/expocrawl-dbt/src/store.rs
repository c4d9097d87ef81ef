//! Manifest-backed relation source and exposure sink

use crate::manifest::{Manifest, ManifestError};
use crate::properties::PropertiesFile;
use expocrawl_core::{Exposure, OutputConfig, OutputFormat, Relation};
use std::path::{Path, PathBuf};

/// Errors raised while loading relations or persisting exposures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Failed to write {0}: {1}")]
    WriteError(String, String),
}

/// Where relations come from and where exposures go
///
/// The pipeline only talks to this trait, so tests can swap the manifest on
/// disk for anything that yields relations and accepts exposures.
pub trait ExposureStore {
    /// All relations known to the project
    fn load_relations(&self) -> Result<Vec<Relation>, StoreError>;

    /// Persist exposures, returning the path written
    fn write_exposures(&mut self, exposures: &[Exposure]) -> Result<PathBuf, StoreError>;
}

/// `ExposureStore` over a dbt manifest.json
pub struct ManifestStore {
    manifest: Manifest,
    manifest_path: PathBuf,
    output: OutputConfig,
}

impl ManifestStore {
    /// Load the manifest at `path`
    pub fn open(path: &Path, output: OutputConfig) -> Result<Self, StoreError> {
        let manifest = Manifest::from_file(path)?;
        Ok(Self::from_manifest(manifest, path, output))
    }

    pub fn from_manifest(manifest: Manifest, path: &Path, output: OutputConfig) -> Self {
        Self {
            manifest,
            manifest_path: path.to_path_buf(),
            output,
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Destination of `write_exposures`
    ///
    /// Manifest output overwrites the input manifest unless a destination is
    /// configured. Properties output defaults to `models/exposures/tableau.yml`
    /// next to the project root (two levels above `target/manifest.json`).
    pub fn output_path(&self) -> PathBuf {
        if let Some(destination) = &self.output.destination {
            return destination.clone();
        }

        match self.output.format {
            OutputFormat::Manifest => self.manifest_path.clone(),
            OutputFormat::Properties => self
                .manifest_path
                .parent()
                .and_then(Path::parent)
                .unwrap_or_else(|| Path::new(""))
                .join("models")
                .join("exposures")
                .join("tableau.yml"),
        }
    }
}

impl ExposureStore for ManifestStore {
    fn load_relations(&self) -> Result<Vec<Relation>, StoreError> {
        Ok(self.manifest.relations()?)
    }

    fn write_exposures(&mut self, exposures: &[Exposure]) -> Result<PathBuf, StoreError> {
        let path = self.output_path();

        match self.output.format {
            OutputFormat::Manifest => {
                for exposure in exposures {
                    self.manifest.add_exposure(exposure)?;
                }
                self.manifest.save_to_file(&path)?;
            }
            OutputFormat::Properties => {
                PropertiesFile::from_exposures(exposures)
                    .save_to_file(&path)
                    .map_err(|e| StoreError::WriteError(path.display().to_string(), e.to_string()))?;
            }
        }

        tracing::info!(
            exposures = exposures.len(),
            path = %path.display(),
            "Wrote exposures"
        );

        Ok(path)
    }
}
