//! dbt artifact handling
//!
//! This crate handles:
//! - Parsing and re-serializing manifest.json without losing unknown fields
//! - Extracting the relations (models, seeds, snapshots, sources) it tracks
//! - Registering exposures into the manifest, idempotently
//! - Rendering exposures as a dbt properties file

pub mod manifest;
pub mod properties;
pub mod store;

pub use manifest::{Manifest, ManifestError, ManifestMetadata, ManifestNode, ManifestSource, NodeConfig};
pub use properties::{ExposureProperties, PropertiesError, PropertiesFile};
pub use store::{ExposureStore, ManifestStore, StoreError};
