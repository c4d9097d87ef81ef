//! dbt manifest.json parsing
//!
//! Only the fields the crawler reads are typed. Everything else is kept in
//! flattened `extra` maps so that saving the manifest writes back what was
//! loaded, plus the registered exposures.

use expocrawl_core::{Exposure, Relation, RelationKind};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// dbt manifest.json structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Metadata about the manifest
    #[serde(default)]
    pub metadata: ManifestMetadata,

    /// Model, seed, snapshot and test nodes
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: BTreeMap<String, ManifestNode>,

    /// Source definitions
    #[serde(default, deserialize_with = "null_as_default")]
    pub sources: BTreeMap<String, ManifestSource>,

    /// Exposures, kept as raw JSON so hand-written ones survive untouched
    #[serde(default, deserialize_with = "null_as_default")]
    pub exposures: BTreeMap<String, Value>,

    /// Parent map (node -> list of parent nodes)
    #[serde(default, deserialize_with = "null_as_default")]
    pub parent_map: BTreeMap<String, Vec<String>>,

    /// Child map (node -> list of child nodes)
    #[serde(default, deserialize_with = "null_as_default")]
    pub child_map: BTreeMap<String, Vec<String>>,

    /// Remaining top-level sections (macros, docs, metrics, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Manifest {
    /// Load manifest from file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ManifestError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_str(&contents)
    }

    /// Parse manifest from JSON string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(json)
            .map_err(|e| ManifestError::ParseError(e.to_string()))
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, ManifestError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ManifestError::SerializeError(e.to_string()))
    }

    /// Write the manifest to `path`
    pub fn save_to_file(&self, path: &Path) -> Result<(), ManifestError> {
        let json = self.to_json()?;
        std::fs::write(path, json)
            .map_err(|e| ManifestError::IoError(path.display().to_string(), e.to_string()))
    }

    /// Name of the root dbt project, when the manifest records it
    pub fn project_name(&self) -> Option<&str> {
        self.metadata.project_name.as_deref().filter(|n| !n.is_empty())
    }

    /// All relations the warehouse holds for this project
    ///
    /// Enabled models, seeds and snapshots (ephemeral models excluded) followed
    /// by enabled sources, each group in unique-id order. Fails on the first
    /// record that lacks a database or schema.
    pub fn relations(&self) -> Result<Vec<Relation>, ManifestError> {
        let mut relations = Vec::new();

        for node in self.nodes.values() {
            let Some(kind) = RelationKind::from_resource_type(&node.resource_type) else {
                continue;
            };
            if !node.config.enabled || node.is_ephemeral() {
                continue;
            }
            relations.push(node.to_relation(kind)?);
        }

        for source in self.sources.values() {
            if !source.config.enabled {
                continue;
            }
            relations.push(source.to_relation()?);
        }

        Ok(relations)
    }

    /// Get a registered exposure by unique_id
    pub fn get_exposure(&self, unique_id: &str) -> Option<&Value> {
        self.exposures.get(unique_id)
    }

    /// Register an exposure, replacing any exposure previously generated for
    /// the same dashboard, and link it into the parent/child maps
    pub fn add_exposure(&mut self, exposure: &Exposure) -> Result<(), ManifestError> {
        let value = serde_json::to_value(exposure)
            .map_err(|e| ManifestError::SerializeError(e.to_string()))?;

        let stale: Vec<String> = self
            .exposures
            .iter()
            .filter(|(id, existing)| {
                *id == &exposure.unique_id
                    || (exposure.dashboard_id().is_some()
                        && existing_dashboard_id(existing) == exposure.dashboard_id())
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            self.remove_exposure(id);
        }

        let exposure_id = exposure.unique_id.clone();
        for dep in &exposure.depends_on.nodes {
            let children = self.child_map.entry(dep.clone()).or_default();
            if !children.contains(&exposure_id) {
                children.push(exposure_id.clone());
            }
        }
        self.parent_map
            .insert(exposure_id.clone(), exposure.depends_on.nodes.clone());
        self.child_map.entry(exposure_id.clone()).or_default();
        self.exposures.insert(exposure_id, value);

        Ok(())
    }

    /// Remove an exposure and every map entry pointing at it
    pub fn remove_exposure(&mut self, unique_id: &str) -> Option<Value> {
        let removed = self.exposures.remove(unique_id)?;

        self.parent_map.remove(unique_id);
        self.child_map.remove(unique_id);
        for children in self.child_map.values_mut() {
            children.retain(|child| child != unique_id);
        }

        Some(removed)
    }
}

fn existing_dashboard_id(exposure: &Value) -> Option<&str> {
    exposure
        .get("meta")
        .and_then(|meta| meta.get(expocrawl_core::exposure::DASHBOARD_ID_META_KEY))
        .and_then(Value::as_str)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Manifest metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    #[serde(default)]
    pub dbt_schema_version: String,

    #[serde(default)]
    pub dbt_version: String,

    #[serde(default)]
    pub generated_at: String,

    #[serde(default)]
    pub invocation_id: Option<String>,

    #[serde(default)]
    pub project_name: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A node in the manifest (model, seed, snapshot, test, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestNode {
    /// Unique identifier (e.g., "model.my_project.users")
    pub unique_id: String,

    /// Node name (e.g., "users")
    pub name: String,

    /// Resource type (model, test, snapshot, etc.)
    pub resource_type: String,

    /// Package name
    #[serde(default)]
    pub package_name: String,

    /// Database name
    #[serde(default)]
    pub database: Option<String>,

    /// Schema name
    #[serde(default)]
    pub schema: Option<String>,

    /// Alias (output table name)
    #[serde(default)]
    pub alias: Option<String>,

    /// Node configuration
    #[serde(default)]
    pub config: NodeConfig,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ManifestNode {
    pub fn is_ephemeral(&self) -> bool {
        self.config.materialized.as_deref() == Some("ephemeral")
    }

    fn to_relation(&self, kind: RelationKind) -> Result<Relation, ManifestError> {
        let database = required(&self.unique_id, "database", self.database.as_deref())?;
        let schema = required(&self.unique_id, "schema", self.schema.as_deref())?;
        let relation_name = self
            .alias
            .as_deref()
            .filter(|alias| !alias.is_empty())
            .unwrap_or(&self.name);

        Ok(Relation {
            unique_id: self.unique_id.clone(),
            kind,
            database: database.to_string(),
            schema: schema.to_string(),
            relation_name: relation_name.to_string(),
            display_name: self.name.clone(),
            package_name: self.package_name.clone(),
            source_name: None,
            name: self.name.clone(),
        })
    }
}

/// Node configuration (from dbt_project.yml or model config)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Whether the node is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Materialization type
    #[serde(default)]
    pub materialized: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            materialized: None,
            extra: Map::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// A source in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestSource {
    /// Unique identifier (e.g., "source.my_project.raw.users")
    pub unique_id: String,

    /// Source name (e.g., "raw")
    pub source_name: String,

    /// Table name (e.g., "users")
    pub name: String,

    #[serde(default)]
    pub package_name: String,

    /// Database name
    #[serde(default)]
    pub database: Option<String>,

    /// Schema name
    #[serde(default)]
    pub schema: Option<String>,

    /// Identifier (actual table name)
    #[serde(default)]
    pub identifier: Option<String>,

    #[serde(default)]
    pub config: NodeConfig,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ManifestSource {
    fn to_relation(&self) -> Result<Relation, ManifestError> {
        let database = required(&self.unique_id, "database", self.database.as_deref())?;
        let schema = required(&self.unique_id, "schema", self.schema.as_deref())?;
        let relation_name = self
            .identifier
            .as_deref()
            .filter(|identifier| !identifier.is_empty())
            .unwrap_or(&self.name);

        Ok(Relation {
            unique_id: self.unique_id.clone(),
            kind: RelationKind::Source,
            database: database.to_string(),
            schema: schema.to_string(),
            relation_name: relation_name.to_string(),
            display_name: format!("{}.{}", self.source_name, self.name),
            package_name: self.package_name.clone(),
            source_name: Some(self.source_name.clone()),
            name: self.name.clone(),
        })
    }
}

fn required<'a>(
    unique_id: &str,
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, ManifestError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ManifestError::MissingField {
            unique_id: unique_id.to_string(),
            field,
        })
}

/// Manifest parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read manifest file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse manifest JSON: {0}")]
    ParseError(String),

    #[error("Failed to serialize manifest: {0}")]
    SerializeError(String),

    #[error("Manifest record {unique_id} has no {field}")]
    MissingField {
        unique_id: String,
        field: &'static str,
    },
}
