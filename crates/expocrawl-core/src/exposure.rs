//! dbt exposures: lineage records linking a dashboard to the relations it reads

use crate::dashboard::{DashboardMetadata, Owner};
use crate::relation::{Relation, RelationKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Meta key holding the dashboard id an exposure was built from
pub const DASHBOARD_ID_META_KEY: &str = "dashboard_id";

/// Exposure type, as accepted by dbt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExposureType {
    Dashboard,
    Notebook,
    Analysis,
    Ml,
    Application,
}

impl Default for ExposureType {
    fn default() -> Self {
        Self::Dashboard
    }
}

/// Exposure maturity tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExposureMaturity {
    Low,
    Medium,
    High,
}

impl Default for ExposureMaturity {
    fn default() -> Self {
        Self::Medium
    }
}

impl fmt::Display for ExposureMaturity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(s)
    }
}

/// Exposure owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureOwner {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,
}

/// Upstream relations of an exposure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependsOn {
    #[serde(default)]
    pub macros: Vec<String>,

    /// Relation unique ids, without duplicates
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// A `ref()` target, in manifest form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefEntry {
    pub name: String,

    #[serde(default)]
    pub package: Option<String>,

    #[serde(default)]
    pub version: Option<String>,
}

/// Exposure config block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureConfig {
    pub enabled: bool,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// A lineage exposure, in the shape dbt stores it in `manifest.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exposure {
    pub name: String,

    pub resource_type: String,

    pub package_name: String,

    pub path: String,

    pub original_file_path: String,

    pub unique_id: String,

    pub fqn: Vec<String>,

    #[serde(rename = "type")]
    pub exposure_type: ExposureType,

    pub owner: ExposureOwner,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub maturity: Option<ExposureMaturity>,

    #[serde(default)]
    pub meta: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub config: ExposureConfig,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub depends_on: DependsOn,

    #[serde(default)]
    pub refs: Vec<RefEntry>,

    /// `[source_name, table]` pairs
    #[serde(default)]
    pub sources: Vec<Vec<String>>,

    #[serde(default)]
    pub metrics: Vec<Vec<String>>,

    #[serde(default)]
    pub created_at: Option<f64>,
}

impl Exposure {
    /// Build the exposure for one dashboard
    ///
    /// `relations` may hold the same relation several times (once per SQL
    /// source it was found in). The first occurrence of each unique id is
    /// kept and the order of first appearance is preserved.
    pub fn from_dashboard(
        package_name: &str,
        platform: &str,
        dashboard: &DashboardMetadata,
        owner: &Owner,
        relations: &[Arc<Relation>],
    ) -> Self {
        let relations = dedup_relations(relations);
        let name = exposure_name(&dashboard.name, &dashboard.id);
        let project = dashboard.project().unwrap_or("personal space");

        let mut description = dashboard
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| format!("{}\n\n", d))
            .unwrap_or_default();
        description.push_str(&format!(
            "{} workbook **{}** in project **{}**, owned by {}.",
            platform,
            dashboard.name,
            project,
            owner.display_name()
        ));

        let mut meta = BTreeMap::new();
        meta.insert(
            DASHBOARD_ID_META_KEY.to_string(),
            serde_json::Value::String(dashboard.id.clone()),
        );
        if let Some(project) = dashboard.project() {
            meta.insert(
                "project".to_string(),
                serde_json::Value::String(project.to_string()),
            );
        }
        meta.insert(
            "platform".to_string(),
            serde_json::Value::String(platform.to_string()),
        );

        let refs = relations
            .iter()
            .filter(|r| r.kind != RelationKind::Source)
            .map(|r| RefEntry {
                name: r.name.clone(),
                package: None,
                version: None,
            })
            .collect();

        let sources = relations
            .iter()
            .filter_map(|r| match (&r.kind, &r.source_name) {
                (RelationKind::Source, Some(source_name)) => {
                    Some(vec![source_name.clone(), r.name.clone()])
                }
                _ => None,
            })
            .collect();

        Self {
            unique_id: format!("exposure.{}.{}", package_name, name),
            fqn: vec![package_name.to_string(), name.clone()],
            path: format!("{}.yml", slugify(platform)),
            original_file_path: format!("models/exposures/{}.yml", slugify(platform)),
            resource_type: "exposure".to_string(),
            package_name: package_name.to_string(),
            exposure_type: ExposureType::Dashboard,
            owner: ExposureOwner {
                name: owner.display_name().to_string(),
                email: owner.email.clone().filter(|e| !e.is_empty()),
            },
            description,
            label: Some(dashboard.name.clone()),
            maturity: Some(ExposureMaturity::default()),
            meta,
            tags: vec![slugify(platform)],
            config: ExposureConfig::default(),
            url: dashboard.url.clone(),
            depends_on: DependsOn {
                macros: Vec::new(),
                nodes: relations.iter().map(|r| r.unique_id.clone()).collect(),
            },
            refs,
            sources,
            metrics: Vec::new(),
            created_at: None,
            name,
        }
    }

    pub fn with_maturity(mut self, maturity: ExposureMaturity) -> Self {
        self.maturity = Some(maturity);
        self
    }

    /// Replace the tag list (duplicates dropped, order kept)
    pub fn with_tags(mut self, tags: &[String]) -> Self {
        let mut seen = HashSet::new();
        self.tags = tags
            .iter()
            .filter(|t| seen.insert(t.as_str()))
            .cloned()
            .collect();
        self
    }

    /// Id of the dashboard this exposure describes, if recorded
    pub fn dashboard_id(&self) -> Option<&str> {
        self.meta
            .get(DASHBOARD_ID_META_KEY)
            .and_then(|v| v.as_str())
    }
}

/// Drop repeated relations, keeping the first occurrence of each unique id
pub fn dedup_relations(relations: &[Arc<Relation>]) -> Vec<Arc<Relation>> {
    let mut seen = HashSet::new();
    relations
        .iter()
        .filter(|r| seen.insert(r.unique_id.as_str()))
        .cloned()
        .collect()
}

/// Exposure name: slugified dashboard name plus a short, stable id suffix so
/// that dashboards sharing a name still get distinct exposures
pub fn exposure_name(dashboard_name: &str, dashboard_id: &str) -> String {
    let suffix: String = dashboard_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_ascii_lowercase();

    let slug = slugify(dashboard_name);
    match (slug.is_empty(), suffix.is_empty()) {
        (true, true) => "dashboard".to_string(),
        (true, false) => format!("dashboard_{}", suffix),
        (false, true) => slug,
        (false, false) => format!("{}_{}", slug, suffix),
    }
}

/// Lowercase, with every run of non-alphanumeric characters collapsed to `_`
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_sep = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }

    slug
}
