//! Dashboards, their embedded SQL and the metadata fetched for them

use crate::relation::Relation;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identifier + display name of a dashboard
///
/// Used as the map key throughout the pipeline. Equality and hashing only
/// consider `id`: two dashboards may share a name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardRef {
    pub id: String,
    pub name: String,
}

impl DashboardRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl PartialEq for DashboardRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DashboardRef {}

impl Hash for DashboardRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for DashboardRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// How a SQL snippet was authored inside a dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlSourceKind {
    /// Hand-written SQL embedded in a data source
    Custom,
    /// Query generated by the platform against a connected table
    Native,
}

impl SqlSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Custom => "custom",
            Self::Native => "native",
        }
    }
}

impl fmt::Display for SqlSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One query string extracted from a dashboard
///
/// Kept as raw bytes: the platform may hand back text that is not valid
/// UTF-8, which only makes that snippet unscannable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlSnippet {
    bytes: Vec<u8>,
}

impl SqlSnippet {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into() }
    }

    /// The snippet as text
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<String> for SqlSnippet {
    fn from(sql: String) -> Self {
        Self { bytes: sql.into_bytes() }
    }
}

impl From<&str> for SqlSnippet {
    fn from(sql: &str) -> Self {
        Self::from(sql.to_string())
    }
}

/// Dashboard reference -> SQL snippets, for one SQL source kind
pub type SnippetsByDashboard = IndexMap<DashboardRef, Vec<SqlSnippet>>;

/// Dashboard reference -> relations found in its snippets
///
/// Lists may contain the same relation more than once; dedup happens when
/// the exposure is built.
pub type DashboardMatches = IndexMap<DashboardRef, Vec<Arc<Relation>>>;

/// Metadata fetched from the platform for a matched dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardMetadata {
    pub id: String,

    pub name: String,

    /// Owning project; `None` means the dashboard lives in a personal space
    #[serde(default)]
    pub project_name: Option<String>,

    pub owner_id: String,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

impl DashboardMetadata {
    /// Project name, treating an empty name as absent
    pub fn project(&self) -> Option<&str> {
        self.project_name.as_deref().filter(|name| !name.is_empty())
    }

    pub fn is_personal_space(&self) -> bool {
        self.project().is_none()
    }

    pub fn reference(&self) -> DashboardRef {
        DashboardRef::new(self.id.clone(), self.name.clone())
    }
}

/// Dashboard owner as known to the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,

    /// Login name
    pub name: String,

    #[serde(default)]
    pub full_name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,
}

impl Owner {
    /// Best human-readable name: full name when set, login otherwise
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.name)
    }
}
