//! Warehouse relations tracked by the dbt manifest

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of manifest resource a relation was loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Model,
    Seed,
    Snapshot,
    Source,
}

impl RelationKind {
    /// Parse a manifest `resource_type`, returning `None` for resources that
    /// never materialize as a relation (tests, macros, analyses...)
    pub fn from_resource_type(resource_type: &str) -> Option<Self> {
        match resource_type {
            "model" => Some(Self::Model),
            "seed" => Some(Self::Seed),
            "snapshot" => Some(Self::Snapshot),
            "source" => Some(Self::Source),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Seed => "seed",
            Self::Snapshot => "snapshot",
            Self::Source => "source",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A table or view known to the pipeline manifest
///
/// Immutable once loaded. `relation_name` is the name the object has in the
/// warehouse (alias / identifier), which may differ from `display_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Stable manifest id (e.g., "model.jaffle_shop.orders")
    pub unique_id: String,

    /// Resource kind
    pub kind: RelationKind,

    /// Database name
    pub database: String,

    /// Schema name
    pub schema: String,

    /// Warehouse object name
    pub relation_name: String,

    /// Human-readable name (model name, or `source.table` for sources)
    pub display_name: String,

    /// dbt package that defines the relation
    #[serde(default)]
    pub package_name: String,

    /// Source name, for sources only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,

    /// Logical name inside the package (the argument to `ref()` / `source()`)
    #[serde(default)]
    pub name: String,
}

impl Relation {
    /// Create a model relation
    pub fn model(
        unique_id: impl Into<String>,
        database: impl Into<String>,
        schema: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            unique_id: unique_id.into(),
            kind: RelationKind::Model,
            database: database.into(),
            schema: schema.into(),
            relation_name: name.clone(),
            display_name: name.clone(),
            package_name: String::new(),
            source_name: None,
            name,
        }
    }

    /// Create a source relation
    pub fn source(
        unique_id: impl Into<String>,
        database: impl Into<String>,
        schema: impl Into<String>,
        source_name: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        let source_name = source_name.into();
        let table = table.into();
        Self {
            unique_id: unique_id.into(),
            kind: RelationKind::Source,
            database: database.into(),
            schema: schema.into(),
            relation_name: table.clone(),
            display_name: format!("{}.{}", source_name, table),
            package_name: String::new(),
            source_name: Some(source_name),
            name: table,
        }
    }

    /// Override the warehouse name (alias / identifier)
    pub fn with_relation_name(mut self, relation_name: impl Into<String>) -> Self {
        self.relation_name = relation_name.into();
        self
    }

    pub fn with_package(mut self, package_name: impl Into<String>) -> Self {
        self.package_name = package_name.into();
        self
    }

    /// Fully qualified warehouse name: `database.schema.relation`
    pub fn fqn(&self) -> String {
        format!("{}.{}.{}", self.database, self.schema, self.relation_name)
    }

    /// dbt Jinja expression referencing this relation, as used in the
    /// `depends_on` list of a properties file
    pub fn dbt_reference(&self) -> String {
        match (&self.kind, &self.source_name) {
            (RelationKind::Source, Some(source_name)) => {
                format!("source('{}', '{}')", source_name, self.name)
            }
            _ => format!("ref('{}')", self.name),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.fqn())
    }
}
