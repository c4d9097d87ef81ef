//! Relation lookup in SQL text
//!
//! The text is cut into identifier paths (`db.schema.table`, `alias.column`,
//! `orders`). A quoted segment (`"Order Items"`, `[dbo]`, `` `app-events` ``)
//! is kept whole, so spaces and punctuation inside quotes stay part of the
//! name. Every segment is unquoted, lowercased and looked up in the registry,
//! with the segments before it used as schema and database qualifiers. A name
//! only counts when it is a whole segment, so `orders` never matches inside
//! `stg_orders`.

use crate::registry::{normalize_identifier, RelationRegistry};
use expocrawl_core::{Relation, SqlSnippet};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::{Arc, LazyLock};

const SEGMENT: &str = r#""[^"]+"|`[^`]+`|\[[^\]]+\]|[\w$]+"#;

static IDENTIFIER_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?:{SEGMENT})(?:\s*\.\s*(?:{SEGMENT}))*")).expect("valid regex")
});

static PATH_SEGMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(SEGMENT).expect("valid regex"));

/// Relations found in one SQL text, keyed by unique id in first-seen order
pub type ModelMatches = IndexMap<String, Arc<Relation>>;

/// A snippet that could not be scanned
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("SQL snippet is not valid UTF-8: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),
}

/// Find every registered relation referenced by `sql`
///
/// Pure: repeated calls with the same inputs give the same result, and a
/// relation named several times is reported once.
pub fn find_models(sql: &str, registry: &RelationRegistry) -> ModelMatches {
    let mut found = ModelMatches::new();
    if registry.is_empty() || sql.trim().is_empty() {
        return found;
    }

    for path in IDENTIFIER_PATH.find_iter(sql) {
        let segments: Vec<String> = PATH_SEGMENT
            .find_iter(path.as_str())
            .map(|segment| normalize_identifier(segment.as_str()))
            .collect();

        for (i, segment) in segments.iter().enumerate() {
            let schema = i.checked_sub(1).map(|j| segments[j].as_str());
            let database = i.checked_sub(2).map(|j| segments[j].as_str());

            if let Some(relation) = registry.resolve(segment, schema, database) {
                found
                    .entry(relation.unique_id.clone())
                    .or_insert_with(|| Arc::clone(relation));
            }
        }
    }

    found
}

/// Registry-bound matcher
#[derive(Debug, Clone, Copy)]
pub struct SqlModelMatcher<'a> {
    registry: &'a RelationRegistry,
}

impl<'a> SqlModelMatcher<'a> {
    pub fn new(registry: &'a RelationRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'a RelationRegistry {
        self.registry
    }

    pub fn find_models(&self, sql: &str) -> ModelMatches {
        find_models(sql, self.registry)
    }

    /// Scan a raw snippet; fails only if the snippet is not text
    pub fn scan(&self, snippet: &SqlSnippet) -> Result<ModelMatches, ScanError> {
        let sql = snippet.text()?;
        Ok(self.find_models(sql))
    }
}
