//! Registry of known relations, indexed for name lookup

use expocrawl_core::Relation;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Errors raised while building the registry
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Relation {unique_id} has an empty {field}")]
    IncompleteRelation {
        unique_id: String,
        field: &'static str,
    },

    #[error("Relation {0} appears more than once")]
    DuplicateUniqueId(String),
}

/// Normalized qualifiers of a registered relation
#[derive(Debug, Clone)]
struct Qualifiers {
    database: String,
    schema: String,
}

/// Lookup of relations by normalized warehouse name
///
/// Built once per run and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct RelationRegistry {
    relations: Vec<Arc<Relation>>,
    qualifiers: Vec<Qualifiers>,
    by_name: HashMap<String, Vec<usize>>,
}

impl RelationRegistry {
    /// Build the registry from every model and source record
    pub fn build(relations: impl IntoIterator<Item = Relation>) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        let mut seen = HashSet::new();

        for relation in relations {
            for (field, value) in [
                ("unique_id", &relation.unique_id),
                ("database", &relation.database),
                ("schema", &relation.schema),
                ("relation_name", &relation.relation_name),
            ] {
                if value.trim().is_empty() {
                    return Err(RegistryError::IncompleteRelation {
                        unique_id: relation.unique_id.clone(),
                        field,
                    });
                }
            }

            if !seen.insert(relation.unique_id.clone()) {
                return Err(RegistryError::DuplicateUniqueId(relation.unique_id));
            }

            let index = registry.relations.len();
            registry
                .by_name
                .entry(normalize_identifier(&relation.relation_name))
                .or_default()
                .push(index);
            registry.qualifiers.push(Qualifiers {
                database: normalize_identifier(&relation.database),
                schema: normalize_identifier(&relation.schema),
            });
            registry.relations.push(Arc::new(relation));
        }

        tracing::debug!(relations = registry.len(), "Built relation registry");

        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Registered relations, in registration order
    pub fn relations(&self) -> impl Iterator<Item = &Arc<Relation>> {
        self.relations.iter()
    }

    /// Find a relation by unique id
    pub fn get(&self, unique_id: &str) -> Option<&Arc<Relation>> {
        self.relations.iter().find(|r| r.unique_id == unique_id)
    }

    /// Resolve a normalized name and its optional qualifiers to one relation
    ///
    /// Returns `None` when nothing fits or when more than one relation fits:
    /// an ambiguous reference credits nobody.
    pub fn resolve(
        &self,
        name: &str,
        schema: Option<&str>,
        database: Option<&str>,
    ) -> Option<&Arc<Relation>> {
        let candidates = self.by_name.get(name)?;

        let mut fitting = candidates.iter().filter(|&&index| {
            let qualifiers = &self.qualifiers[index];
            schema.map_or(true, |s| s == qualifiers.schema)
                && database.map_or(true, |d| d == qualifiers.database)
        });

        let first = *fitting.next()?;
        if fitting.next().is_some() {
            tracing::trace!(relation = name, "Ambiguous relation reference ignored");
            return None;
        }

        Some(&self.relations[first])
    }
}

/// Lowercase and strip identifier quoting
pub(crate) fn normalize_identifier(identifier: &str) -> String {
    identifier
        .trim()
        .chars()
        .filter(|c| !is_quote_char(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_quote_char(c: char) -> bool {
    matches!(c, '"' | '`' | '[' | ']')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders(schema: &str) -> Relation {
        Relation::model(
            format!("model.shop.{}_orders", schema.to_lowercase()),
            "ANALYTICS",
            schema,
            "orders",
        )
    }

    #[test]
    fn resolves_case_insensitively() {
        let registry = RelationRegistry::build(vec![orders("MARTS")]).unwrap();

        let found = registry.resolve("orders", None, None).unwrap();
        assert_eq!(found.unique_id, "model.shop.marts_orders");
        assert!(registry.resolve("orders", Some("marts"), Some("analytics")).is_some());
        assert!(registry.resolve("orders", Some("staging"), None).is_none());
        assert!(registry.resolve("customers", None, None).is_none());
    }

    #[test]
    fn shared_names_need_qualifiers() {
        let registry = RelationRegistry::build(vec![orders("MARTS"), orders("STAGING")]).unwrap();

        assert!(registry.resolve("orders", None, None).is_none());
        assert_eq!(
            registry.resolve("orders", Some("staging"), None).unwrap().unique_id,
            "model.shop.staging_orders"
        );
    }

    #[test]
    fn rejects_incomplete_relations() {
        let mut relation = orders("MARTS");
        relation.schema = String::new();

        match RelationRegistry::build(vec![relation]) {
            Err(RegistryError::IncompleteRelation { field, .. }) => assert_eq!(field, "schema"),
            other => panic!("expected IncompleteRelation, got {:?}", other),
        }
    }

    #[test]
    fn rejects_duplicate_ids() {
        let result = RelationRegistry::build(vec![orders("MARTS"), orders("MARTS")]);
        assert!(matches!(result, Err(RegistryError::DuplicateUniqueId(_))));
    }

    #[test]
    fn normalizes_quoted_identifiers() {
        assert_eq!(normalize_identifier("\"Orders\""), "orders");
        assert_eq!(normalize_identifier("[dbo]"), "dbo");
        assert_eq!(normalize_identifier("`Events`"), "events");
    }
}
