//! Union of per-source matches

use expocrawl_core::DashboardMatches;

/// Merge two per-source match maps by dashboard id
///
/// Keys keep first-seen order (all of `a`, then the new keys of `b`). For a
/// dashboard in both inputs the lists are concatenated, `a` first. Repeated
/// relations are left in place.
pub fn merge(a: DashboardMatches, b: DashboardMatches) -> DashboardMatches {
    let (len_a, len_b) = (a.len(), b.len());
    let mut merged = a;

    for (dashboard, relations) in b {
        merged.entry(dashboard).or_default().extend(relations);
    }

    tracing::info!(
        "Results merged: {} + {} = {} dashboards",
        len_a,
        len_b,
        merged.len()
    );

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use expocrawl_core::{DashboardRef, Relation};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn relation(id: &str) -> Arc<Relation> {
        Arc::new(Relation::model(id, "DB", "SCHEMA", id))
    }

    fn matches(entries: Vec<(&str, Vec<&str>)>) -> DashboardMatches {
        entries
            .into_iter()
            .map(|(dashboard, ids)| {
                (
                    DashboardRef::new(dashboard, dashboard),
                    ids.into_iter().map(relation).collect(),
                )
            })
            .collect()
    }

    fn flatten(merged: &DashboardMatches) -> Vec<(String, Vec<String>)> {
        merged
            .iter()
            .map(|(d, relations)| {
                (
                    d.id.clone(),
                    relations.iter().map(|r| r.unique_id.clone()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn union_of_keys_with_a_then_b_lists() {
        let custom = matches(vec![("dash_a", vec!["m1"]), ("dash_c", vec!["m1", "m2"])]);
        let native = matches(vec![("dash_c", vec!["m1"]), ("dash_d", vec!["m3"])]);

        let merged = merge(custom, native);

        assert_eq!(
            flatten(&merged),
            vec![
                ("dash_a".to_string(), vec!["m1".to_string()]),
                (
                    "dash_c".to_string(),
                    vec!["m1".to_string(), "m2".to_string(), "m1".to_string()]
                ),
                ("dash_d".to_string(), vec!["m3".to_string()]),
            ]
        );
    }

    #[test]
    fn membership_is_commutative() {
        let a = || matches(vec![("x", vec!["m1"]), ("y", vec!["m2"])]);
        let b = || matches(vec![("y", vec!["m3"]), ("z", vec!["m4"])]);

        let mut ab: Vec<String> = merge(a(), b()).keys().map(|d| d.id.clone()).collect();
        let mut ba: Vec<String> = merge(b(), a()).keys().map(|d| d.id.clone()).collect();
        ab.sort();
        ba.sort();

        assert_eq!(ab, ba);
        assert_eq!(ab, vec!["x", "y", "z"]);
    }

    #[test]
    fn empty_inputs() {
        assert!(merge(DashboardMatches::new(), DashboardMatches::new()).is_empty());

        let merged = merge(DashboardMatches::new(), matches(vec![("x", vec!["m1"])]));
        assert_eq!(merged.len(), 1);
    }
}
