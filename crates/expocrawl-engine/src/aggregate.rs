//! Per-source aggregation of matches

use expocrawl_core::{DashboardMatches, SnippetsByDashboard};
use expocrawl_sql::{RelationRegistry, SqlModelMatcher};

/// Scan every snippet of one SQL source and group the hits by dashboard
///
/// The relations found in all of a dashboard's snippets are concatenated in
/// snippet order; repeats across snippets are kept. Dashboards without any
/// hit are left out. A snippet that cannot be scanned counts as no match.
pub fn aggregate(snippets: &SnippetsByDashboard, registry: &RelationRegistry) -> DashboardMatches {
    let matcher = SqlModelMatcher::new(registry);
    let mut output = DashboardMatches::new();

    for (dashboard, dashboard_snippets) in snippets {
        let mut found = Vec::new();

        for (index, snippet) in dashboard_snippets.iter().enumerate() {
            match matcher.scan(snippet) {
                Ok(matches) => found.extend(matches.into_values()),
                Err(e) => {
                    tracing::warn!(
                        dashboard = %dashboard,
                        snippet = index,
                        error = %e,
                        "Skipping unscannable SQL snippet"
                    );
                }
            }
        }

        if found.is_empty() {
            tracing::debug!(dashboard = %dashboard, "No relations found");
            continue;
        }

        tracing::debug!(
            dashboard = %dashboard,
            relations = ?found.iter().map(|r| r.relation_name.as_str()).collect::<Vec<_>>(),
            "Found relations"
        );
        output.insert(dashboard.clone(), found);
    }

    tracing::info!(dashboards = output.len(), "Found dashboards with linked relations");
    output
}
