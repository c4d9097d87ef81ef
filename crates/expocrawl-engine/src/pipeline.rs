//! End-to-end crawl

use crate::aggregate::aggregate;
use crate::builder::{AbortedFetch, BuildOptions, DashboardOutcome, ExposureBuilder};
use crate::merge::merge;
use expocrawl_core::{CrawlReport, Exposure, Relation, ReportSummary, SnippetsByDashboard, SqlSourceKind};
use expocrawl_dbt::{ExposureStore, StoreError};
use expocrawl_platform::{DashboardPlatform, FetchError};
use expocrawl_sql::{RegistryError, RelationRegistry};
use indexmap::IndexMap;
use std::path::PathBuf;

/// Errors that end a crawl
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid relation: {0}")]
    Registry(#[from] RegistryError),

    #[error("Failed to retrieve {kind} SQL: {source}")]
    Extraction {
        kind: SqlSourceKind,
        #[source]
        source: FetchError,
    },

    #[error(transparent)]
    Fetch(#[from] AbortedFetch),
}

/// Result of one crawl
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    /// Exposures keyed by dashboard id, in processing order
    pub exposures: IndexMap<String, Exposure>,

    /// Terminal state of every matched dashboard, in processing order
    pub dashboards: Vec<DashboardOutcome>,

    pub summary: ReportSummary,
}

impl CrawlOutcome {
    pub fn exposure_list(&self) -> Vec<Exposure> {
        self.exposures.values().cloned().collect()
    }

    /// Versioned report of this crawl
    pub fn report(&self) -> CrawlReport {
        let mut report = CrawlReport::new();
        report.summary = ReportSummary {
            exposed: 0,
            excluded: 0,
            failed: 0,
            ..self.summary.clone()
        };
        for outcome in &self.dashboards {
            report.add_dashboard(outcome.to_entry());
        }
        report
    }
}

/// Pipeline entry point
pub struct Crawler<'a> {
    platform: &'a dyn DashboardPlatform,
    options: BuildOptions,
}

impl<'a> Crawler<'a> {
    pub fn new(platform: &'a dyn DashboardPlatform, options: BuildOptions) -> Self {
        Self { platform, options }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Load relations from `store`, crawl, and write the exposures back
    ///
    /// Returns the outcome and the path written.
    pub async fn run(
        &self,
        store: &mut dyn ExposureStore,
    ) -> Result<(CrawlOutcome, PathBuf), CrawlError> {
        let relations = store.load_relations()?;
        let outcome = self.crawl(relations).await?;

        let path = store.write_exposures(&outcome.exposure_list())?;
        Ok((outcome, path))
    }

    /// Match, merge and build, without persisting anything
    pub async fn crawl(&self, relations: Vec<Relation>) -> Result<CrawlOutcome, CrawlError> {
        let registry = RelationRegistry::build(relations)?;
        tracing::info!(relations = registry.len(), "Loaded relations");

        let (custom_sql, native_sql) = futures::try_join!(
            self.fetch_snippets(SqlSourceKind::Custom),
            self.fetch_snippets(SqlSourceKind::Native),
        )?;

        let custom = {
            let _span = tracing::info_span!("aggregate", kind = %SqlSourceKind::Custom).entered();
            aggregate(&custom_sql, &registry)
        };
        let native = {
            let _span = tracing::info_span!("aggregate", kind = %SqlSourceKind::Native).entered();
            aggregate(&native_sql, &registry)
        };

        let mut summary = ReportSummary {
            relations: registry.len(),
            custom_sql_matches: custom.len(),
            native_sql_matches: native.len(),
            ..ReportSummary::default()
        };

        let matches = merge(custom, native);
        summary.matched_dashboards = matches.len();

        tracing::info!(
            dashboards = matches.len(),
            platform = self.platform.name(),
            "Retrieving dashboard and owner metadata"
        );
        let dashboards = ExposureBuilder::new(self.platform, &self.options)
            .build(matches)
            .await?;

        let mut exposures = IndexMap::new();
        for outcome in &dashboards {
            match outcome {
                DashboardOutcome::Exposed {
                    dashboard,
                    exposure,
                } => {
                    exposures.insert(dashboard.id.clone(), exposure.clone());
                    summary.exposed += 1;
                }
                DashboardOutcome::Excluded { .. } => summary.excluded += 1,
                DashboardOutcome::Failed { .. } => summary.failed += 1,
            }
        }

        tracing::info!(
            exposed = summary.exposed,
            excluded = summary.excluded,
            failed = summary.failed,
            "Crawl complete"
        );

        Ok(CrawlOutcome {
            exposures,
            dashboards,
            summary,
        })
    }

    async fn fetch_snippets(
        &self,
        kind: SqlSourceKind,
    ) -> Result<SnippetsByDashboard, CrawlError> {
        self.platform
            .fetch_sql_snippets(kind)
            .await
            .map_err(|source| CrawlError::Extraction { kind, source })
    }
}
