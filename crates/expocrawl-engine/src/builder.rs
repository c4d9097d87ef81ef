//! Exposure construction for matched dashboards
//!
//! Dashboards are processed on an ordered, bounded worker pool: up to
//! `max_concurrent_requests` dashboards have metadata requests in flight, and
//! outcomes come back in match order no matter which fetch finishes first.

use crate::exclusion::{ExclusionPolicy, ExclusionReason};
use expocrawl_core::exposure::dedup_relations;
use expocrawl_core::{
    Config, DashboardEntry, DashboardMatches, DashboardRef, DashboardState, Exposure,
    ExposureMaturity, FetchErrorPolicy, Relation,
};
use expocrawl_platform::{DashboardPlatform, FetchError};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Settings for one build pass
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// dbt package the exposures are registered under
    pub package_name: String,
    pub exclusion: ExclusionPolicy,
    pub maturity: ExposureMaturity,
    pub tags: Vec<String>,
    pub max_concurrent_requests: usize,
    pub request_timeout: Duration,
    pub on_fetch_error: FetchErrorPolicy,
}

impl BuildOptions {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            exclusion: ExclusionPolicy::default(),
            maturity: ExposureMaturity::default(),
            tags: Vec::new(),
            max_concurrent_requests: 1,
            request_timeout: Duration::from_secs(30),
            on_fetch_error: FetchErrorPolicy::default(),
        }
    }

    pub fn from_config(config: &Config, package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            exclusion: ExclusionPolicy::new(config.ignored_projects.iter().cloned()),
            maturity: config.exposures.maturity,
            tags: config.exposures.tags.clone(),
            max_concurrent_requests: config.tableau.max_concurrent_requests,
            request_timeout: config.tableau.request_timeout(),
            on_fetch_error: config.tableau.on_fetch_error,
        }
    }
}

/// Terminal state of one matched dashboard
#[derive(Debug, Clone)]
pub enum DashboardOutcome {
    Exposed {
        dashboard: DashboardRef,
        exposure: Exposure,
    },
    Excluded {
        dashboard: DashboardRef,
        reason: ExclusionReason,
        relations: Vec<Arc<Relation>>,
    },
    Failed {
        dashboard: DashboardRef,
        error: FetchError,
        relations: Vec<Arc<Relation>>,
    },
}

impl DashboardOutcome {
    pub fn dashboard(&self) -> &DashboardRef {
        match self {
            Self::Exposed { dashboard, .. }
            | Self::Excluded { dashboard, .. }
            | Self::Failed { dashboard, .. } => dashboard,
        }
    }

    pub fn exposure(&self) -> Option<&Exposure> {
        match self {
            Self::Exposed { exposure, .. } => Some(exposure),
            _ => None,
        }
    }

    pub fn state(&self) -> DashboardState {
        match self {
            Self::Exposed { .. } => DashboardState::Exposed,
            Self::Excluded { .. } => DashboardState::Excluded,
            Self::Failed { .. } => DashboardState::Failed,
        }
    }

    /// Report entry for this dashboard
    pub fn to_entry(&self) -> DashboardEntry {
        let dashboard = self.dashboard();
        let (reason, exposure, depends_on) = match self {
            Self::Exposed { exposure, .. } => (
                None,
                Some(exposure.unique_id.clone()),
                exposure.depends_on.nodes.clone(),
            ),
            Self::Excluded {
                reason, relations, ..
            } => (Some(reason.to_string()), None, relation_ids(relations)),
            Self::Failed {
                error, relations, ..
            } => (Some(error.to_string()), None, relation_ids(relations)),
        };

        DashboardEntry {
            dashboard_id: dashboard.id.clone(),
            dashboard_name: dashboard.name.clone(),
            state: self.state(),
            reason,
            exposure,
            depends_on,
        }
    }
}

fn relation_ids(relations: &[Arc<Relation>]) -> Vec<String> {
    relations.iter().map(|r| r.unique_id.clone()).collect()
}

/// A dashboard fetch failed and the policy says abort
#[derive(Debug, thiserror::Error)]
#[error("Failed to fetch metadata for dashboard {dashboard}: {source}")]
pub struct AbortedFetch {
    pub dashboard: DashboardRef,
    #[source]
    pub source: FetchError,
}

/// Builds exposures for matched dashboards against a platform
pub struct ExposureBuilder<'a> {
    platform: &'a dyn DashboardPlatform,
    options: &'a BuildOptions,
}

impl<'a> ExposureBuilder<'a> {
    pub fn new(platform: &'a dyn DashboardPlatform, options: &'a BuildOptions) -> Self {
        Self { platform, options }
    }

    /// Process every matched dashboard, in match order
    ///
    /// With [`FetchErrorPolicy::Abort`] the first failed fetch stops the pass
    /// and in-flight requests are dropped.
    pub async fn build(&self, matches: DashboardMatches) -> Result<Vec<DashboardOutcome>, AbortedFetch> {
        let width = self.options.max_concurrent_requests.max(1);
        let mut pending = stream::iter(
            matches
                .into_iter()
                .map(|(dashboard, relations)| self.process(dashboard, relations)),
        )
        .buffered(width);

        let mut outcomes = Vec::new();
        while let Some(outcome) = pending.next().await {
            if let DashboardOutcome::Failed {
                dashboard, error, ..
            } = &outcome
            {
                if self.options.on_fetch_error == FetchErrorPolicy::Abort {
                    return Err(AbortedFetch {
                        dashboard: dashboard.clone(),
                        source: error.clone(),
                    });
                }
            }
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    async fn process(&self, dashboard: DashboardRef, relations: Vec<Arc<Relation>>) -> DashboardOutcome {
        let relations = dedup_relations(&relations);

        let metadata = match self
            .call(self.platform.fetch_dashboard(&dashboard.id))
            .await
        {
            Ok(metadata) => metadata,
            Err(error) => return self.failed(dashboard, error, relations),
        };

        if let Some(reason) = self.options.exclusion.check(&metadata) {
            tracing::debug!(dashboard = %dashboard, reason = %reason, "Skipping dashboard");
            return DashboardOutcome::Excluded {
                dashboard,
                reason,
                relations,
            };
        }

        let owner = match self.call(self.platform.fetch_owner(&metadata.owner_id)).await {
            Ok(owner) => owner,
            Err(error) => return self.failed(dashboard, error, relations),
        };

        let mut exposure = Exposure::from_dashboard(
            &self.options.package_name,
            self.platform.name(),
            &metadata,
            &owner,
            &relations,
        )
        .with_maturity(self.options.maturity);
        if !self.options.tags.is_empty() {
            exposure = exposure.with_tags(&self.options.tags);
        }

        tracing::debug!(
            dashboard = %dashboard,
            exposure = %exposure.unique_id,
            depends_on = exposure.depends_on.nodes.len(),
            "Built exposure"
        );

        DashboardOutcome::Exposed {
            dashboard,
            exposure,
        }
    }

    fn failed(
        &self,
        dashboard: DashboardRef,
        error: FetchError,
        relations: Vec<Arc<Relation>>,
    ) -> DashboardOutcome {
        tracing::warn!(dashboard = %dashboard, error = %error, "Failed to fetch dashboard metadata");
        DashboardOutcome::Failed {
            dashboard,
            error,
            relations,
        }
    }

    async fn call<T>(&self, request: impl Future<Output = Result<T, FetchError>>) -> Result<T, FetchError> {
        match tokio::time::timeout(self.options.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(format!(
                "no response from {} after {:?}",
                self.platform.name(),
                self.options.request_timeout
            ))),
        }
    }
}
