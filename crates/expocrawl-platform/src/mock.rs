//! In-memory dashboard platform
//!
//! Serves predefined snippets, dashboards and owners without any network
//! access. Used by the engine tests and for offline dry runs.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use expocrawl_platform::{MockPlatformBuilder, FetchError};
//!
//! let platform = MockPlatformBuilder::new()
//!     .with_snippet(SqlSourceKind::Custom, DashboardRef::new("wb-1", "Revenue"), "select * from orders")
//!     .with_dashboard(metadata)
//!     .with_owner(owner)
//!     .with_dashboard_error("wb-2", FetchError::NotFound("wb-2".to_string()))
//!     .build();
//! ```

use crate::adapter::{DashboardPlatform, FetchError};
use expocrawl_core::{DashboardMetadata, DashboardRef, Owner, SnippetsByDashboard, SqlSnippet, SqlSourceKind};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Mock dashboard platform
///
/// Clones share state, so a test can keep a handle and inspect call counts
/// after handing the platform to the crawler.
#[derive(Clone)]
pub struct MockPlatform {
    snippets: Arc<RwLock<HashMap<SqlSourceKind, SnippetsByDashboard>>>,
    dashboards: Arc<RwLock<HashMap<String, DashboardMetadata>>>,
    owners: Arc<RwLock<HashMap<String, Owner>>>,

    /// Errors returned for a specific dashboard or owner id
    errors: Arc<RwLock<HashMap<String, FetchError>>>,

    /// Errors returned for a whole extraction
    extraction_errors: Arc<RwLock<HashMap<SqlSourceKind, FetchError>>>,

    /// Extra delay for one dashboard fetch (milliseconds)
    dashboard_delays: Arc<HashMap<String, u64>>,

    latency_ms: u64,
    platform_name: &'static str,

    dashboard_calls: Arc<AtomicUsize>,
    owner_calls: Arc<AtomicUsize>,
    sign_outs: Arc<AtomicUsize>,
}

impl MockPlatform {
    /// Empty platform: no dashboards, no SQL
    pub fn new() -> Self {
        MockPlatformBuilder::new().build()
    }

    pub async fn add_snippet(
        &self,
        kind: SqlSourceKind,
        dashboard: DashboardRef,
        sql: impl Into<SqlSnippet>,
    ) {
        self.snippets
            .write()
            .await
            .entry(kind)
            .or_default()
            .entry(dashboard)
            .or_default()
            .push(sql.into());
    }

    pub async fn add_dashboard(&self, metadata: DashboardMetadata) {
        self.dashboards.write().await.insert(metadata.id.clone(), metadata);
    }

    pub async fn add_owner(&self, owner: Owner) {
        self.owners.write().await.insert(owner.id.clone(), owner);
    }

    pub async fn clear_errors(&self) {
        self.errors.write().await.clear();
        self.extraction_errors.write().await.clear();
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.platform_name = name;
        self
    }

    /// Number of `fetch_dashboard` calls so far
    pub fn dashboard_calls(&self) -> usize {
        self.dashboard_calls.load(Ordering::SeqCst)
    }

    /// Number of `fetch_owner` calls so far
    pub fn owner_calls(&self) -> usize {
        self.owner_calls.load(Ordering::SeqCst)
    }

    pub fn signed_out(&self) -> bool {
        self.sign_outs.load(Ordering::SeqCst) > 0
    }

    async fn simulate_latency(&self, extra_ms: u64) {
        let total = self.latency_ms + extra_ms;
        if total > 0 {
            tokio::time::sleep(Duration::from_millis(total)).await;
        }
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DashboardPlatform for MockPlatform {
    fn name(&self) -> &'static str {
        self.platform_name
    }

    async fn fetch_sql_snippets(
        &self,
        kind: SqlSourceKind,
    ) -> Result<SnippetsByDashboard, FetchError> {
        self.simulate_latency(0).await;

        if let Some(error) = self.extraction_errors.read().await.get(&kind) {
            return Err(error.clone());
        }

        Ok(self
            .snippets
            .read()
            .await
            .get(&kind)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_dashboard(&self, dashboard_id: &str) -> Result<DashboardMetadata, FetchError> {
        self.dashboard_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.dashboard_delays.get(dashboard_id).copied().unwrap_or(0);
        self.simulate_latency(delay).await;

        if let Some(error) = self.errors.read().await.get(dashboard_id) {
            return Err(error.clone());
        }

        self.dashboards
            .read()
            .await
            .get(dashboard_id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(format!("dashboard {}", dashboard_id)))
    }

    async fn fetch_owner(&self, owner_id: &str) -> Result<Owner, FetchError> {
        self.owner_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency(0).await;

        if let Some(error) = self.errors.read().await.get(owner_id) {
            return Err(error.clone());
        }

        self.owners
            .read()
            .await
            .get(owner_id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(format!("user {}", owner_id)))
    }

    async fn sign_out(&self) -> Result<(), FetchError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fluent construction of a [`MockPlatform`]
pub struct MockPlatformBuilder {
    snippets: HashMap<SqlSourceKind, SnippetsByDashboard>,
    dashboards: HashMap<String, DashboardMetadata>,
    owners: HashMap<String, Owner>,
    errors: HashMap<String, FetchError>,
    extraction_errors: HashMap<SqlSourceKind, FetchError>,
    dashboard_delays: HashMap<String, u64>,
    latency_ms: u64,
    platform_name: &'static str,
}

impl MockPlatformBuilder {
    pub fn new() -> Self {
        Self {
            snippets: HashMap::new(),
            dashboards: HashMap::new(),
            owners: HashMap::new(),
            errors: HashMap::new(),
            extraction_errors: HashMap::new(),
            dashboard_delays: HashMap::new(),
            latency_ms: 0,
            platform_name: "Mock",
        }
    }

    /// Attach one SQL snippet of `kind` to a dashboard
    pub fn with_snippet(
        mut self,
        kind: SqlSourceKind,
        dashboard: DashboardRef,
        sql: impl Into<SqlSnippet>,
    ) -> Self {
        self.snippets
            .entry(kind)
            .or_default()
            .entry(dashboard)
            .or_default()
            .push(sql.into());
        self
    }

    pub fn with_dashboard(mut self, metadata: DashboardMetadata) -> Self {
        self.dashboards.insert(metadata.id.clone(), metadata);
        self
    }

    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.owners.insert(owner.id.clone(), owner);
        self
    }

    pub fn with_dashboard_error(mut self, dashboard_id: impl Into<String>, error: FetchError) -> Self {
        self.errors.insert(dashboard_id.into(), error);
        self
    }

    pub fn with_owner_error(mut self, owner_id: impl Into<String>, error: FetchError) -> Self {
        self.errors.insert(owner_id.into(), error);
        self
    }

    /// Fail the whole extraction for one SQL source kind
    pub fn with_extraction_error(mut self, kind: SqlSourceKind, error: FetchError) -> Self {
        self.extraction_errors.insert(kind, error);
        self
    }

    /// Delay the metadata fetch of one dashboard
    pub fn with_dashboard_delay(mut self, dashboard_id: impl Into<String>, delay_ms: u64) -> Self {
        self.dashboard_delays.insert(dashboard_id.into(), delay_ms);
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.platform_name = name;
        self
    }

    pub fn build(self) -> MockPlatform {
        MockPlatform {
            snippets: Arc::new(RwLock::new(self.snippets)),
            dashboards: Arc::new(RwLock::new(self.dashboards)),
            owners: Arc::new(RwLock::new(self.owners)),
            errors: Arc::new(RwLock::new(self.errors)),
            extraction_errors: Arc::new(RwLock::new(self.extraction_errors)),
            dashboard_delays: Arc::new(self.dashboard_delays),
            latency_ms: self.latency_ms,
            platform_name: self.platform_name,
            dashboard_calls: Arc::new(AtomicUsize::new(0)),
            owner_calls: Arc::new(AtomicUsize::new(0)),
            sign_outs: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Default for MockPlatformBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn revenue() -> DashboardMetadata {
        DashboardMetadata {
            id: "wb-1".to_string(),
            name: "Revenue".to_string(),
            project_name: Some("Finance".to_string()),
            owner_id: "u-1".to_string(),
            url: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn serves_snippets_by_kind() {
        let platform = MockPlatformBuilder::new()
            .with_snippet(SqlSourceKind::Custom, DashboardRef::new("wb-1", "Revenue"), "select 1")
            .with_snippet(SqlSourceKind::Custom, DashboardRef::new("wb-1", "Revenue"), "select 2")
            .build();

        let custom = platform.fetch_sql_snippets(SqlSourceKind::Custom).await.unwrap();
        assert_eq!(custom[&DashboardRef::new("wb-1", "")].len(), 2);

        let native = platform.fetch_sql_snippets(SqlSourceKind::Native).await.unwrap();
        assert!(native.is_empty());
    }

    #[tokio::test]
    async fn unknown_dashboard_is_not_found() {
        let platform = MockPlatform::new();
        let result = platform.fetch_dashboard("missing").await;
        assert!(matches!(result, Err(FetchError::NotFound(_))));
        assert_eq!(platform.dashboard_calls(), 1);
    }

    #[tokio::test]
    async fn configured_errors_win() {
        let platform = MockPlatformBuilder::new()
            .with_dashboard(revenue())
            .with_dashboard_error("wb-1", FetchError::PermissionDenied("wb-1".to_string()))
            .build();

        assert!(matches!(
            platform.fetch_dashboard("wb-1").await,
            Err(FetchError::PermissionDenied(_))
        ));

        platform.clear_errors().await;
        assert_eq!(platform.fetch_dashboard("wb-1").await.unwrap(), revenue());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let platform = MockPlatform::new().with_name("Tableau");
        let handle = platform.clone();

        platform.add_dashboard(revenue()).await;
        platform
            .add_owner(Owner {
                id: "u-1".to_string(),
                name: "alice".to_string(),
                full_name: None,
                email: None,
            })
            .await;

        platform
            .add_snippet(SqlSourceKind::Native, DashboardRef::new("wb-1", "Revenue"), "select 3")
            .await;

        assert_eq!(handle.fetch_owner("u-1").await.unwrap().name, "alice");
        assert_eq!(handle.fetch_dashboard("wb-1").await.unwrap(), revenue());
        let native = handle.fetch_sql_snippets(SqlSourceKind::Native).await.unwrap();
        assert_eq!(native[&DashboardRef::new("wb-1", "")][0].text().unwrap(), "select 3");
        assert_eq!(handle.name(), "Tableau");
        assert_eq!(platform.owner_calls(), 1);

        handle.sign_out().await.unwrap();
        assert!(platform.signed_out());
    }

    #[tokio::test]
    async fn extraction_error() {
        let platform = MockPlatformBuilder::new()
            .with_extraction_error(
                SqlSourceKind::Native,
                FetchError::NetworkError("connection reset".to_string()),
            )
            .build();

        assert!(platform.fetch_sql_snippets(SqlSourceKind::Custom).await.is_ok());
        assert!(platform.fetch_sql_snippets(SqlSourceKind::Native).await.is_err());
    }
}
