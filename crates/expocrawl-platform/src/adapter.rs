//! Dashboard platform trait

use expocrawl_core::{DashboardMetadata, Owner, SnippetsByDashboard, SqlSourceKind};

/// Errors that can occur when talking to the platform
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// A dashboard platform the crawler can read from
///
/// Implementations only move data; matching and exclusion happen in the
/// engine.
#[async_trait::async_trait]
pub trait DashboardPlatform: Send + Sync {
    /// Platform name (e.g., "Tableau"), used in exposure descriptions and tags
    fn name(&self) -> &'static str;

    /// Every SQL snippet of the given kind, grouped by dashboard
    async fn fetch_sql_snippets(
        &self,
        kind: SqlSourceKind,
    ) -> Result<SnippetsByDashboard, FetchError>;

    /// Metadata of one dashboard
    async fn fetch_dashboard(&self, dashboard_id: &str) -> Result<DashboardMetadata, FetchError>;

    /// Owner of a dashboard, by user id
    async fn fetch_owner(&self, owner_id: &str) -> Result<Owner, FetchError>;

    /// Release the session, if the platform keeps one
    async fn sign_out(&self) -> Result<(), FetchError> {
        Ok(())
    }
}
