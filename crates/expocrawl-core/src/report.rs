//! Crawl report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use serde::{Deserialize, Serialize};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Terminal state of a matched dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardState {
    Exposed,
    Excluded,
    Failed,
}

/// Summary statistics for a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Relations in the registry
    pub relations: usize,

    /// Dashboards with at least one match in custom SQL
    pub custom_sql_matches: usize,

    /// Dashboards with at least one match in native SQL
    pub native_sql_matches: usize,

    /// Dashboards after merging both sources
    pub matched_dashboards: usize,

    pub exposed: usize,

    pub excluded: usize,

    pub failed: usize,
}

/// One matched dashboard and what happened to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardEntry {
    pub dashboard_id: String,

    pub dashboard_name: String,

    pub state: DashboardState,

    /// Why the dashboard was excluded or failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Exposure unique id, when exposed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure: Option<String>,

    /// Deduplicated relation ids the dashboard reads
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// Crawl report (report.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlReport {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Summary statistics
    pub summary: ReportSummary,

    /// One entry per matched dashboard, in processing order
    pub dashboards: Vec<DashboardEntry>,
}

impl CrawlReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary: ReportSummary::default(),
            dashboards: Vec::new(),
        }
    }

    /// Record a dashboard outcome, keeping the state counters in sync
    pub fn add_dashboard(&mut self, entry: DashboardEntry) {
        match entry.state {
            DashboardState::Exposed => self.summary.exposed += 1,
            DashboardState::Excluded => self.summary.excluded += 1,
            DashboardState::Failed => self.summary.failed += 1,
        }

        self.dashboards.push(entry);
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

impl Default for CrawlReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, state: DashboardState) -> DashboardEntry {
        DashboardEntry {
            dashboard_id: id.to_string(),
            dashboard_name: format!("Dashboard {}", id),
            state,
            reason: None,
            exposure: None,
            depends_on: vec![],
        }
    }

    #[test]
    fn empty_report() {
        let report = CrawlReport::new();
        assert_eq!(report.version, ReportVersion::CURRENT);
        assert_eq!(report.summary.exposed, 0);
        assert!(!report.has_failures());
    }

    #[test]
    fn counters_follow_entries() {
        let mut report = CrawlReport::new();
        report.add_dashboard(entry("a", DashboardState::Exposed));
        report.add_dashboard(entry("b", DashboardState::Excluded));
        report.add_dashboard(entry("c", DashboardState::Failed));
        report.add_dashboard(entry("d", DashboardState::Exposed));

        assert_eq!(report.summary.exposed, 2);
        assert_eq!(report.summary.excluded, 1);
        assert_eq!(report.summary.failed, 1);
        assert!(report.has_failures());
    }

    #[test]
    fn report_serialization() {
        let mut report = CrawlReport::new();
        report.add_dashboard(entry("a", DashboardState::Excluded));
        let json = report.to_json().unwrap();
        assert!(json.contains("\"version\""));
        assert!(json.contains("\"excluded\""));
        assert!(!json.contains("\"reason\""));
    }
}
