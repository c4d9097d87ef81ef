//! expocrawl core
//!
//! Domain model shared by every crate: warehouse relations, dashboards and
//! their SQL, lineage exposures, configuration and the crawl report.

pub mod relation;
pub mod dashboard;
pub mod exposure;
pub mod config;
pub mod report;

pub use relation::{Relation, RelationKind};
pub use dashboard::{
    DashboardMatches, DashboardMetadata, DashboardRef, Owner, SnippetsByDashboard, SqlSnippet,
    SqlSourceKind,
};
pub use exposure::{DependsOn, Exposure, ExposureMaturity, ExposureOwner, ExposureType};
pub use config::{
    Config, ConfigError, ExposureDefaults, FetchErrorPolicy, OutputConfig, OutputFormat,
    TableauConfig,
};
pub use report::{CrawlReport, DashboardEntry, DashboardState, ReportSummary, ReportVersion};
