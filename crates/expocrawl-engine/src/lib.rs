//! Exposure crawling engine
//!
//! Turns dashboards' embedded SQL into dbt exposures:
//!
//! 1. [`aggregate`] scans every snippet of one SQL source against the
//!    relation registry and keeps dashboards with at least one match
//! 2. [`merge`] unions the per-source results by dashboard id
//! 3. [`ExposureBuilder`] fetches metadata, applies the [`ExclusionPolicy`]
//!    and builds one exposure per surviving dashboard
//!
//! [`Crawler`] runs the whole pipeline against a platform and a store.

pub mod aggregate;
pub mod merge;
pub mod exclusion;
pub mod builder;
pub mod pipeline;

pub use aggregate::aggregate;
pub use merge::merge;
pub use exclusion::{ExclusionPolicy, ExclusionReason};
pub use builder::{AbortedFetch, BuildOptions, DashboardOutcome, ExposureBuilder};
pub use pipeline::{CrawlError, CrawlOutcome, Crawler};
