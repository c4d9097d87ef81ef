//! Dashboard platform access
//!
//! The crawler sees a dashboard platform through the [`DashboardPlatform`]
//! trait: SQL extraction per source kind, dashboard metadata and owner lookup.
//!
//! ## Implementations
//!
//! - [`TableauClient`] - Tableau Server / Cloud, REST API + Metadata API
//! - [`MockPlatform`] - in-memory platform for tests and offline runs
//!
//! ## Example
//!
//! ```rust,ignore
//! use expocrawl_platform::{DashboardPlatform, TableauClient, TableauSettings};
//!
//! let client = TableauClient::sign_in(settings).await?;
//! let custom = client.fetch_sql_snippets(SqlSourceKind::Custom).await?;
//! client.sign_out().await?;
//! ```

pub mod adapter;
pub mod mock;
pub mod tableau;

pub use adapter::{DashboardPlatform, FetchError};
pub use mock::{MockPlatform, MockPlatformBuilder};
pub use tableau::{TableauClient, TableauCredentials, TableauSettings};
