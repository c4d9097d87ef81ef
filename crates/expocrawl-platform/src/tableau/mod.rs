//! Tableau Server / Tableau Cloud
//!
//! Dashboards are workbooks. Workbook and user metadata come from the REST
//! API, embedded SQL from the Metadata API (GraphQL).

mod client;
mod models;

pub use client::TableauClient;

use crate::adapter::FetchError;
use expocrawl_core::TableauConfig;
use std::time::Duration;

/// Environment variables read by [`TableauCredentials::from_env`]
pub const ENV_USERNAME: &str = "TABLEAU_USERNAME";
pub const ENV_PASSWORD: &str = "TABLEAU_PASSWORD";
pub const ENV_TOKEN_NAME: &str = "TABLEAU_TOKEN_NAME";
pub const ENV_TOKEN_SECRET: &str = "TABLEAU_TOKEN_SECRET";

/// Sign-in credentials
#[derive(Clone)]
pub enum TableauCredentials {
    Password { username: String, password: String },
    PersonalAccessToken { name: String, secret: String },
}

impl TableauCredentials {
    /// Read credentials from the process environment
    ///
    /// A personal access token takes precedence over username/password.
    pub fn from_env() -> Result<Self, FetchError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, FetchError> {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let (Some(name), Some(secret)) = (get(ENV_TOKEN_NAME), get(ENV_TOKEN_SECRET)) {
            return Ok(Self::PersonalAccessToken { name, secret });
        }

        match (get(ENV_USERNAME), get(ENV_PASSWORD)) {
            (Some(username), Some(password)) => Ok(Self::Password { username, password }),
            _ => Err(FetchError::ConfigError(format!(
                "Tableau credentials missing: set {} and {}, or {} and {}",
                ENV_USERNAME, ENV_PASSWORD, ENV_TOKEN_NAME, ENV_TOKEN_SECRET
            ))),
        }
    }
}

// Secrets stay out of logs
impl std::fmt::Debug for TableauCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::PersonalAccessToken { name, .. } => f
                .debug_struct("PersonalAccessToken")
                .field("name", name)
                .finish_non_exhaustive(),
        }
    }
}

/// Everything needed to open a Tableau session
#[derive(Debug, Clone)]
pub struct TableauSettings {
    pub server_url: String,

    /// Site content URL; empty for the default site
    pub site: String,

    pub api_version: String,
    pub connection_type: String,
    pub page_size: u32,
    pub request_timeout: Duration,
    pub credentials: TableauCredentials,
}

impl TableauSettings {
    pub fn from_config(
        config: &TableauConfig,
        credentials: TableauCredentials,
    ) -> Result<Self, FetchError> {
        let server_url = config
            .server_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                FetchError::ConfigError(
                    "Tableau server URL missing: set TABLEAU_URL or [tableau] server_url".to_string(),
                )
            })?;

        Ok(Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            site: config.site.clone().unwrap_or_default(),
            api_version: config.api_version.clone(),
            connection_type: config.connection_type.clone(),
            page_size: config.page_size,
            request_timeout: config.request_timeout(),
            credentials,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn token_preferred_over_password() {
        let credentials = TableauCredentials::from_lookup(lookup(&[
            (ENV_USERNAME, "alice"),
            (ENV_PASSWORD, "hunter2"),
            (ENV_TOKEN_NAME, "crawler"),
            (ENV_TOKEN_SECRET, "s3cret"),
        ]))
        .unwrap();

        assert!(matches!(credentials, TableauCredentials::PersonalAccessToken { ref name, .. } if name == "crawler"));
    }

    #[test]
    fn password_credentials() {
        let credentials = TableauCredentials::from_lookup(lookup(&[
            (ENV_USERNAME, "alice"),
            (ENV_PASSWORD, "hunter2"),
            (ENV_TOKEN_NAME, ""),
        ]))
        .unwrap();

        assert!(matches!(credentials, TableauCredentials::Password { .. }));
        assert!(!format!("{:?}", credentials).contains("hunter2"));
    }

    #[test]
    fn missing_credentials() {
        let result = TableauCredentials::from_lookup(lookup(&[(ENV_USERNAME, "alice")]));
        assert!(matches!(result, Err(FetchError::ConfigError(_))));
    }

    #[test]
    fn settings_require_server_url() {
        let credentials = TableauCredentials::Password {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
        };

        let mut config = TableauConfig::default();
        assert!(TableauSettings::from_config(&config, credentials.clone()).is_err());

        config.server_url = Some("https://tableau.example.com/".to_string());
        config.site = Some("analytics".to_string());
        let settings = TableauSettings::from_config(&config, credentials).unwrap();

        assert_eq!(settings.server_url, "https://tableau.example.com");
        assert_eq!(settings.site, "analytics");
        assert_eq!(settings.api_version, "3.19");
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
    }
}
