//! Tableau REST + Metadata API client

use super::models::{
    collect_custom_sql, collect_native_sql, Connection, CustomSqlData, DatabaseTablesData,
    GraphQlRequest, GraphQlResponse, SignInCredentials, SignInRequest, SignInResponse, SiteRef,
    UserResponse, WorkbookResponse,
};
use super::{TableauCredentials, TableauSettings};
use crate::adapter::{DashboardPlatform, FetchError};
use expocrawl_core::{DashboardMetadata, Owner, SnippetsByDashboard, SqlSourceKind};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

const AUTH_HEADER: &str = "X-Tableau-Auth";

const CUSTOM_SQL_QUERY: &str = r#"
query customSqlTables($first: Int, $after: String) {
  customSQLTablesConnection(first: $first, after: $after) {
    nodes {
      id
      query
      database { name connectionType }
      downstreamWorkbooks { luid name }
    }
    pageInfo { hasNextPage endCursor }
  }
}
"#;

const NATIVE_SQL_QUERY: &str = r#"
query databaseTables($connectionType: String, $first: Int, $after: String) {
  databaseTablesConnection(filter: {connectionType: $connectionType}, first: $first, after: $after) {
    nodes {
      name
      schema
      database { name connectionType }
      downstreamWorkbooks { luid name }
    }
    pageInfo { hasNextPage endCursor }
  }
}
"#;

/// Signed-in Tableau session
pub struct TableauClient {
    http: Client,
    server_url: String,
    api_version: String,
    site_id: String,
    token: String,
    connection_type: String,
    page_size: u32,
}

impl TableauClient {
    /// Open a session with the REST API
    pub async fn sign_in(settings: TableauSettings) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(format!("expocrawl/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let credentials = match settings.credentials {
            TableauCredentials::Password { username, password } => SignInCredentials {
                name: Some(username),
                password: Some(password),
                personal_access_token_name: None,
                personal_access_token_secret: None,
                site: SiteRef {
                    id: None,
                    content_url: settings.site.clone(),
                },
            },
            TableauCredentials::PersonalAccessToken { name, secret } => SignInCredentials {
                name: None,
                password: None,
                personal_access_token_name: Some(name),
                personal_access_token_secret: Some(secret),
                site: SiteRef {
                    id: None,
                    content_url: settings.site.clone(),
                },
            },
        };

        let url = rest_url(&settings.server_url, &settings.api_version, "/auth/signin");
        tracing::debug!(url = %url, site = %settings.site, "Signing in to Tableau");

        let response = http
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&SignInRequest { credentials })
            .send()
            .await
            .map_err(map_transport_error)?;

        let session: SignInResponse = read_json(response).await.map_err(|e| match e {
            FetchError::NotFound(_) | FetchError::PermissionDenied(_) => {
                FetchError::AuthenticationError(e.to_string())
            }
            other => other,
        })?;

        let site_id = session.credentials.site.id.ok_or_else(|| {
            FetchError::InvalidResponse("Sign-in response carries no site id".to_string())
        })?;

        tracing::info!(server = %settings.server_url, "Signed in to Tableau");

        Ok(Self {
            http,
            server_url: settings.server_url,
            api_version: settings.api_version,
            site_id,
            token: session.credentials.token,
            connection_type: settings.connection_type,
            page_size: settings.page_size.max(1),
        })
    }

    fn site_url(&self, path: &str) -> String {
        rest_url(
            &self.server_url,
            &self.api_version,
            &format!("/sites/{}{}", self.site_id, path),
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(AUTH_HEADER, &self.token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let response = self
            .authorized(self.http.get(url))
            .send()
            .await
            .map_err(map_transport_error)?;
        read_json(response).await
    }

    async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, FetchError> {
        let url = format!("{}/api/metadata/graphql", self.server_url);
        let response = self
            .authorized(self.http.post(&url))
            .json(&GraphQlRequest { query, variables })
            .send()
            .await
            .map_err(map_transport_error)?;

        let body: GraphQlResponse<T> = read_json(response).await?;
        if !body.errors.is_empty() {
            let messages: Vec<&str> = body.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(FetchError::InvalidResponse(format!(
                "Metadata API returned errors: {}",
                messages.join("; ")
            )));
        }

        body.data
            .ok_or_else(|| FetchError::InvalidResponse("Metadata API returned no data".to_string()))
    }

    /// Walk every page of a connection, handing each page's nodes to `collect`
    async fn paginate<D, N>(
        &self,
        query: &str,
        mut variables: serde_json::Value,
        into_connection: fn(D) -> Connection<N>,
        mut collect: impl FnMut(&[N]),
    ) -> Result<(), FetchError>
    where
        D: DeserializeOwned,
    {
        let mut after: Option<String> = None;
        let mut pages = 0usize;

        loop {
            variables["first"] = json!(self.page_size);
            variables["after"] = json!(after);

            let connection = into_connection(self.graphql::<D>(query, variables.clone()).await?);
            collect(&connection.nodes);
            pages += 1;

            let has_next_page = connection.page_info.has_next_page;
            match connection.page_info.next_cursor(after.as_deref()) {
                Some(cursor) => after = Some(cursor),
                None => {
                    if has_next_page {
                        tracing::warn!(pages, "Metadata API cursor did not advance, stopping");
                    }
                    break;
                }
            }
        }

        tracing::debug!(pages, "Metadata API pagination complete");
        Ok(())
    }
}

#[async_trait::async_trait]
impl DashboardPlatform for TableauClient {
    fn name(&self) -> &'static str {
        "Tableau"
    }

    async fn fetch_sql_snippets(
        &self,
        kind: SqlSourceKind,
    ) -> Result<SnippetsByDashboard, FetchError> {
        let mut output = SnippetsByDashboard::new();
        let connection_type = self.connection_type.as_str();

        match kind {
            SqlSourceKind::Custom => {
                self.paginate(
                    CUSTOM_SQL_QUERY,
                    json!({}),
                    |data: CustomSqlData| data.connection,
                    |nodes| collect_custom_sql(&mut output, nodes, connection_type),
                )
                .await?
            }
            SqlSourceKind::Native => {
                self.paginate(
                    NATIVE_SQL_QUERY,
                    json!({ "connectionType": connection_type }),
                    |data: DatabaseTablesData| data.connection,
                    |nodes| collect_native_sql(&mut output, nodes, connection_type),
                )
                .await?
            }
        }

        tracing::info!(
            kind = %kind,
            workbooks = output.len(),
            snippets = output.values().map(Vec::len).sum::<usize>(),
            "Retrieved SQL from the Metadata API"
        );

        Ok(output)
    }

    async fn fetch_dashboard(&self, dashboard_id: &str) -> Result<DashboardMetadata, FetchError> {
        let response: WorkbookResponse = self
            .get(&self.site_url(&format!("/workbooks/{}", dashboard_id)))
            .await?;
        Ok(response.workbook.into())
    }

    async fn fetch_owner(&self, owner_id: &str) -> Result<Owner, FetchError> {
        let response: UserResponse = self
            .get(&self.site_url(&format!("/users/{}", owner_id)))
            .await?;
        Ok(response.user.into())
    }

    async fn sign_out(&self) -> Result<(), FetchError> {
        let url = rest_url(&self.server_url, &self.api_version, "/auth/signout");
        let response = self
            .authorized(self.http.post(&url))
            .send()
            .await
            .map_err(map_transport_error)?;

        check_status(response).await?;
        tracing::debug!("Signed out of Tableau");
        Ok(())
    }
}

fn rest_url(server_url: &str, api_version: &str, path: &str) -> String {
    format!("{}/api/{}{}", server_url, api_version, path)
}

fn map_transport_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(error.to_string())
    } else if error.is_decode() {
        FetchError::InvalidResponse(error.to_string())
    } else {
        FetchError::NetworkError(error.to_string())
    }
}

fn status_error(status: StatusCode, body: &str) -> FetchError {
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body)
    };

    match status {
        StatusCode::UNAUTHORIZED => FetchError::AuthenticationError(detail),
        StatusCode::FORBIDDEN => FetchError::PermissionDenied(detail),
        StatusCode::NOT_FOUND => FetchError::NotFound(detail),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => FetchError::Timeout(detail),
        _ => FetchError::NetworkError(detail),
    }
}

async fn check_status(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, body.trim()))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, FetchError> {
    let response = check_status(response).await?;
    response.json::<T>().await.map_err(map_transport_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rest_urls() {
        assert_eq!(
            rest_url("https://tableau.example.com", "3.19", "/auth/signin"),
            "https://tableau.example.com/api/3.19/auth/signin"
        );
    }

    #[test]
    fn status_codes_map_to_fetch_errors() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, ""),
            FetchError::AuthenticationError(_)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "no access"),
            FetchError::PermissionDenied(_)
        ));
        assert!(matches!(status_error(StatusCode::NOT_FOUND, ""), FetchError::NotFound(_)));
        assert!(matches!(
            status_error(StatusCode::GATEWAY_TIMEOUT, ""),
            FetchError::Timeout(_)
        ));
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, ""),
            FetchError::NetworkError(_)
        ));
    }

    #[test]
    fn status_error_keeps_body() {
        let error = status_error(StatusCode::NOT_FOUND, "Workbook wb-9 not found");
        assert_eq!(
            error.to_string(),
            "Not found: 404 Not Found: Workbook wb-9 not found"
        );
    }

    #[test]
    fn queries_request_pagination() {
        for query in [CUSTOM_SQL_QUERY, NATIVE_SQL_QUERY] {
            assert!(query.contains("$first: Int"));
            assert!(query.contains("pageInfo { hasNextPage endCursor }"));
            assert!(query.contains("downstreamWorkbooks { luid name }"));
        }
    }
}
