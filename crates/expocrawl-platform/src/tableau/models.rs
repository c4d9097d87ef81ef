//! Tableau REST and Metadata API payloads

use expocrawl_core::{DashboardMetadata, DashboardRef, Owner, SnippetsByDashboard, SqlSnippet};
use serde::{Deserialize, Serialize};

// =============================================================================
// REST API
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct SignInRequest {
    pub credentials: SignInCredentials,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignInCredentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_access_token_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_access_token_secret: Option<String>,

    pub site: SiteRef,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SiteRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub content_url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignInResponse {
    pub credentials: SessionCredentials,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionCredentials {
    pub token: String,
    pub site: SiteRef,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkbookResponse {
    pub workbook: Workbook,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Workbook {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub webpage_url: Option<String>,

    #[serde(default)]
    pub project: Option<ProjectRef>,

    pub owner: UserRef,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProjectRef {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserRef {
    pub id: String,
}

impl From<Workbook> for DashboardMetadata {
    fn from(workbook: Workbook) -> Self {
        // Personal-space workbooks come back with a project but no name
        let project_name = workbook
            .project
            .and_then(|p| p.name)
            .filter(|name| !name.is_empty());

        DashboardMetadata {
            id: workbook.id,
            name: workbook.name,
            project_name,
            owner_id: workbook.owner.id,
            url: workbook.webpage_url,
            description: workbook.description,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserResponse {
    pub user: User,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct User {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub full_name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,
}

impl From<User> for Owner {
    fn from(user: User) -> Self {
        Owner {
            id: user.id,
            name: user.name,
            full_name: user.full_name,
            email: user.email,
        }
    }
}

// =============================================================================
// Metadata API (GraphQL)
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct GraphQlRequest<'a> {
    pub query: &'a str,
    pub variables: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse<T> {
    pub data: Option<T>,

    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PageInfo {
    pub has_next_page: bool,

    #[serde(default)]
    pub end_cursor: Option<String>,
}

impl PageInfo {
    /// Cursor for the following page, `None` once the connection is exhausted
    /// or the server hands back the cursor it was just given
    pub fn next_cursor(self, current: Option<&str>) -> Option<String> {
        match self.end_cursor {
            Some(cursor) if self.has_next_page && current != Some(cursor.as_str()) => Some(cursor),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Connection<T> {
    pub nodes: Vec<T>,
    pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CustomSqlData {
    #[serde(rename = "customSQLTablesConnection")]
    pub connection: Connection<CustomSqlTable>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DatabaseTablesData {
    #[serde(rename = "databaseTablesConnection")]
    pub connection: Connection<DatabaseTable>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DatabaseRef {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub connection_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkbookRef {
    #[serde(default)]
    pub luid: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CustomSqlTable {
    #[serde(default)]
    pub query: Option<String>,

    #[serde(default)]
    pub database: Option<DatabaseRef>,

    #[serde(default)]
    pub downstream_workbooks: Vec<WorkbookRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DatabaseTable {
    pub name: String,

    #[serde(default)]
    pub schema: Option<String>,

    #[serde(default)]
    pub database: Option<DatabaseRef>,

    #[serde(default)]
    pub downstream_workbooks: Vec<WorkbookRef>,
}

impl DatabaseTable {
    /// Synthesized query standing in for the platform-generated one
    pub fn native_query(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(3);
        if let Some(database) = self.database.as_ref().and_then(|d| d.name.as_deref()) {
            parts.push(database);
        }
        if let Some(schema) = self.schema.as_deref().filter(|s| !s.is_empty()) {
            parts.push(schema);
        }
        parts.push(&self.name);

        format!("select * from {}", parts.join("."))
    }
}

fn connection_type_matches(database: Option<&DatabaseRef>, expected: &str) -> bool {
    database
        .and_then(|d| d.connection_type.as_deref())
        .map_or(false, |t| t.eq_ignore_ascii_case(expected))
}

fn push_snippet(output: &mut SnippetsByDashboard, workbooks: &[WorkbookRef], sql: &str) {
    for workbook in workbooks {
        let Some(luid) = workbook.luid.as_deref().filter(|id| !id.is_empty()) else {
            continue;
        };
        let reference = DashboardRef::new(luid, workbook.name.clone().unwrap_or_default());
        output
            .entry(reference)
            .or_default()
            .push(SqlSnippet::from(sql));
    }
}

/// Fold a page of custom SQL tables into the per-workbook snippet map
pub(crate) fn collect_custom_sql(
    output: &mut SnippetsByDashboard,
    tables: &[CustomSqlTable],
    connection_type: &str,
) {
    for table in tables {
        if !connection_type_matches(table.database.as_ref(), connection_type) {
            continue;
        }
        let Some(query) = table.query.as_deref().filter(|q| !q.trim().is_empty()) else {
            continue;
        };
        push_snippet(output, &table.downstream_workbooks, query);
    }
}

/// Fold a page of database tables into the per-workbook snippet map
pub(crate) fn collect_native_sql(
    output: &mut SnippetsByDashboard,
    tables: &[DatabaseTable],
    connection_type: &str,
) {
    for table in tables {
        // The server-side filter already applies; tables without a database
        // record are kept
        if table.database.as_ref().and_then(|d| d.connection_type.as_ref()).is_some()
            && !connection_type_matches(table.database.as_ref(), connection_type)
        {
            continue;
        }
        push_snippet(output, &table.downstream_workbooks, &table.native_query());
    }
}
