//! Supabase client: PostgREST row API plus GoTrue auth.
//!
//! Row reads and writes go to `/rest/v1/<table>`; filters are encoded as
//! PostgREST query operators (`col=eq.value`). Auth calls go to `/auth/v1`.

use async_trait::async_trait;
use payassist_core::error::{AuthError, StoreError};
use payassist_core::store::{
    AuthProvider, AuthSession, AuthUser, DataStore, Filter, Query, Row,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

pub struct SupabaseClient {
    base_url: String,
    anon_key: String,
    /// Key used for row access; the service key when configured
    data_key: String,
    client: reqwest::Client,
}

impl SupabaseClient {
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        service_key: Option<String>,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::NotConfigured(format!("HTTP client: {e}")))?;

        let anon_key = anon_key.into();
        let data_key = service_key.unwrap_or_else(|| anon_key.clone());

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key,
            data_key,
            client,
        })
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn rest_request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.rest_url(table))
            .header("apikey", &self.data_key)
            .header("Authorization", format!("Bearer {}", self.data_key))
    }

    async fn read_rows(table: &str, response: reqwest::Response) -> Result<Vec<Row>, StoreError> {
        let status = response.status().as_u16();
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(table, status, "PostgREST request failed");
            return Err(StoreError::QueryFailed {
                table: table.to_string(),
                status_code: status,
                message,
            });
        }

        let body: Value = response.json().await.map_err(|e| StoreError::Decode {
            table: table.to_string(),
            reason: e.to_string(),
        })?;

        match body {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(row) => Ok(row),
                    other => Err(StoreError::Decode {
                        table: table.to_string(),
                        reason: format!("expected object row, got {other}"),
                    }),
                })
                .collect(),
            Value::Object(row) => Ok(vec![row]),
            other => Err(StoreError::Decode {
                table: table.to_string(),
                reason: format!("expected array of rows, got {other}"),
            }),
        }
    }
}

/// Render a filter value the way PostgREST expects it in a query string.
fn filter_literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".into(),
        other => other.to_string(),
    }
}

fn filter_param(filter: &Filter) -> (String, String) {
    match filter {
        Filter::Eq { column, value } if value.is_null() => (column.clone(), "is.null".into()),
        Filter::Eq { column, value } => (column.clone(), format!("eq.{}", filter_literal(value))),
        Filter::Gte { column, value } => (column.clone(), format!("gte.{}", filter_literal(value))),
        Filter::Lte { column, value } => (column.clone(), format!("lte.{}", filter_literal(value))),
    }
}

/// Query-string parameters for a select.
pub(crate) fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), query.columns.replace(' ', ""))];
    params.extend(query.filters.iter().map(filter_param));
    if let Some(order) = &query.order {
        let direction = if order.descending { "desc" } else { "asc" };
        params.push(("order".into(), format!("{}.{}", order.column, direction)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".into(), limit.to_string()));
    }
    params
}

#[async_trait]
impl DataStore for SupabaseClient {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        debug!(table = %query.table, filters = query.filters.len(), "select");
        let response = self
            .rest_request(reqwest::Method::GET, &query.table)
            .query(&query_params(query))
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Self::read_rows(&query.table, response).await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, StoreError> {
        debug!(table, "insert");
        let response = self
            .rest_request(reqwest::Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Self::read_rows(table, response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode {
                table: table.to_string(),
                reason: "insert returned no rows".into(),
            })
    }

    async fn update(
        &self,
        table: &str,
        patch: Row,
        filters: &[Filter],
    ) -> Result<Vec<Row>, StoreError> {
        debug!(table, filters = filters.len(), "update");
        let params: Vec<(String, String)> = filters.iter().map(filter_param).collect();
        let response = self
            .rest_request(reqwest::Method::PATCH, table)
            .header("Prefer", "return=representation")
            .query(&params)
            .json(&patch)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Self::read_rows(table, response).await
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
    user: AuthUser,
}

fn default_expires_in() -> u64 {
    3600
}

impl From<TokenResponse> for AuthSession {
    fn from(t: TokenResponse) -> Self {
        Self {
            access_token: t.access_token,
            refresh_token: t.refresh_token,
            expires_in: t.expires_in,
            user: t.user,
        }
    }
}

impl SupabaseClient {
    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<AuthSession, AuthError> {
        let response = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Upstream(e.to_string()))?;

        let status = response.status().as_u16();
        match status {
            200 => response
                .json::<TokenResponse>()
                .await
                .map(AuthSession::from)
                .map_err(|e| AuthError::Upstream(format!("bad token response: {e}"))),
            400 | 401 | 422 if grant_type == "password" => Err(AuthError::InvalidCredentials),
            400 | 401 | 403 => Err(AuthError::InvalidToken),
            _ => {
                let message = response.text().await.unwrap_or_default();
                warn!(status, grant_type, "Auth token grant failed");
                Err(AuthError::Upstream(format!("status {status}: {message}")))
            }
        }
    }
}

#[async_trait]
impl AuthProvider for SupabaseClient {
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let response = self
            .client
            .get(self.auth_url("user"))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {access_token}"))
            .send()
            .await
            .map_err(|e| AuthError::Upstream(e.to_string()))?;

        match response.status().as_u16() {
            200 => response
                .json::<AuthUser>()
                .await
                .map_err(|e| AuthError::Upstream(format!("bad user response: {e}"))),
            401 | 403 => Err(AuthError::InvalidToken),
            status => Err(AuthError::Upstream(format!("status {status}"))),
        }
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        self.token_grant(
            "password",
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        self.token_grant(
            "refresh_token",
            serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .client
            .post(self.auth_url("logout"))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {access_token}"))
            .send()
            .await
            .map_err(|e| AuthError::Upstream(e.to_string()))?;

        match response.status().as_u16() {
            200 | 204 => Ok(()),
            401 | 403 | 404 => Err(AuthError::InvalidToken),
            status => {
                warn!(status, "Auth logout failed");
                Err(AuthError::Upstream(format!("status {status}")))
            }
        }
    }
}
