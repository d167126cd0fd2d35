//! Store traits: the abstraction over the managed database and its auth API.
//!
//! The database is treated as a row-mapping query service: every row is a
//! JSON object, queries are table + column selection + simple predicates +
//! ordering + limit. Joined resources (e.g. `payslips` with `payrolls`) are
//! requested through the column selection string and come back nested.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AuthError, StoreError};

/// A single row: column name → value.
pub type Row = serde_json::Map<String, Value>;

/// A row predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    Eq { column: String, value: Value },
    Gte { column: String, value: Value },
    Lte { column: String, value: Value },
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Self::Eq { column, .. } | Self::Gte { column, .. } | Self::Lte { column, .. } => column,
        }
    }
}

/// Result ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

/// A select query against one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub table: String,
    /// Column selection, `*` by default. May embed joined resources.
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    /// Start a `select *` query on a table.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: "*".into(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn gte(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn lte(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lte {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order = Some(Order {
            column: column.into(),
            descending: true,
        });
        self
    }

    pub fn order_asc(mut self, column: impl Into<String>) -> Self {
        self.order = Some(Order {
            column: column.into(),
            descending: false,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

/// The database collaborator.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// A human-readable name for this store (e.g., "supabase", "in_memory").
    fn name(&self) -> &str;

    /// Run a select query and return all matching rows.
    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError>;

    /// Run a select query and return the first matching row, if any.
    async fn select_one(&self, query: &Query) -> Result<Option<Row>, StoreError> {
        let limited = query.clone().limit(1);
        Ok(self.select(&limited).await?.into_iter().next())
    }

    /// Insert a row and return it as stored.
    async fn insert(&self, table: &str, row: Row) -> Result<Row, StoreError>;

    /// Apply `patch` to every row matching `filters`; returns the updated rows.
    async fn update(&self, table: &str, patch: Row, filters: &[Filter])
    -> Result<Vec<Row>, StoreError>;
}

/// A user as known to the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// An issued session.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    pub user: AuthUser,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("user", &self.user)
            .finish()
    }
}

/// The auth collaborator.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolve an access token to its user.
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError>;

    /// Email/password sign-in.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError>;

    /// Exchange a refresh token for a new session.
    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, AuthError>;

    /// Revoke the session behind an access token, refresh tokens included.
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_builder_accumulates() {
        let q = Query::table("payslips")
            .select("*, payrolls(pay_period_start, pay_period_end)")
            .eq("employee_id", "emp-1")
            .gte("created_at", "2025-04-01")
            .order_desc("created_at")
            .limit(12);

        assert_eq!(q.table, "payslips");
        assert_eq!(q.filters.len(), 2);
        assert_eq!(q.filters[0].column(), "employee_id");
        assert_eq!(q.limit, Some(12));
        assert!(q.order.as_ref().is_some_and(|o| o.descending));
    }

    #[test]
    fn session_debug_hides_tokens() {
        let session = AuthSession {
            access_token: "eyJhbGciOi.secret".into(),
            refresh_token: "refresh-secret".into(),
            expires_in: 3600,
            user: AuthUser {
                id: "u1".into(),
                email: None,
            },
        };
        let debug = format!("{session:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("3600"));
    }
}
