//! In-memory store: useful for testing and local demos.
//!
//! Tables are plain vectors of JSON rows. Filters compare numbers
//! numerically and everything else by its string form, which orders ISO
//! dates correctly. Embedded resources in a column selection are not
//! resolved: seed rows with the nested objects already in place.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use payassist_core::error::{AuthError, StoreError};
use payassist_core::store::{
    AuthProvider, AuthSession, AuthUser, DataStore, Filter, Query, Row,
};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct AuthState {
    /// email -> (password, user)
    accounts: HashMap<String, (String, AuthUser)>,
    access_tokens: HashMap<String, AuthUser>,
    refresh_tokens: HashMap<String, AuthUser>,
}

/// An in-memory implementation of both [`DataStore`] and [`AuthProvider`].
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<String, Vec<Row>>>>,
    auth: Arc<RwLock<AuthState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rows to a table, creating it if needed.
    pub async fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        let mut tables = self.tables.write().await;
        let entry = tables.entry(table.to_string()).or_default();
        entry.extend(rows.into_iter().filter_map(|v| match v {
            Value::Object(row) => Some(row),
            _ => None,
        }));
    }

    /// Register a user that can sign in with email and password.
    pub async fn add_user(&self, user: AuthUser, password: impl Into<String>) {
        let email = user.email.clone().unwrap_or_else(|| user.id.clone());
        self.auth
            .write()
            .await
            .accounts
            .insert(email, (password.into(), user));
    }

    /// Issue an access token for a user without going through sign-in.
    pub async fn issue_token(&self, user: AuthUser) -> String {
        let token = Uuid::new_v4().to_string();
        self.auth
            .write()
            .await
            .access_tokens
            .insert(token.clone(), user);
        token
    }

    /// Number of rows currently in a table.
    pub async fn count(&self, table: &str) -> usize {
        self.tables
            .read()
            .await
            .get(table)
            .map(Vec::len)
            .unwrap_or(0)
    }

    async fn new_session(&self, user: AuthUser) -> AuthSession {
        let access_token = Uuid::new_v4().to_string();
        let refresh_token = Uuid::new_v4().to_string();
        let mut auth = self.auth.write().await;
        auth.access_tokens.insert(access_token.clone(), user.clone());
        auth.refresh_tokens.insert(refresh_token.clone(), user.clone());
        AuthSession {
            access_token,
            refresh_token,
            expires_in: 3600,
            user,
        }
    }
}

/// Compare two JSON values: numbers numerically, everything else as text.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => Some(text_of(a).cmp(&text_of(b))),
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn row_matches(row: &Row, filter: &Filter) -> bool {
    let cell = row.get(filter.column()).unwrap_or(&Value::Null);
    match filter {
        Filter::Eq { value, .. } => {
            cell == value || (!cell.is_null() && !value.is_null() && text_of(cell) == text_of(value))
        }
        Filter::Gte { value, .. } => {
            matches!(compare_values(cell, value), Some(Ordering::Greater | Ordering::Equal))
        }
        Filter::Lte { value, .. } => {
            matches!(compare_values(cell, value), Some(Ordering::Less | Ordering::Equal))
        }
    }
}

/// Split a column selection at top-level commas, dropping embedded column lists.
fn selected_columns(columns: &str) -> Option<Vec<String>> {
    let mut names = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();

    for ch in columns.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => names.push(std::mem::take(&mut current)),
            c if depth == 0 && !c.is_whitespace() => current.push(c),
            _ => {}
        }
    }
    names.push(current);

    let names: Vec<String> = names.into_iter().filter(|n| !n.is_empty()).collect();
    if names.iter().any(|n| n == "*") {
        None
    } else {
        Some(names)
    }
}

fn project(row: &Row, columns: &Option<Vec<String>>) -> Row {
    match columns {
        None => row.clone(),
        Some(names) => names
            .iter()
            .filter_map(|n| row.get(n).map(|v| (n.clone(), v.clone())))
            .collect(),
    }
}

#[async_trait]
impl DataStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(&query.table) else {
            return Ok(Vec::new());
        };

        let mut results: Vec<&Row> = rows
            .iter()
            .filter(|row| query.filters.iter().all(|f| row_matches(row, f)))
            .collect();

        if let Some(order) = &query.order {
            results.sort_by(|a, b| {
                let left = a.get(&order.column).unwrap_or(&Value::Null);
                let right = b.get(&order.column).unwrap_or(&Value::Null);
                let ord = match (left.is_null(), right.is_null()) {
                    (true, true) => Ordering::Equal,
                    // Nulls sort last in both directions
                    (true, false) => return Ordering::Greater,
                    (false, true) => return Ordering::Less,
                    (false, false) => compare_values(left, right).unwrap_or(Ordering::Equal),
                };
                if order.descending { ord.reverse() } else { ord }
            });
        }

        let columns = selected_columns(&query.columns);
        Ok(results
            .into_iter()
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|row| project(row, &columns))
            .collect())
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<Row, StoreError> {
        row.entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        table: &str,
        patch: Row,
        filters: &[Filter],
    ) -> Result<Vec<Row>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(Vec::new());
        };

        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|r| filters.iter().all(|f| row_matches(r, f))) {
            for (k, v) in &patch {
                row.insert(k.clone(), v.clone());
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }
}

#[async_trait]
impl AuthProvider for InMemoryStore {
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        self.auth
            .read()
            .await
            .access_tokens
            .get(access_token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let user = {
            let auth = self.auth.read().await;
            match auth.accounts.get(email) {
                Some((expected, user)) if expected == password => user.clone(),
                _ => return Err(AuthError::InvalidCredentials),
            }
        };
        Ok(self.new_session(user).await)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let user = self
            .auth
            .write()
            .await
            .refresh_tokens
            .remove(refresh_token)
            .ok_or(AuthError::InvalidToken)?;
        Ok(self.new_session(user).await)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let mut auth = self.auth.write().await;
        let user = auth
            .access_tokens
            .remove(access_token)
            .ok_or(AuthError::InvalidToken)?;
        auth.refresh_tokens.retain(|_, u| u.id != user.id);
        Ok(())
    }
}
