//! Authenticated identity of the caller.
//!
//! Built by the gateway from the auth service (`get_user`) plus the caller's
//! `profiles` row. The pipeline only reads it: the user id scopes every
//! enrichment query and the company id scopes company-wide lookups.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,

    #[serde(default)]
    pub email: Option<String>,

    /// "admin" or "employee"
    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub company_id: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            role: None,
            company_id: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_company(mut self, company_id: impl Into<String>) -> Self {
        self.company_id = Some(company_id.into());
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}
