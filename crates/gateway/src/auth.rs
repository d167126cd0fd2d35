//! Session routes and caller identity.
//!
//! - `POST /login`: email/password sign-in, sets the session cookies
//! - `POST /logout`: expires the session cookies
//! - `POST /refresh`: swaps the refresh cookie for a new session (CSRF checked)

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderName, header},
    response::{AppendHeaders, IntoResponse},
    routing::post,
};
use payassist_core::{AuthError, Identity, Query};
use payassist_security::generate_csrf_token;
use payassist_security::session::{ACCESS_COOKIE, CSRF_COOKIE, CSRF_HEADER, REFRESH_COOKIE};
use payassist_security::{read_cookie, validate_csrf};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::SharedState;
use crate::error::ApiError;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/refresh", post(refresh_handler))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub csrf_token: String,
    pub user: SessionUser,
}

#[derive(Serialize, Deserialize)]
pub struct RefreshResponse {
    pub message: String,
    pub csrf_token: String,
}

fn set_cookies(values: Vec<String>) -> AppendHeaders<Vec<(HeaderName, String)>> {
    AppendHeaders(
        values
            .into_iter()
            .map(|v| (header::SET_COOKIE, v))
            .collect(),
    )
}

fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|h| read_cookie(h, name))
}

/// The access token from `Authorization: Bearer`, else the session cookie.
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| cookie(headers, ACCESS_COOKIE))
}

/// Resolve the caller, if any credentials were sent.
///
/// No credentials is `Ok(None)`; credentials the auth service rejects are an
/// error. Role and company come from the caller's `profiles` row when it
/// can be read.
pub async fn resolve_identity(
    state: &SharedState,
    headers: &HeaderMap,
) -> Result<Option<Identity>, AuthError> {
    let Some(token) = access_token(headers) else {
        return Ok(None);
    };

    let user = state.auth.get_user(&token).await?;
    let mut identity = Identity::new(user.id.clone());
    identity.email = user.email;

    match state
        .store
        .select_one(&Query::table("profiles").eq("id", user.id.as_str()))
        .await
    {
        Ok(Some(profile)) => {
            let text = |key: &str| profile.get(key).and_then(Value::as_str).map(str::to_string);
            identity.role = text("role");
            identity.company_id = text("company_id");
        }
        Ok(None) => debug!(user_id = %user.id, "No profile row for caller"),
        Err(e) => warn!(user_id = %user.id, error = %e, "Profile lookup failed"),
    }

    Ok(Some(identity))
}

async fn login_handler(
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = payload.email.trim();
    if !email.contains('@') || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let session = state
        .auth
        .sign_in_with_password(email, &payload.password)
        .await
        .map_err(|e| {
            warn!(error = %e, "Login failed");
            ApiError::from(e)
        })?;

    let csrf_token = generate_csrf_token();
    let cookies = state.cookies.session_cookies(&session, &csrf_token);
    info!(user_id = %session.user.id, "User logged in");

    Ok((
        set_cookies(cookies),
        Json(LoginResponse {
            message: "logged_in".into(),
            csrf_token,
            user: SessionUser {
                id: session.user.id,
                email: session.user.email,
            },
        }),
    ))
}

/// Revokes the caller's session when one is presented. The cookies are
/// cleared either way.
async fn logout_handler(State(state): State<SharedState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = access_token(&headers) {
        if let Err(e) = state.auth.sign_out(&token).await {
            warn!(error = %e, "Session revocation failed");
        }
    }
    info!("User logged out");
    (
        set_cookies(state.cookies.clear_cookies()),
        Json(serde_json::json!({"message": "logged_out"})),
    )
}

async fn refresh_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let Some(refresh_token) = cookie(&headers, REFRESH_COOKIE) else {
        return Err(ApiError::new(
            axum::http::StatusCode::UNAUTHORIZED,
            "No refresh token",
        ));
    };

    let csrf_header = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok());
    validate_csrf(cookie(&headers, CSRF_COOKIE).as_deref(), csrf_header)?;

    let session = state
        .auth
        .refresh_session(&refresh_token)
        .await
        .map_err(|e| {
            warn!(error = %e, "Token refresh failed");
            ApiError::from(e)
        })?;

    let csrf_token = generate_csrf_token();
    let cookies = state.cookies.session_cookies(&session, &csrf_token);
    info!(user_id = %session.user.id, "Token refreshed");

    Ok((
        set_cookies(cookies),
        Json(RefreshResponse {
            message: "token_refreshed".into(),
            csrf_token,
        }),
    ))
}
