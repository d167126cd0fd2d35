//! Cookie-session helpers: CSRF tokens, `Set-Cookie` values and the
//! double-submit check.
//!
//! Three cookies make up a session:
//! - `access_token` (HttpOnly, lives as long as the token)
//! - `refresh_token` (HttpOnly, long-lived)
//! - `csrf_token` (readable by the frontend, echoed back in `x-csrf-token`)

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use payassist_config::SessionConfig;
use payassist_core::error::AuthError;
use payassist_core::store::AuthSession;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// 32 random bytes, URL-safe base64 without padding.
pub fn generate_csrf_token() -> String {
    use rand::Rng;
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub domain: Option<String>,
    pub secure: bool,
    pub refresh_max_age_secs: u64,
}

impl From<&SessionConfig> for CookieSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            domain: config.cookie_domain.clone(),
            secure: config.cookie_secure,
            refresh_max_age_secs: config.refresh_max_age_secs,
        }
    }
}

impl CookieSettings {
    fn cookie(&self, name: &str, value: &str, max_age: u64, http_only: bool) -> String {
        let mut cookie = format!("{name}={value}; Path=/; Max-Age={max_age}; SameSite=Lax");
        if http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        if let Some(domain) = &self.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        cookie
    }

    /// `Set-Cookie` values for a freshly issued session.
    pub fn session_cookies(&self, session: &AuthSession, csrf_token: &str) -> Vec<String> {
        vec![
            self.cookie(ACCESS_COOKIE, &session.access_token, session.expires_in, true),
            self.cookie(
                REFRESH_COOKIE,
                &session.refresh_token,
                self.refresh_max_age_secs,
                true,
            ),
            self.cookie(CSRF_COOKIE, csrf_token, self.refresh_max_age_secs, false),
        ]
    }

    /// `Set-Cookie` values that expire all three session cookies.
    pub fn clear_cookies(&self) -> Vec<String> {
        [ACCESS_COOKIE, REFRESH_COOKIE, CSRF_COOKIE]
            .iter()
            .map(|name| self.cookie(name, "", 0, *name != CSRF_COOKIE))
            .collect()
    }
}

/// Find one cookie in a `Cookie` request header.
pub fn read_cookie(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name && !v.is_empty()).then(|| v.to_string())
    })
}

/// Double-submit check: the cookie and header must both be present and equal.
pub fn validate_csrf(cookie: Option<&str>, header: Option<&str>) -> Result<(), AuthError> {
    match (cookie, header) {
        (Some(c), Some(h)) if !c.is_empty() && constant_time_eq(c.as_bytes(), h.as_bytes()) => {
            Ok(())
        }
        _ => {
            tracing::debug!("CSRF validation failed");
            Err(AuthError::CsrfMismatch)
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use payassist_core::store::AuthUser;

    fn session() -> AuthSession {
        AuthSession {
            access_token: "at-1".into(),
            refresh_token: "rt-1".into(),
            expires_in: 3600,
            user: AuthUser {
                id: "u1".into(),
                email: None,
            },
        }
    }

    #[test]
    fn csrf_tokens_are_urlsafe_and_unique() {
        let a = generate_csrf_token();
        let b = generate_csrf_token();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn session_cookie_attributes() {
        let settings = CookieSettings {
            domain: Some("example.com".into()),
            secure: true,
            refresh_max_age_secs: 2_592_000,
        };
        let cookies = settings.session_cookies(&session(), "csrf-1");
        assert_eq!(cookies.len(), 3);
        assert!(cookies[0].starts_with("access_token=at-1;"));
        assert!(cookies[0].contains("Max-Age=3600"));
        assert!(cookies[0].contains("HttpOnly"));
        assert!(cookies[1].contains("Max-Age=2592000"));
        assert!(!cookies[2].contains("HttpOnly"));
        for c in &cookies {
            assert!(c.contains("SameSite=Lax"));
            assert!(c.contains("Secure"));
            assert!(c.contains("Domain=example.com"));
        }
    }

    #[test]
    fn clear_cookies_expire_immediately() {
        let settings = CookieSettings::from(&SessionConfig::default());
        let cookies = settings.clear_cookies();
        assert_eq!(cookies.len(), 3);
        assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
        assert!(cookies.iter().all(|c| !c.contains("Secure")));
    }

    #[test]
    fn reads_cookie_from_header() {
        let header = "theme=dark; access_token=abc.def; csrf_token=xyz";
        assert_eq!(read_cookie(header, "access_token").as_deref(), Some("abc.def"));
        assert_eq!(read_cookie(header, "csrf_token").as_deref(), Some("xyz"));
        assert!(read_cookie(header, "refresh_token").is_none());
    }

    #[test]
    fn csrf_double_submit() {
        assert!(validate_csrf(Some("t"), Some("t")).is_ok());
        assert!(validate_csrf(Some("t"), Some("u")).is_err());
        assert!(validate_csrf(Some("t"), None).is_err());
        assert!(validate_csrf(None, Some("t")).is_err());
        assert!(validate_csrf(Some(""), Some("")).is_err());
    }
}
