//! Privacy and session security for payassist.
//!
//! Provides:
//! - **Redaction**: drop sensitive keys from nested JSON before it leaves the process
//! - **Masking**: partially obscure emails and phone numbers in string values
//! - **Sessions**: CSRF tokens, session cookies and the double-submit check
//!
//! Redaction and masking share one tree walk ([`walk::walk`]).

pub mod mask;
pub mod redact;
pub mod session;
pub mod walk;

pub use mask::{MASK_TOKEN, mask, mask_str, sanitize_and_mask, sanitize_and_mask_value};
pub use redact::{SENSITIVE_FIELDS, is_sensitive_key, redact, redact_map};
pub use session::{CookieSettings, generate_csrf_token, read_cookie, validate_csrf};
