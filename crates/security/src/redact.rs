//! Key-name redaction.
//!
//! A key is sensitive when its lowercase form contains any entry of
//! [`SENSITIVE_FIELDS`] as a substring. Sensitive pairs are dropped whole.
//! The match is deliberately blunt: `id` removes every key containing "id"
//! (including `paid_days`), and `pan` removes `company_name`.

use serde_json::{Map, Value};

use crate::walk::{walk, walk_map};

pub const SENSITIVE_FIELDS: &[&str] = &[
    "bank_account",
    "bank_account_number",
    "account_number",
    "ifsc",
    "ifsc_code",
    "ssn",
    "tax_id",
    "pan",
    "pan_number",
    "aadhaar",
    "aadhaar_number",
    "passport",
    "password",
    "token",
    "api_key",
    "secret",
    "profile_id",
    "id",
    "employee_id",
    "payroll_id",
    "created_by",
    "updated_by",
    "pdf_blob",
    "blob",
];

pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_FIELDS.iter().any(|field| lower.contains(field))
}

fn keep(key: &str) -> bool {
    !is_sensitive_key(key)
}

fn unchanged(s: &str) -> String {
    s.to_string()
}

/// Drop every sensitive key at any depth.
pub fn redact(value: &Value) -> Value {
    walk(value, &keep, &unchanged)
}

/// [`redact`] for an object.
pub fn redact_map(map: &Map<String, Value>) -> Map<String, Value> {
    walk_map(map, &keep, &unchanged)
}
