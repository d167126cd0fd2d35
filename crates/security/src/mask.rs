//! PII masking for string leaves.
//!
//! Emails keep one leading character of the local part and of the first
//! domain label. Phone-like strings (any run of six or more digits) keep a
//! two-digit prefix, plus the `+91-` country code when present. Bare
//! numeric codes of four digits or fewer are masked completely.

use std::sync::LazyLock;

use regex_lite::Regex;
use serde_json::{Map, Value};

use crate::redact;
use crate::walk::{walk, walk_map};

/// Replaces the hidden part of emails.
pub const EMAIL_MASK: &str = "***";

/// Replaces the hidden part of numbers; also the fallback for anything unparseable.
pub const MASK_TOKEN: &str = "****";

static EMAIL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^([^@\s]+)@([A-Za-z0-9-]+)((?:\.[A-Za-z0-9-]+)+)$").ok()
});

static DIGIT_RUN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\d{6,}").ok());

static SHORT_CODE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^\+?\d{1,4}$").ok());

fn is_match(re: &LazyLock<Option<Regex>>, s: &str) -> bool {
    re.as_ref().is_some_and(|r| r.is_match(s))
}

fn keep_all(_: &str) -> bool {
    true
}

/// Mask every email and phone-like string leaf.
pub fn mask(value: &Value) -> Value {
    walk(value, &keep_all, &mask_str)
}

/// [`mask`] for an object.
pub fn mask_map(map: &Map<String, Value>) -> Map<String, Value> {
    walk_map(map, &keep_all, &mask_str)
}

/// Mask a single string. Non-matching strings come back unchanged.
pub fn mask_str(s: &str) -> String {
    let trimmed = s.trim();

    if let Some(masked) = mask_email(trimmed) {
        return masked;
    }

    if is_match(&DIGIT_RUN, trimmed) {
        return mask_phone(trimmed).unwrap_or_else(|| MASK_TOKEN.to_string());
    }

    if is_match(&SHORT_CODE, trimmed) {
        return MASK_TOKEN.to_string();
    }

    s.to_string()
}

fn mask_email(s: &str) -> Option<String> {
    let caps = EMAIL.as_ref()?.captures(s)?;
    let local = caps.get(1)?.as_str();
    let label = caps.get(2)?.as_str();
    let rest = caps.get(3)?.as_str();

    let local_first = local.chars().next()?;
    let label_first = label.chars().next()?;
    Some(format!(
        "{local_first}{EMAIL_MASK}@{label_first}{EMAIL_MASK}{rest}"
    ))
}

fn mask_phone(s: &str) -> Option<String> {
    let digits: String = s.chars().filter(char::is_ascii_digit).collect();

    if digits.len() <= 4 {
        return Some(MASK_TOKEN.to_string());
    }

    if digits.starts_with("91") && digits.len() >= 10 {
        return Some(format!("+91-{}{MASK_TOKEN}", digits.get(2..4)?));
    }

    Some(format!("{}{MASK_TOKEN}", digits.get(..2)?))
}

/// Redact, then mask. Null and non-object input yields an empty object.
pub fn sanitize_and_mask(context: Option<&Map<String, Value>>) -> Map<String, Value> {
    match context {
        Some(ctx) if !ctx.is_empty() => mask_map(&redact::redact_map(ctx)),
        _ => Map::new(),
    }
}

/// [`sanitize_and_mask`] for an arbitrary JSON value.
pub fn sanitize_and_mask_value(value: &Value) -> Map<String, Value> {
    sanitize_and_mask(value.as_object())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn masks_email() {
        assert_eq!(mask_str("jane.doe@example.com"), "j***@e***.com");
        assert_eq!(mask_str("ravi@mail.example.co.in"), "r***@m***.example.co.in");
    }

    #[test]
    fn masks_indian_phone_with_country_code() {
        let masked = mask_str("+919876543210");
        assert_eq!(masked, "+91-98****");
        assert!(masked.starts_with("+91-"));
        assert!(masked.ends_with("****"));
        let revealed: String = masked["+91-".len()..masked.len() - 4].to_string();
        assert_eq!(revealed.len(), 2);
        assert!(revealed.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn masks_other_phone_shapes() {
        assert_eq!(mask_str("(555) 123-456789"), "55****");
        assert_eq!(mask_str("98765 432100"), "98****");
        assert_eq!(mask_str("ref 1234567"), "12****");
    }

    #[test]
    fn short_codes_are_fully_masked() {
        assert_eq!(mask_str("123"), "****");
        assert_eq!(mask(&json!("4821")), json!("****"));
    }

    #[test]
    fn ordinary_strings_pass_through() {
        assert_eq!(mask_str("Monthly salary for May"), "Monthly salary for May");
        assert_eq!(mask_str("2025-04-01"), "2025-04-01");
        assert_eq!(mask_str("not-an-email@"), "not-an-email@");
        assert_eq!(mask_str(""), "");
    }

    #[test]
    fn numbers_are_not_strings() {
        let v = json!({"gross_pay": 5000000, "phone": "+919876543210"});
        let out = mask(&v);
        assert_eq!(out["gross_pay"], 5000000);
        assert_eq!(out["phone"], "+91-98****");
    }

    #[test]
    fn sanitize_and_mask_handles_empty() {
        assert!(sanitize_and_mask(None).is_empty());
        assert!(sanitize_and_mask(Some(&Map::new())).is_empty());
        assert!(sanitize_and_mask_value(&Value::Null).is_empty());
        assert!(sanitize_and_mask_value(&json!([1, 2])).is_empty());
    }

    #[test]
    fn sanitize_and_mask_redacts_first() {
        let ctx = json!({
            "data": {
                "email": "test@example.com",
                "phone": "+919876543210",
                "bank_account": "1234567890",
                "pan": "ABCDE1234F",
                "gross_pay": 50000,
                "net_pay": 42000
            }
        });
        let out = sanitize_and_mask_value(&ctx);
        let data = out["data"].as_object().unwrap();
        assert!(!data.contains_key("bank_account"));
        assert!(!data.contains_key("pan"));
        assert_eq!(data["email"], "t***@e***.com");
        assert_eq!(data["phone"], "+91-98****");
        assert_eq!(data["gross_pay"], 50000);
    }
}
