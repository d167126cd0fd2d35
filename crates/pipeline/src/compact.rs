//! Context compaction: a whitelist projection that bounds prompt size.

use payassist_core::Context;
use serde_json::{Map, Value};

const ALLOWANCE_KEYS: &[&str] = &["hra", "meal", "transport", "other"];
const CURRENT_KEYS: &[&str] = &["base_pay", "gross_pay", "total_deductions", "net_pay"];
const PERIOD_KEYS: &[&str] = &["pay_period_start", "pay_period_end"];
const PREVIOUS_KEYS: &[&str] = &[
    "created_at",
    "gross_pay",
    "net_pay",
    "leave_deduction",
    "total_deductions",
];
const YTD_KEYS: &[&str] = &["gross_ytd", "net_ytd", "months_included"];
const MAX_PREVIOUS: usize = 12;

/// Look a field up on a payslip, falling back to its `pay_data_snapshot`.
fn payslip_field<'a>(payslip: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    payslip.get(key).filter(|v| !v.is_null()).or_else(|| {
        payslip
            .get("pay_data_snapshot")
            .and_then(Value::as_object)
            .and_then(|s| s.get(key))
            .filter(|v| !v.is_null())
    })
}

/// Pay-period dates live on the payslip or on its joined payroll.
fn period_field<'a>(payslip: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    payslip.get(key).filter(|v| !v.is_null()).or_else(|| {
        let payroll = match payslip.get("payrolls")? {
            Value::Array(items) => items.first()?,
            other => other,
        };
        payroll.get(key).filter(|v| !v.is_null())
    })
}

fn pick(
    source: &Map<String, Value>,
    keys: &[&str],
    lookup: impl Fn(&Map<String, Value>, &str) -> Option<Value>,
) -> Map<String, Value> {
    keys.iter()
        .filter_map(|k| lookup(source, k).map(|v| (k.to_string(), v)))
        .collect()
}

fn compact_current(payslip: &Map<String, Value>) -> Map<String, Value> {
    let mut out = pick(payslip, CURRENT_KEYS, |p, k| payslip_field(p, k).cloned());

    if let Some(allowances) = payslip_field(payslip, "allowances").and_then(Value::as_object) {
        let kept = pick(allowances, ALLOWANCE_KEYS, |a, k| a.get(k).cloned());
        if !kept.is_empty() {
            out.insert("allowances".into(), Value::Object(kept));
        }
    }

    out.extend(pick(payslip, PERIOD_KEYS, |p, k| period_field(p, k).cloned()));
    out
}

fn compact_previous(items: &[Value]) -> Vec<Value> {
    items
        .iter()
        .filter_map(Value::as_object)
        .take(MAX_PREVIOUS)
        .map(|p| Value::Object(pick(p, PREVIOUS_KEYS, |p, k| payslip_field(p, k).cloned())))
        .collect()
}

/// Project a sanitized context down to the fields prompts use.
///
/// Keeps the current payslip summary, up to twelve previous payslips, the
/// year-to-date totals and the `intent` / `page_view` tags. Everything else
/// is dropped. Missing pieces are simply left out.
pub fn compact(context: &Context) -> Context {
    let mut out = Context::new();

    if let Some(data) = context.get("data").and_then(Value::as_object) {
        let mut kept = Map::new();

        if let Some(current) = data.get("current_payslip").and_then(Value::as_object) {
            kept.insert("current_payslip".into(), Value::Object(compact_current(current)));
        }

        if let Some(previous) = data.get("previous_payslips").and_then(Value::as_array) {
            kept.insert(
                "previous_payslips".into(),
                Value::Array(compact_previous(previous)),
            );
        }

        if let Some(ytd) = data.get("ytd_totals").and_then(Value::as_object) {
            kept.insert(
                "ytd_totals".into(),
                Value::Object(pick(ytd, YTD_KEYS, |y, k| y.get(k).cloned())),
            );
        }

        if !kept.is_empty() {
            out.insert("data".into(), Value::Object(kept));
        }
    }

    for tag in ["intent", "page_view"] {
        if let Some(v) = context.get(tag) {
            out.insert(tag.into(), v.clone());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(v: Value) -> Context {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn empty_context_compacts_to_empty() {
        assert!(compact(&Context::new()).is_empty());
        assert!(compact(&ctx(json!({"data": {}}))).is_empty());
        assert!(compact(&ctx(json!({"data": null}))).is_empty());
    }

    #[test]
    fn current_payslip_is_whitelisted() {
        let c = ctx(json!({
            "intent": "payslip_explain",
            "page_view": "payslip_detail",
            "data": {
                "current_payslip": {
                    "gross_pay": 50000,
                    "net_pay": 42000,
                    "total_deductions": 8000,
                    "status": "paid",
                    "pay_data_snapshot": {
                        "base_pay": 40000,
                        "allowances": {"hra": 6000, "meal": 1000, "bonus": 3000},
                        "tax_deduction": 2500
                    },
                    "payrolls": {"pay_period_start": "2025-05-01", "pay_period_end": "2025-05-31"}
                },
                "salary_structure": {"base_pay": 40000}
            }
        }));

        let out = compact(&c);
        assert_eq!(
            Value::Object(out),
            json!({
                "intent": "payslip_explain",
                "page_view": "payslip_detail",
                "data": {
                    "current_payslip": {
                        "base_pay": 40000,
                        "allowances": {"hra": 6000, "meal": 1000},
                        "gross_pay": 50000,
                        "total_deductions": 8000,
                        "net_pay": 42000,
                        "pay_period_start": "2025-05-01",
                        "pay_period_end": "2025-05-31"
                    }
                }
            })
        );
    }

    #[test]
    fn previous_payslips_capped_and_trimmed() {
        let previous: Vec<Value> = (0..15)
            .map(|i| {
                json!({
                    "created_at": format!("2025-01-{:02}", i + 1),
                    "gross_pay": 50000 + i,
                    "net_pay": 42000,
                    "status": "paid",
                    "pay_data_snapshot": {"leave_deduction": 1200}
                })
            })
            .collect();
        let out = compact(&ctx(json!({"data": {"previous_payslips": previous}})));
        let items = out["data"]["previous_payslips"].as_array().unwrap();
        assert_eq!(items.len(), 12);
        assert_eq!(items[0]["leave_deduction"], 1200);
        assert!(items[0].get("status").is_none());
    }

    #[test]
    fn ytd_kept_verbatim() {
        let c = ctx(json!({"data": {"ytd_totals": {
            "gross_ytd": 100000, "net_ytd": 84000, "months_included": 2, "fiscal_year_start": "2025-04-01"
        }}}));
        let out = compact(&c);
        assert_eq!(
            out["data"]["ytd_totals"],
            json!({"gross_ytd": 100000, "net_ytd": 84000, "months_included": 2})
        );
    }

    #[test]
    fn partial_payslip_omits_missing_fields() {
        let out = compact(&ctx(json!({"data": {"current_payslip": {"net_pay": 1}}})));
        assert_eq!(out["data"]["current_payslip"], json!({"net_pay": 1}));
    }
}
