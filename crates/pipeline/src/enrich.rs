//! Context enrichment from the caller's own payroll records.
//!
//! Reads are scoped to the employee behind the identity (or that
//! employee's company, for leave periods). Enrichment is best-effort: a
//! store failure logs a warning and hands back the context untouched.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use payassist_core::error::StoreError;
use payassist_core::{Context, DataStore, Identity, Intent, Query, Row};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

/// Payslip rows come back with their payroll's pay period embedded.
pub const PAYSLIP_COLUMNS: &str = "*, payrolls(pay_period_start, pay_period_end)";

const RECENT_PAYSLIPS: usize = 12;

/// April 1 of this year from April onwards, otherwise April 1 of last year.
pub fn fiscal_year_start(today: NaiveDate) -> NaiveDate {
    let year = if today.month() >= 4 {
        today.year()
    } else {
        today.year() - 1
    };
    NaiveDate::from_ymd_opt(year, 4, 1).unwrap_or(today)
}

pub struct Enricher {
    store: Arc<dyn DataStore>,
    today: Option<NaiveDate>,
}

impl Enricher {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store, today: None }
    }

    /// Pin "today" (fiscal year and upcoming-period cutoffs).
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Enrich `base` for `intent`. Never fails.
    ///
    /// Returns `base` unchanged when the identity has no employee record or
    /// when any read fails.
    pub async fn enrich(&self, intent: Intent, base: &Context, identity: &Identity) -> Context {
        match self.try_enrich(intent, base, identity).await {
            Ok(Some(enriched)) => enriched,
            Ok(None) => {
                debug!(user_id = %identity.user_id, "No employee record, skipping enrichment");
                base.clone()
            }
            Err(e) => {
                warn!(intent = %intent, error = %e, "Enrichment failed, using unenriched context");
                base.clone()
            }
        }
    }

    async fn try_enrich(
        &self,
        intent: Intent,
        base: &Context,
        identity: &Identity,
    ) -> Result<Option<Context>, StoreError> {
        let user_id = identity.user_id.as_str();
        let employee = self
            .store
            .select_one(&Query::table("employees").eq("id", user_id))
            .await?;
        let Some(employee) = employee else {
            return Ok(None);
        };

        let mut data = base
            .get("data")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        match intent {
            Intent::PayslipExplain => {
                self.payslip_history(&mut data, base, user_id).await?;
            }
            Intent::LeaveAdvice => {
                self.leave_overview(&mut data, &employee, identity).await?;
            }
            Intent::PayslipTaxSuggestions | Intent::DashboardInsights => {
                self.recent_summary(&mut data, user_id).await?;
            }
            Intent::General => {}
        }

        let mut enriched = base.clone();
        if !data.is_empty() {
            enriched.insert("data".into(), Value::Object(data));
        }

        let mut meta = enriched
            .get("meta")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        meta.extend(self.identity_meta(&employee, identity).await);
        if !meta.is_empty() {
            enriched.insert("meta".into(), Value::Object(meta));
        }

        debug!(intent = %intent, "Context enriched");
        Ok(Some(enriched))
    }

    async fn payslip_history(
        &self,
        data: &mut Map<String, Value>,
        base: &Context,
        user_id: &str,
    ) -> Result<(), StoreError> {
        let fy_start = fiscal_year_start(self.today());
        let payslips = self
            .store
            .select(
                &Query::table("payslips")
                    .select(PAYSLIP_COLUMNS)
                    .eq("employee_id", user_id)
                    .gte("created_at", fy_start.to_string())
                    .order_desc("created_at")
                    .limit(RECENT_PAYSLIPS),
            )
            .await?;

        let current = match requested_payslip_id(base) {
            Some(id) => match payslips.iter().find(|p| row_id(p) == Some(id)) {
                Some(found) => Some(found.clone()),
                None => {
                    debug!(payslip_id = id, "Requested payslip outside fiscal year batch, looking it up");
                    self.store
                        .select_one(
                            &Query::table("payslips")
                                .select(PAYSLIP_COLUMNS)
                                .eq("id", id)
                                .eq("employee_id", user_id),
                        )
                        .await?
                }
            },
            None => payslips.first().cloned(),
        };

        let current_id = current.as_ref().and_then(row_id).map(str::to_string);
        let previous: Vec<Value> = payslips
            .iter()
            .filter(|p| current_id.is_none() || row_id(p) != current_id.as_deref())
            .take(RECENT_PAYSLIPS - 1)
            .cloned()
            .map(Value::Object)
            .collect();

        if let Some(current) = current {
            data.insert("current_payslip".into(), Value::Object(current));
        }
        data.insert("previous_payslips".into(), Value::Array(previous));

        match ytd_totals(&payslips) {
            Ok((gross, net)) => {
                data.insert(
                    "ytd_totals".into(),
                    json!({
                        "gross_ytd": amount(gross),
                        "net_ytd": amount(net),
                        "months_included": payslips.len(),
                        "fiscal_year_start": fy_start.to_string(),
                    }),
                );
            }
            Err(reason) => warn!(%reason, "Could not compute YTD totals"),
        }

        Ok(())
    }

    async fn leave_overview(
        &self,
        data: &mut Map<String, Value>,
        employee: &Row,
        identity: &Identity,
    ) -> Result<(), StoreError> {
        let user_id = identity.user_id.as_str();

        let balances = self
            .store
            .select(&Query::table("employee_leave_balances").eq("employee_id", user_id))
            .await?;
        data.insert("leave_balances".into(), rows(balances));

        let requests = self
            .store
            .select(
                &Query::table("leave_requests")
                    .eq("employee_id", user_id)
                    .order_desc("created_at"),
            )
            .await?;

        let buckets = LeaveBuckets::partition(&requests);
        data.insert("leaves_taken".into(), json!(buckets.leaves_taken()));
        data.insert("leave_requests".into(), buckets.into_value(requests));

        let salary = self
            .store
            .select_one(
                &Query::table("salary_structures")
                    .eq("employee_id", user_id)
                    .order_desc("created_at"),
            )
            .await?;
        if let Some(salary) = salary {
            data.insert("salary_structure".into(), Value::Object(salary));
        }

        let company_id = employee
            .get("company_id")
            .and_then(Value::as_str)
            .or(identity.company_id.as_deref());
        if let Some(company_id) = company_id {
            let today = self.today();
            let periods = self
                .store
                .select(&Query::table("leave_periods").eq("company_id", company_id))
                .await?;
            let upcoming: Vec<Row> = periods
                .into_iter()
                .filter(|p| is_upcoming(p, today))
                .collect();
            data.insert("upcoming_leave_periods".into(), rows(upcoming));
        }

        Ok(())
    }

    async fn recent_summary(
        &self,
        data: &mut Map<String, Value>,
        user_id: &str,
    ) -> Result<(), StoreError> {
        let payslips = self
            .store
            .select(
                &Query::table("payslips")
                    .select(PAYSLIP_COLUMNS)
                    .eq("employee_id", user_id)
                    .order_desc("created_at")
                    .limit(RECENT_PAYSLIPS),
            )
            .await?;
        data.insert("recent_payslips".into(), rows(payslips));

        let balance = self
            .store
            .select_one(&Query::table("employee_leave_balances").eq("employee_id", user_id))
            .await?;
        if let Some(balance) = balance {
            data.insert("leave_balance".into(), Value::Object(balance));
        }

        Ok(())
    }

    /// Display fields for `meta`. Profile lookup failures are ignored.
    async fn identity_meta(&self, employee: &Row, identity: &Identity) -> Map<String, Value> {
        let profile = match self
            .store
            .select_one(&Query::table("profiles").eq("id", identity.user_id.as_str()))
            .await
        {
            Ok(profile) => profile.unwrap_or_default(),
            Err(e) => {
                debug!(error = %e, "Profile lookup failed, using employee fields");
                Row::new()
            }
        };

        let text = |row: &Row, key: &str| -> Option<String> {
            row.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let name = text(&profile, "full_name")
            .or_else(|| text(employee, "full_name"))
            .or_else(|| text(employee, "name"));
        let email = text(&profile, "email")
            .or_else(|| text(employee, "email"))
            .or_else(|| identity.email.clone());
        let phone = text(&profile, "phone").or_else(|| text(employee, "phone"));

        [
            ("employee_name", name),
            ("employee_email", email),
            ("employee_phone", phone),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k.to_string(), Value::String(v))))
        .collect()
    }
}

fn rows(rows: Vec<Row>) -> Value {
    Value::Array(rows.into_iter().map(Value::Object).collect())
}

fn row_id(row: &Row) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

fn requested_payslip_id(base: &Context) -> Option<&str> {
    base.get("payslip_id")
        .or_else(|| base.get("data")?.get("payslip_id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

/// Leave requests grouped by status.
struct LeaveBuckets {
    approved: Vec<Row>,
    pending: Vec<Row>,
    revoked_or_cancelled: Vec<Row>,
    rejected: Vec<Row>,
}

impl LeaveBuckets {
    fn partition(requests: &[Row]) -> Self {
        let mut buckets = Self {
            approved: Vec::new(),
            pending: Vec::new(),
            revoked_or_cancelled: Vec::new(),
            rejected: Vec::new(),
        };
        for request in requests {
            let status = request
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_lowercase();
            let bucket = match status.as_str() {
                "approved" => &mut buckets.approved,
                "pending" => &mut buckets.pending,
                "revoked" | "cancelled" | "canceled" => &mut buckets.revoked_or_cancelled,
                "rejected" | "denied" => &mut buckets.rejected,
                _ => continue,
            };
            bucket.push(request.clone());
        }
        buckets
    }

    /// Approved, revoked and cancelled requests all count as taken.
    fn leaves_taken(&self) -> usize {
        self.approved.len() + self.revoked_or_cancelled.len()
    }

    fn into_value(self, all: Vec<Row>) -> Value {
        json!({
            "all": rows(all),
            "approved": rows(self.approved),
            "pending": rows(self.pending),
            "revoked_or_cancelled": rows(self.revoked_or_cancelled),
            "rejected": rows(self.rejected),
        })
    }
}

/// No end date, or an end date on or after `today`.
fn is_upcoming(period: &Row, today: NaiveDate) -> bool {
    match period.get("end_date") {
        None | Some(Value::Null) => true,
        Some(Value::String(end)) => end
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .is_some_and(|end| end >= today),
        Some(_) => false,
    }
}

fn numeric(value: Option<&Value>) -> Result<f64, String> {
    match value {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| format!("unrepresentable number {n}")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("non-numeric amount {s:?}: {e}")),
        Some(other) => Err(format!("unexpected amount {other}")),
    }
}

fn snapshot_or_own<'a>(payslip: &'a Row, key: &str) -> Option<&'a Value> {
    payslip
        .get("pay_data_snapshot")
        .and_then(Value::as_object)
        .and_then(|s| s.get(key))
        .filter(|v| !v.is_null())
        .or_else(|| payslip.get(key))
}

/// Sum gross and net pay across payslips, preferring snapshot values.
fn ytd_totals(payslips: &[Row]) -> Result<(f64, f64), String> {
    payslips.iter().try_fold((0.0, 0.0), |(gross, net), p| {
        let g = numeric(snapshot_or_own(p, "gross_pay"))?;
        let n = numeric(snapshot_or_own(p, "net_pay"))?;
        Ok((gross + g, net + n))
    })
}

/// Whole amounts as integers, anything else rounded to paise.
fn amount(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        json!(value as i64)
    } else {
        json!((value * 100.0).round() / 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingStore, seeded_store};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn identity() -> Identity {
        Identity::new("emp-1")
            .with_email("jane.doe@example.com")
            .with_role("employee")
            .with_company("co-1")
    }

    async fn enricher() -> Enricher {
        Enricher::new(Arc::new(seeded_store().await)).with_today(today())
    }

    #[test]
    fn fiscal_year_boundaries() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert_eq!(fiscal_year_start(d(2025, 4, 1)), d(2025, 4, 1));
        assert_eq!(fiscal_year_start(d(2025, 12, 31)), d(2025, 4, 1));
        assert_eq!(fiscal_year_start(d(2025, 3, 31)), d(2024, 4, 1));
        assert_eq!(fiscal_year_start(d(2026, 1, 10)), d(2025, 4, 1));
    }

    #[tokio::test]
    async fn payslip_explain_defaults_to_latest() {
        let out = enricher()
            .await
            .enrich(Intent::PayslipExplain, &Context::new(), &identity())
            .await;

        let data = out["data"].as_object().unwrap();
        assert_eq!(data["current_payslip"]["id"], "ps-jun");
        let previous = data["previous_payslips"].as_array().unwrap();
        let ids: Vec<_> = previous.iter().map(|p| p["id"].as_str().unwrap()).collect();
        // The March payslip is in the previous fiscal year
        assert_eq!(ids, vec!["ps-may", "ps-apr"]);

        let ytd = &data["ytd_totals"];
        // June snapshot gross (52000) wins over the record's own 51000
        assert_eq!(ytd["gross_ytd"], 152000);
        assert_eq!(ytd["net_ytd"], 126000);
        assert_eq!(ytd["months_included"], 3);
        assert_eq!(ytd["fiscal_year_start"], "2025-04-01");

        assert_eq!(out["meta"]["employee_name"], "Jane Doe");
        assert_eq!(out["meta"]["employee_phone"], "+919876543210");
    }

    #[tokio::test]
    async fn requested_payslip_in_batch() {
        let mut base = Context::new();
        base.insert("payslip_id".into(), json!("ps-apr"));
        let out = enricher()
            .await
            .enrich(Intent::PayslipExplain, &base, &identity())
            .await;
        assert_eq!(out["data"]["current_payslip"]["id"], "ps-apr");
        let previous = out["data"]["previous_payslips"].as_array().unwrap();
        assert_eq!(previous.len(), 2);
        assert!(previous.iter().all(|p| p["id"] != "ps-apr"));
    }

    #[tokio::test]
    async fn requested_payslip_falls_back_to_point_lookup() {
        let mut base = Context::new();
        base.insert("payslip_id".into(), json!("ps-mar"));
        let out = enricher()
            .await
            .enrich(Intent::PayslipExplain, &base, &identity())
            .await;
        assert_eq!(out["data"]["current_payslip"]["id"], "ps-mar");
        assert_eq!(out["data"]["previous_payslips"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn point_lookup_is_scoped_to_employee() {
        let mut base = Context::new();
        base.insert("payslip_id".into(), json!("ps-other"));
        let out = enricher()
            .await
            .enrich(Intent::PayslipExplain, &base, &identity())
            .await;
        assert!(out["data"].get("current_payslip").is_none());
    }

    #[tokio::test]
    async fn leave_advice_partitions_requests() {
        let out = enricher()
            .await
            .enrich(Intent::LeaveAdvice, &Context::new(), &identity())
            .await;
        let data = out["data"].as_object().unwrap();

        assert_eq!(data["leave_balances"].as_array().unwrap().len(), 1);
        let requests = &data["leave_requests"];
        assert_eq!(requests["all"].as_array().unwrap().len(), 5);
        assert_eq!(requests["approved"].as_array().unwrap().len(), 1);
        assert_eq!(requests["pending"].as_array().unwrap().len(), 1);
        assert_eq!(requests["revoked_or_cancelled"].as_array().unwrap().len(), 2);
        assert_eq!(requests["rejected"].as_array().unwrap().len(), 1);
        assert_eq!(data["leaves_taken"], 3);
        assert_eq!(data["salary_structure"]["base_pay"], 42000);

        let upcoming: Vec<_> = data["upcoming_leave_periods"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(upcoming.len(), 2);
        assert!(upcoming.contains(&"FY 2025-26"));
        assert!(upcoming.contains(&"Open ended"));
    }

    #[tokio::test]
    async fn summary_intents_fetch_recent_payslips() {
        let e = enricher().await;
        for intent in [Intent::PayslipTaxSuggestions, Intent::DashboardInsights] {
            let out = e.enrich(intent, &Context::new(), &identity()).await;
            // No fiscal-year filter: March is included
            assert_eq!(out["data"]["recent_payslips"].as_array().unwrap().len(), 4);
            assert_eq!(out["data"]["leave_balance"]["casual_remaining"], 6);
        }
    }

    #[tokio::test]
    async fn general_intent_only_attaches_meta() {
        let mut base = Context::new();
        base.insert("page_view".into(), json!("dashboard"));
        let out = enricher()
            .await
            .enrich(Intent::General, &base, &identity())
            .await;
        assert!(out.get("data").is_none());
        assert_eq!(out["page_view"], "dashboard");
        assert_eq!(out["meta"]["employee_email"], "jane.doe@example.com");
    }

    #[tokio::test]
    async fn unknown_employee_is_a_no_op() {
        let mut base = Context::new();
        base.insert("page_view".into(), json!("payslips"));
        let out = enricher()
            .await
            .enrich(Intent::PayslipExplain, &base, &Identity::new("stranger"))
            .await;
        assert_eq!(out, base);
    }

    #[tokio::test]
    async fn store_failure_returns_original_context() {
        let base: Context = json!({"data": {"note": "keep me"}})
            .as_object()
            .cloned()
            .unwrap();
        let enricher = Enricher::new(Arc::new(FailingStore)).with_today(today());
        for intent in [Intent::PayslipExplain, Intent::LeaveAdvice, Intent::General] {
            assert_eq!(enricher.enrich(intent, &base, &identity()).await, base);
        }
    }

    #[test]
    fn ytd_rejects_garbage_and_defaults_missing() {
        let ok: Vec<Row> = vec![
            json!({"gross_pay": "1000.50", "net_pay": null}),
            json!({"pay_data_snapshot": {"gross_pay": 2000}}),
        ]
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect();
        assert_eq!(ytd_totals(&ok).unwrap(), (3000.5, 0.0));

        let bad: Vec<Row> = vec![json!({"gross_pay": "lots"})]
            .into_iter()
            .filter_map(|v| v.as_object().cloned())
            .collect();
        assert!(ytd_totals(&bad).is_err());
    }

    #[test]
    fn amounts_render_cleanly() {
        assert_eq!(amount(152000.0), json!(152000));
        assert_eq!(amount(10.456), json!(10.46));
    }
}
