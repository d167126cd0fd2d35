//! Shared test helpers: scripted providers, a failing store and seed data.

use std::sync::Mutex;

use async_trait::async_trait;
use payassist_core::error::{ProviderError, StoreError};
use payassist_core::provider::PromptFeedback;
use payassist_core::store::{DataStore, Filter, Query, Row};
use payassist_core::{GenerationRequest, GenerationResponse, Provider};
use payassist_store::InMemoryStore;
use serde_json::json;
use tokio::sync::mpsc;

/// A response whose prompt was rejected by the upstream safety filter.
pub fn blocked_chunk() -> GenerationResponse {
    GenerationResponse {
        prompt_feedback: Some(PromptFeedback {
            block_reason: Some("SAFETY".into()),
        }),
        ..Default::default()
    }
}

/// Returns scripted responses from `generate`, one per call.
///
/// Panics if more calls are made than responses provided.
pub struct ScriptedProvider {
    responses: Mutex<Vec<GenerationResponse>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<GenerationResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|t| GenerationResponse::from_parts([*t], Some("STOP")))
                .collect(),
        )
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        assert!(!responses.is_empty(), "ScriptedProvider: no more responses");
        Ok(responses.remove(0))
    }
}

/// Streams a fixed list of chunks (or errors) through a channel.
pub struct ChunkedProvider {
    chunks: Vec<Result<GenerationResponse, ProviderError>>,
    prompts: Mutex<Vec<String>>,
}

impl ChunkedProvider {
    pub fn new(chunks: Vec<Result<GenerationResponse, ProviderError>>) -> Self {
        Self {
            chunks,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|t| Ok(GenerationResponse::from_parts([*t], None)))
                .collect(),
        )
    }

    /// How many times `stream` was called.
    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Provider for ChunkedProvider {
    fn name(&self) -> &str {
        "chunked"
    }

    async fn generate(
        &self,
        _request: GenerationRequest,
    ) -> Result<GenerationResponse, ProviderError> {
        Err(ProviderError::NotConfigured("stream only".into()))
    }

    async fn stream(
        &self,
        request: GenerationRequest,
    ) -> Result<mpsc::Receiver<Result<GenerationResponse, ProviderError>>, ProviderError> {
        self.prompts.lock().unwrap().push(request.prompt);
        let (tx, rx) = mpsc::channel(self.chunks.len().max(1));
        for chunk in &self.chunks {
            let _ = tx.send(chunk.clone()).await;
        }
        Ok(rx)
    }
}

/// Fails every call with the given error.
pub struct FailingProvider {
    error: ProviderError,
}

impl FailingProvider {
    pub fn new(error: ProviderError) -> Self {
        Self { error }
    }

    pub fn network() -> Self {
        Self::new(ProviderError::Network("connection refused".into()))
    }
}

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(
        &self,
        _request: GenerationRequest,
    ) -> Result<GenerationResponse, ProviderError> {
        Err(self.error.clone())
    }

    async fn stream(
        &self,
        _request: GenerationRequest,
    ) -> Result<mpsc::Receiver<Result<GenerationResponse, ProviderError>>, ProviderError> {
        Err(self.error.clone())
    }
}

/// A store that is always down.
pub struct FailingStore;

#[async_trait]
impl DataStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn select(&self, _query: &Query) -> Result<Vec<Row>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn insert(&self, _table: &str, _row: Row) -> Result<Row, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn update(
        &self,
        _table: &str,
        _patch: Row,
        _filters: &[Filter],
    ) -> Result<Vec<Row>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

/// One employee (`emp-1`, company `co-1`) with a fiscal year of payroll
/// data, plus a second employee whose rows must never leak.
pub async fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();

    store
        .seed(
            "employees",
            vec![
                json!({
                    "id": "emp-1",
                    "company_id": "co-1",
                    "full_name": "Jane Doe",
                    "email": "jane.doe@example.com",
                    "phone": "+919876543210",
                    "bank_account_number": "001234567890",
                    "pan_number": "ABCDE1234F"
                }),
                json!({"id": "emp-2", "company_id": "co-2", "full_name": "Other Person"}),
            ],
        )
        .await;

    store
        .seed(
            "profiles",
            vec![json!({
                "id": "emp-1",
                "full_name": "Jane Doe",
                "email": "jane.doe@example.com",
                "role": "employee",
                "company_id": "co-1"
            })],
        )
        .await;

    store
        .seed(
            "payslips",
            vec![
                json!({
                    "id": "ps-jun",
                    "employee_id": "emp-1",
                    "payroll_id": "pr-jun",
                    "created_at": "2025-06-30T10:00:00+00:00",
                    "gross_pay": 51000,
                    "net_pay": 42000,
                    "total_deductions": 9000,
                    "bank_account": "001234567890",
                    "pay_data_snapshot": {
                        "base_pay": 40000,
                        "allowances": {"hra": 8000, "meal": 2000, "transport": 1500, "other": 500, "bonus": 0},
                        "gross_pay": 52000,
                        "net_pay": 43000,
                        "leave_deduction": 0,
                        "tax_deduction": 4000,
                        "pan": "ABCDE1234F"
                    },
                    "payrolls": {"pay_period_start": "2025-06-01", "pay_period_end": "2025-06-30"}
                }),
                json!({
                    "id": "ps-may",
                    "employee_id": "emp-1",
                    "created_at": "2025-05-31T10:00:00+00:00",
                    "gross_pay": 50000,
                    "net_pay": 42000,
                    "total_deductions": 8000,
                    "payrolls": {"pay_period_start": "2025-05-01", "pay_period_end": "2025-05-31"}
                }),
                json!({
                    "id": "ps-apr",
                    "employee_id": "emp-1",
                    "created_at": "2025-04-30T10:00:00+00:00",
                    "gross_pay": 50000,
                    "net_pay": 41000,
                    "total_deductions": 9000,
                    "pay_data_snapshot": {"leave_deduction": 1000},
                    "payrolls": {"pay_period_start": "2025-04-01", "pay_period_end": "2025-04-30"}
                }),
                json!({
                    "id": "ps-mar",
                    "employee_id": "emp-1",
                    "created_at": "2025-03-31T10:00:00+00:00",
                    "gross_pay": 48000,
                    "net_pay": 40000,
                    "total_deductions": 8000,
                    "payrolls": {"pay_period_start": "2025-03-01", "pay_period_end": "2025-03-31"}
                }),
                json!({
                    "id": "ps-other",
                    "employee_id": "emp-2",
                    "created_at": "2025-06-30T10:00:00+00:00",
                    "gross_pay": 99000,
                    "net_pay": 80000
                }),
            ],
        )
        .await;

    store
        .seed(
            "employee_leave_balances",
            vec![json!({
                "id": "lb-1",
                "employee_id": "emp-1",
                "casual_remaining": 6,
                "sick_remaining": 4
            })],
        )
        .await;

    store
        .seed(
            "leave_requests",
            vec![
                json!({"id": "lr-1", "employee_id": "emp-1", "status": "approved", "days_requested": 2, "created_at": "2025-05-02"}),
                json!({"id": "lr-2", "employee_id": "emp-1", "status": "pending", "days_requested": 1, "created_at": "2025-06-10"}),
                json!({"id": "lr-3", "employee_id": "emp-1", "status": "revoked", "days_requested": 1, "created_at": "2025-04-20"}),
                json!({"id": "lr-4", "employee_id": "emp-1", "status": "cancelled", "days_requested": 3, "created_at": "2025-04-10"}),
                json!({"id": "lr-5", "employee_id": "emp-1", "status": "denied", "days_requested": 5, "created_at": "2025-04-05"}),
                json!({"id": "lr-6", "employee_id": "emp-2", "status": "approved", "days_requested": 9, "created_at": "2025-04-05"}),
            ],
        )
        .await;

    store
        .seed(
            "salary_structures",
            vec![
                json!({"id": "ss-1", "employee_id": "emp-1", "base_pay": 38000, "created_at": "2024-04-01"}),
                json!({"id": "ss-2", "employee_id": "emp-1", "base_pay": 42000, "created_at": "2025-04-01"}),
            ],
        )
        .await;

    store
        .seed(
            "leave_periods",
            vec![
                json!({"id": "lp-1", "company_id": "co-1", "name": "FY 2024-25", "end_date": "2025-03-31"}),
                json!({"id": "lp-2", "company_id": "co-1", "name": "FY 2025-26", "end_date": "2026-03-31"}),
                json!({"id": "lp-3", "company_id": "co-1", "name": "Open ended", "end_date": null}),
                json!({"id": "lp-4", "company_id": "co-2", "name": "Elsewhere", "end_date": "2026-03-31"}),
            ],
        )
        .await;

    store
}
