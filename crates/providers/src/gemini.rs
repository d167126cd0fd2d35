//! Gemini provider implementation.
//!
//! Talks to the Generative Language REST API:
//! - `POST {base}/models/{model}:generateContent` for single-shot calls
//! - `POST {base}/models/{model}:streamGenerateContent?alt=sse` for streaming
//!
//! Responses deserialize straight into [`GenerationResponse`], whose field
//! names follow the wire format.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use payassist_core::error::ProviderError;
use payassist_core::provider::{GenerationRequest, GenerationResponse, Provider};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest silence tolerated between two reads, streams included.
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Whole-request limit for single-shot calls only.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// A Gemini LLM provider.
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a provider against the public endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_base_url(DEFAULT_API_URL, api_key)
    }

    /// Create a provider against a custom endpoint (proxies, test servers).
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    fn to_api_body(request: &GenerationRequest) -> ApiRequest<'_> {
        ApiRequest {
            contents: vec![ApiContent {
                role: "user",
                parts: vec![ApiPart {
                    text: &request.prompt,
                }],
            }],
            generation_config: request.config,
        }
    }

    async fn post(
        &self,
        url: &str,
        request: &GenerationRequest,
        streaming: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut builder = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json");
        if streaming {
            builder = builder.header("Accept", "text/event-stream");
        } else {
            builder = builder.timeout(REQUEST_TIMEOUT);
        }

        let response = builder
            .json(&Self::to_api_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        check_status(response).await
    }
}

/// Map non-success statuses to provider errors.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();

    if status == 429 {
        return Err(ProviderError::RateLimited {
            retry_after_secs: 5,
        });
    }

    if status == 401 || status == 403 {
        return Err(ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ));
    }

    if status != 200 {
        let error_body = response.text().await.unwrap_or_default();
        warn!(status, body = %error_body, "Gemini returned error");
        return Err(ProviderError::ApiError {
            status_code: status,
            message: error_body,
        });
    }

    Ok(response)
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, ProviderError> {
        let url = self.endpoint(&request.model, "generateContent");
        debug!(model = %request.model, prompt_len = request.prompt.len(), "Sending generate request");

        let response = self.post(&url, &request, false).await?;

        response
            .json::<GenerationResponse>()
            .await
            .map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })
    }

    async fn stream(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<
        mpsc::Receiver<std::result::Result<GenerationResponse, ProviderError>>,
        ProviderError,
    > {
        let url = format!(
            "{}?alt=sse",
            self.endpoint(&request.model, "streamGenerateContent")
        );
        debug!(model = %request.model, "Sending streaming request");

        let response = self.post(&url, &request, true).await?;

        let (tx, rx) = mpsc::channel(64);

        // Read the SSE byte stream until it ends or the receiver goes away
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.extend_from_slice(&bytes);

                for data in drain_sse_data(&mut buffer) {
                    if let Some(chunk) = parse_chunk(&data) {
                        if tx.send(Ok(chunk)).await.is_err() {
                            debug!("Stream receiver dropped, stopping reader");
                            return;
                        }
                    }
                }
            }

            // A final event without a trailing newline
            buffer.push(b'\n');
            for data in drain_sse_data(&mut buffer) {
                if let Some(chunk) = parse_chunk(&data) {
                    let _ = tx.send(Ok(chunk)).await;
                }
            }
        });

        Ok(rx)
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

fn parse_chunk(data: &str) -> Option<GenerationResponse> {
    match serde_json::from_str::<GenerationResponse>(data) {
        Ok(chunk) => Some(chunk),
        Err(e) => {
            warn!(error = %e, data = %data, "Skipping unparseable SSE chunk");
            None
        }
    }
}

/// Pull every complete `data:` payload out of a raw SSE byte buffer.
///
/// Lines are decoded only once their newline has arrived, so a multi-byte
/// character split across two reads stays intact. Incomplete trailing
/// bytes stay in the buffer for the next read. Empty lines, comments and
/// non-data fields are skipped.
pub(crate) fn drain_sse_data(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut payloads = Vec::new();

    while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
        let raw: Vec<u8> = buffer.drain(..=line_end).collect();
        let line = String::from_utf8_lossy(&raw[..line_end]);
        let line = line.trim_end_matches('\r');

        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim();
            if !data.is_empty() && data != "[DONE]" {
                payloads.push(data.to_string());
            }
        }
    }

    payloads
}

// --- Gemini request wire types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest<'a> {
    contents: Vec<ApiContent<'a>>,
    generation_config: payassist_core::GenerationConfig,
}

#[derive(Serialize)]
struct ApiContent<'a> {
    role: &'static str,
    parts: Vec<ApiPart<'a>>,
}

#[derive(Serialize)]
struct ApiPart<'a> {
    text: &'a str,
}
