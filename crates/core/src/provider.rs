//! Provider trait: the abstraction over the hosted LLM.
//!
//! A Provider takes a fully rendered prompt and returns either a complete
//! response or a stream of incremental response chunks. Both carry the same
//! shape: an optional direct `text` accessor, a list of candidates with nested
//! content parts, and optional prompt feedback describing a block.
//!
//! Field names follow the Gemini REST wire format (camelCase) so the HTTP
//! implementation can deserialize straight into these types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Sampling settings for a single generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: f32,

    /// Nucleus sampling cutoff
    pub top_p: f32,

    /// Maximum tokens to generate
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.15,
            top_p: 0.9,
            max_output_tokens: 8192,
        }
    }
}

/// A single generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The model to use (e.g., "gemini-2.0-flash")
    pub model: String,

    /// The rendered prompt text
    pub prompt: String,

    /// Sampling settings
    #[serde(default)]
    pub config: GenerationConfig,
}

/// A complete response, or one incremental chunk of a streamed response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    /// Direct text accessor (set by providers that pre-join the output)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Response candidates
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Candidate>,

    /// Feedback about the prompt itself (block signal)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,

    /// e.g. "STOP", "MAX_TOKENS", "SAFETY", "SPII"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
}

impl GenerationResponse {
    /// A response that only carries a direct text value.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// A response with one candidate whose content is the given parts.
    pub fn from_parts<I, S>(parts: I, finish_reason: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: vec![Candidate {
                content: Some(Content {
                    parts: parts
                        .into_iter()
                        .map(|t| Part {
                            text: Some(t.into()),
                        })
                        .collect(),
                    role: Some("model".into()),
                }),
                finish_reason: finish_reason.map(String::from),
            }],
            ..Self::default()
        }
    }

    /// The prompt-level block reason, if the upstream rejected the prompt.
    pub fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
            .filter(|r| !r.is_empty() && *r != "BLOCK_REASON_UNSPECIFIED")
    }
}

impl Candidate {
    /// Concatenated text of all parts, if any part carries text.
    pub fn joined_text(&self) -> Option<String> {
        let content = self.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        Some(text)
    }
}

/// The core Provider trait.
///
/// The response channel calls `generate()` or `stream()` without knowing
/// which backend is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "gemini").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, ProviderError>;

    /// Send a request and get a stream of response chunks.
    ///
    /// Default implementation calls `generate()` and wraps the result as a single chunk.
    async fn stream(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<GenerationResponse, ProviderError>>,
        ProviderError,
    > {
        let response = self.generate(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let _ = tx.send(Ok(response)).await;
        Ok(rx)
    }

    /// Can the provider be reached?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
