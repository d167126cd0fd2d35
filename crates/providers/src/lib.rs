//! LLM provider implementations for payassist.
//!
//! All providers implement the `payassist_core::Provider` trait.
//! [`build_from_config`] picks the backend from configuration.

pub mod gemini;

use std::sync::Arc;

use async_trait::async_trait;
use payassist_core::error::ProviderError;
use payassist_core::provider::{GenerationRequest, GenerationResponse, Provider};

pub use gemini::GeminiProvider;

/// Stand-in used when no API key is configured.
///
/// Every call fails with [`ProviderError::NotConfigured`], which the response
/// channel turns into its generic apology.
pub struct UnconfiguredProvider;

#[async_trait]
impl Provider for UnconfiguredProvider {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn generate(
        &self,
        _request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, ProviderError> {
        Err(ProviderError::NotConfigured(
            "GEMINI_API_KEY is not set".into(),
        ))
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(false)
    }
}

/// Build the LLM provider from configuration.
pub fn build_from_config(
    config: &payassist_config::AppConfig,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let Some(api_key) = config.llm.api_key.clone() else {
        tracing::warn!("No LLM API key configured; chat responses will fall back");
        return Ok(Arc::new(UnconfiguredProvider));
    };

    let provider = match &config.llm.api_url {
        Some(url) => GeminiProvider::with_base_url(url, api_key)?,
        None => GeminiProvider::new(api_key)?,
    };

    tracing::info!(model = %config.llm.model, "Gemini provider ready");
    Ok(Arc::new(provider))
}
