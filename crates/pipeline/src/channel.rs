//! The response channel: one LLM call, single-shot or streamed.
//!
//! Neither mode returns an error. Provider failures, upstream blocks and
//! empty answers all turn into one of the canned messages below, with the
//! detail logged for operators.

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use payassist_core::error::ProviderError;
use payassist_core::{
    GenerationConfig, GenerationRequest, GenerationResponse, HistoryEntry, Provider,
};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

pub const APOLOGY: &str =
    "I'm sorry, I ran into a problem while preparing your answer. Please try again in a moment.";

pub const CONTENT_POLICY: &str = "I can't answer that because the request was flagged by the \
     content safety filter. Please rephrase your question without personal identifiers and try again.";

pub const EMPTY_RESPONSE: &str =
    "I'm sorry, I couldn't come up with an answer to that. Please try rephrasing your question.";

pub const BUSY: &str =
    "The assistant is busy right now. Please wait a few seconds and try again.";

/// Candidate finish reasons that mean the output was withheld.
const BLOCKING_FINISH_REASONS: &[&str] = &["SAFETY", "SPII", "BLOCKLIST", "PROHIBITED_CONTENT"];

/// A lazily pulled sequence of text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// What a response (or a streamed chunk) amounts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    Text(String),
    Blocked(String),
    Empty,
}

/// Classify a response: block signals first, then the direct text
/// accessor, then the first candidate with non-blank text.
pub fn extract(response: &GenerationResponse) -> Extracted {
    extract_with(response, |t| !t.trim().is_empty())
}

/// [`extract`] for one streamed chunk. Whitespace is real output here
/// (newlines between paragraphs), so only empty text counts as nothing.
pub fn extract_chunk(response: &GenerationResponse) -> Extracted {
    extract_with(response, |t| !t.is_empty())
}

fn extract_with(response: &GenerationResponse, has_text: impl Fn(&str) -> bool) -> Extracted {
    if let Some(reason) = response.block_reason() {
        return Extracted::Blocked(reason.to_string());
    }

    let all_blocked = !response.candidates.is_empty()
        && response.candidates.iter().all(|c| {
            c.finish_reason
                .as_deref()
                .is_some_and(|r| BLOCKING_FINISH_REASONS.contains(&r))
        });
    if all_blocked {
        let reason = response.candidates[0]
            .finish_reason
            .clone()
            .unwrap_or_default();
        return Extracted::Blocked(reason);
    }

    if let Some(text) = response.text.as_deref().filter(|t| has_text(t)) {
        return Extracted::Text(text.to_string());
    }

    response
        .candidates
        .iter()
        .filter_map(|c| c.joined_text())
        .find(|t| has_text(t))
        .map(Extracted::Text)
        .unwrap_or(Extracted::Empty)
}

fn fallback_for(err: &ProviderError) -> &'static str {
    match err {
        ProviderError::RateLimited { .. } => BUSY,
        _ => APOLOGY,
    }
}

/// Prefix `prompt` with a plain-text transcript of the trimmed history.
pub fn with_transcript(prompt: &str, history: &[HistoryEntry]) -> String {
    if history.is_empty() {
        return prompt.to_string();
    }
    format!(
        "Conversation so far:\n{}\n\n{}",
        HistoryEntry::transcript(history),
        prompt
    )
}

#[derive(Clone)]
pub struct ResponseChannel {
    provider: Arc<dyn Provider>,
    model: String,
    config: GenerationConfig,
}

impl ResponseChannel {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            config: GenerationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn request(&self, prompt: String, config: GenerationConfig) -> GenerationRequest {
        GenerationRequest {
            model: self.model.clone(),
            prompt,
            config,
        }
    }

    /// Single-shot generation with the channel's sampling settings.
    pub async fn generate(&self, prompt: &str) -> String {
        self.generate_with(prompt, self.config).await
    }

    /// Single-shot generation with explicit sampling settings.
    pub async fn generate_with(&self, prompt: &str, config: GenerationConfig) -> String {
        debug!(provider = self.provider.name(), model = %self.model, "Generating response");

        let response = match self
            .provider
            .generate(self.request(prompt.to_string(), config))
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!(provider = self.provider.name(), error = %e, "LLM call failed");
                return fallback_for(&e).to_string();
            }
        };

        match extract(&response) {
            Extracted::Text(text) => text,
            Extracted::Blocked(reason) => {
                warn!(%reason, "LLM response blocked by content policy");
                CONTENT_POLICY.to_string()
            }
            Extracted::Empty => {
                warn!("LLM returned no text");
                EMPTY_RESPONSE.to_string()
            }
        }
    }

    /// Streamed generation.
    ///
    /// Nothing is sent upstream until the first fragment is pulled. Chunks
    /// are deltas and pass through unchanged, whitespace included. The
    /// stream always ends cleanly: if nothing but whitespace came through
    /// it yields [`EMPTY_RESPONSE`]; a failure yields one apology and
    /// stops. Dropping the stream stops the upstream reader.
    pub fn generate_stream(&self, prompt: &str, history: &[HistoryEntry]) -> FragmentStream {
        let request = self.request(with_transcript(prompt, history), self.config);
        let state = StreamState::Pending {
            provider: self.provider.clone(),
            request,
        };
        Box::pin(futures::stream::unfold(state, next_fragment))
    }
}

enum StreamState {
    Pending {
        provider: Arc<dyn Provider>,
        request: GenerationRequest,
    },
    Running {
        rx: mpsc::Receiver<Result<GenerationResponse, ProviderError>>,
        answered: bool,
    },
    Done,
}

async fn next_fragment(state: StreamState) -> Option<(String, StreamState)> {
    let (mut rx, answered) = match state {
        StreamState::Done => return None,
        StreamState::Running { rx, answered } => (rx, answered),
        StreamState::Pending { provider, request } => match provider.stream(request).await {
            Ok(rx) => (rx, false),
            Err(e) => {
                error!(provider = provider.name(), error = %e, "LLM stream failed to start");
                return Some((fallback_for(&e).to_string(), StreamState::Done));
            }
        },
    };

    loop {
        match rx.recv().await {
            Some(Ok(chunk)) => match extract_chunk(&chunk) {
                Extracted::Text(text) => {
                    let answered = answered || !text.trim().is_empty();
                    return Some((text, StreamState::Running { rx, answered }));
                }
                Extracted::Blocked(reason) => {
                    warn!(%reason, "LLM stream blocked by content policy");
                    return Some((CONTENT_POLICY.to_string(), StreamState::Done));
                }
                Extracted::Empty => continue,
            },
            Some(Err(e)) => {
                error!(error = %e, "LLM stream interrupted");
                return Some((APOLOGY.to_string(), StreamState::Done));
            }
            None if !answered => {
                warn!("LLM stream ended without any text");
                return Some((EMPTY_RESPONSE.to_string(), StreamState::Done));
            }
            None => return None,
        }
    }
}
