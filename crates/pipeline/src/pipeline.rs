//! The chat pipeline: enrich → redact → mask → compact → render → respond.

use payassist_core::{AuthError, Context, HistoryEntry, Identity, Intent};
use payassist_security::{mask_str, sanitize_and_mask};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::channel::{FragmentStream, ResponseChannel};
use crate::compact::compact;
use crate::enrich::Enricher;
use crate::templates::select_and_render;

/// An incoming chat request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub chat_history: Option<Vec<HistoryEntry>>,
    #[serde(default)]
    pub payslip_id: Option<String>,
    #[serde(default)]
    pub system_instruction: Option<String>,
}

impl ChatRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.chat_history = Some(history);
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// The caller's context; anything that is not an object counts as empty.
    fn base_context(&self) -> Context {
        let mut base = self
            .context
            .as_ref()
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        if let Some(id) = self.payslip_id.as_deref().filter(|id| !id.is_empty()) {
            base.insert("payslip_id".into(), json!(id));
        }
        base
    }

    /// Explicit intent first, then the context's `intent` tag.
    fn intent_tag(&self, base: &Context) -> Option<String> {
        self.intent
            .as_deref()
            .or_else(|| base.get("intent").and_then(Value::as_str))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    /// Explicit history, or whatever the context carries. Contents are masked.
    fn history(&self, base: &Context) -> Vec<HistoryEntry> {
        let history = match &self.chat_history {
            Some(h) if !h.is_empty() => h.clone(),
            _ => HistoryEntry::from_context(base),
        };
        HistoryEntry::trim(&history)
            .iter()
            .map(|h| HistoryEntry::new(h.role.clone(), mask_str(&h.content)))
            .collect()
    }
}

/// A sanitized, compacted request ready to be rendered.
#[derive(Debug, Clone)]
pub struct PreparedPrompt {
    pub query: String,
    pub intent: Intent,
    pub intent_tag: Option<String>,
    pub system_instruction: Option<String>,
    pub context: Context,
    pub history: Vec<HistoryEntry>,
}

impl PreparedPrompt {
    /// Whether any context survived sanitization.
    pub fn context_used(&self) -> bool {
        !self.context.is_empty()
    }

    /// The single-shot prompt, with the history as its own section.
    pub fn render(&self) -> String {
        let mut context = self.context.clone();
        if !self.history.is_empty() {
            let turns = self
                .history
                .iter()
                .map(|h| json!({"role": h.role, "content": h.content}))
                .collect();
            context.insert("conversation_history".into(), Value::Array(turns));
        }
        self.render_context(&context)
    }

    /// The prompt without history. Streaming prefixes history as a transcript.
    pub fn render_without_history(&self) -> String {
        self.render_context(&self.context)
    }

    fn render_context(&self, context: &Context) -> String {
        select_and_render(
            &self.query,
            context,
            self.intent_tag.as_deref(),
            self.system_instruction.as_deref(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub context_used: bool,
}

/// Private context (`data`) and data-reading intents need a caller.
fn authorize(base: &Context, intent: Intent, identity: Option<&Identity>) -> Result<(), AuthError> {
    let has_private_data = base
        .get("data")
        .is_some_and(|d| match d {
            Value::Object(m) => !m.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Null => false,
            _ => true,
        });
    if identity.is_none() && (has_private_data || intent.needs_enrichment()) {
        return Err(AuthError::MissingCredentials);
    }
    Ok(())
}

/// Sanitize and compact an (optionally enriched) context.
fn finish(request: &ChatRequest, base: &Context, enriched: &Context) -> PreparedPrompt {
    let intent_tag = request.intent_tag(base);
    let intent = Intent::parse(intent_tag.as_deref());
    let history = request.history(base);

    let mut sanitized = sanitize_and_mask(Some(enriched));
    sanitized.remove("conversation_history");

    let context = match intent {
        Intent::PayslipExplain => compact(&sanitized),
        _ => sanitized,
    };

    PreparedPrompt {
        query: request.query.clone(),
        intent,
        intent_tag,
        system_instruction: request.system_instruction.clone(),
        context,
        history,
    }
}

/// Prepare a request without any caller or store: the context is taken as
/// given, then sanitized and compacted.
pub fn prepare_unenriched(request: &ChatRequest) -> PreparedPrompt {
    let base = request.base_context();
    finish(request, &base, &base)
}

pub struct ContextPipeline {
    enricher: Enricher,
    channel: ResponseChannel,
}

impl ContextPipeline {
    pub fn new(enricher: Enricher, channel: ResponseChannel) -> Self {
        Self { enricher, channel }
    }

    pub fn channel(&self) -> &ResponseChannel {
        &self.channel
    }

    /// Authorize, enrich and sanitize a request.
    ///
    /// Fails only when the request needs a caller and none was given.
    pub async fn prepare(
        &self,
        request: &ChatRequest,
        identity: Option<&Identity>,
    ) -> Result<PreparedPrompt, AuthError> {
        let base = request.base_context();
        let intent = Intent::parse(request.intent_tag(&base).as_deref());
        authorize(&base, intent, identity)?;

        let enriched = match identity {
            Some(identity) => self.enricher.enrich(intent, &base, identity).await,
            None => base.clone(),
        };

        let prepared = finish(request, &base, &enriched);
        debug!(
            intent = %prepared.intent,
            context_keys = prepared.context.len(),
            history = prepared.history.len(),
            "Prompt prepared"
        );
        Ok(prepared)
    }

    pub async fn chat(
        &self,
        request: &ChatRequest,
        identity: Option<&Identity>,
    ) -> Result<ChatReply, AuthError> {
        let prepared = self.prepare(request, identity).await?;
        let response = self.channel.generate(&prepared.render()).await;
        info!(intent = %prepared.intent, chars = response.len(), "Chat answered");
        Ok(ChatReply {
            response,
            context_used: prepared.context_used(),
        })
    }

    /// Prepare, then open a lazy fragment stream for the answer.
    pub async fn chat_stream(
        &self,
        request: &ChatRequest,
        identity: Option<&Identity>,
    ) -> Result<(PreparedPrompt, FragmentStream), AuthError> {
        let prepared = self.prepare(request, identity).await?;
        let stream = self
            .channel
            .generate_stream(&prepared.render_without_history(), &prepared.history);
        Ok((prepared, stream))
    }
}
