pub mod ask;
pub mod config_cmd;
pub mod prompt;
pub mod serve;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use clap::Args;
use payassist_core::HistoryEntry;
use payassist_pipeline::ChatRequest;
use serde_json::Value;

/// The question plus the optional local inputs shared by `ask` and `prompt`.
#[derive(Args, Debug)]
pub struct PromptArgs {
    /// The user's question
    pub query: String,

    /// Intent tag (payslip_explain, leave_advice, payslip_tax_suggestions, dashboard_insights)
    #[arg(short, long)]
    pub intent: Option<String>,

    /// JSON file holding the context object
    #[arg(short, long)]
    pub context: Option<PathBuf>,

    /// JSON file holding prior turns as [{"role": ..., "content": ...}]
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Extra system instruction placed above the template
    #[arg(short, long)]
    pub system: Option<String>,
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

impl PromptArgs {
    /// Build a chat request from the arguments, reading any files.
    pub fn to_request(&self) -> anyhow::Result<ChatRequest> {
        let mut request = ChatRequest::new(self.query.clone());
        request.intent = self.intent.clone();
        request.system_instruction = self.system.clone();

        if let Some(path) = &self.context {
            let context = read_json(path)?;
            if !context.is_object() {
                bail!("{} must contain a JSON object", path.display());
            }
            request.context = Some(context);
        }

        if let Some(path) = &self.history {
            let history: Vec<HistoryEntry> = serde_json::from_value(read_json(path)?)
                .with_context(|| format!("{} must be a list of role/content pairs", path.display()))?;
            request.chat_history = Some(history);
        }

        Ok(request)
    }
}
