//! Context, intent and conversation-history types.
//!
//! A [`Context`] is an open-ended JSON object. By convention it carries:
//! - `data`: intent-specific records (payslips, leave balances, ...)
//! - `meta`: display-only identity fields
//! - `page_view` / `intent`: string tags
//! - `conversation_history`: ordered `{role, content}` pairs
//!
//! Anything else is allowed; every pipeline stage tolerates missing keys.

use serde::{Deserialize, Serialize};

/// The per-request context object.
pub type Context = serde_json::Map<String, serde_json::Value>;

/// Only this many trailing history entries are ever folded into a prompt.
pub const MAX_HISTORY_ENTRIES: usize = 8;

/// The purpose of a chat request. Selects the template and the enrichment routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    PayslipExplain,
    LeaveAdvice,
    PayslipTaxSuggestions,
    DashboardInsights,
    /// No intent, or one we don't recognise
    General,
}

impl Intent {
    /// Parse an intent tag. Missing and unknown tags map to [`Intent::General`].
    pub fn parse(tag: Option<&str>) -> Self {
        match tag.map(str::trim) {
            Some("payslip_explain") => Self::PayslipExplain,
            Some("leave_advice") => Self::LeaveAdvice,
            Some("payslip_tax_suggestions") => Self::PayslipTaxSuggestions,
            Some("dashboard_insights") => Self::DashboardInsights,
            _ => Self::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PayslipExplain => "payslip_explain",
            Self::LeaveAdvice => "leave_advice",
            Self::PayslipTaxSuggestions => "payslip_tax_suggestions",
            Self::DashboardInsights => "dashboard_insights",
            Self::General => "general",
        }
    }

    /// Whether this intent reads the caller's domain data.
    pub fn needs_enrichment(&self) -> bool {
        !matches!(self, Self::General)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of prior conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

impl HistoryEntry {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// The last [`MAX_HISTORY_ENTRIES`] entries, in original order.
    pub fn trim(history: &[HistoryEntry]) -> &[HistoryEntry] {
        let start = history.len().saturating_sub(MAX_HISTORY_ENTRIES);
        &history[start..]
    }

    /// Render the trimmed history as a plain-text transcript, one line per turn.
    pub fn transcript(history: &[HistoryEntry]) -> String {
        Self::trim(history)
            .iter()
            .map(|h| format!("{}: {}", display_role(&h.role), h.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Read history entries out of a context's `conversation_history` key.
    /// Malformed entries are skipped.
    pub fn from_context(context: &Context) -> Vec<HistoryEntry> {
        context
            .get("conversation_history")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn display_role(role: &str) -> String {
    match role {
        "user" => "User".into(),
        "assistant" | "model" => "Assistant".into(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => "Unknown".into(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_intents_parse() {
        assert_eq!(Intent::parse(Some("payslip_explain")), Intent::PayslipExplain);
        assert_eq!(Intent::parse(Some("leave_advice")), Intent::LeaveAdvice);
        assert_eq!(
            Intent::parse(Some("payslip_tax_suggestions")),
            Intent::PayslipTaxSuggestions
        );
        assert_eq!(Intent::parse(Some("dashboard_insights")), Intent::DashboardInsights);
    }

    #[test]
    fn unknown_and_missing_intents_are_general() {
        assert_eq!(Intent::parse(Some("astrology")), Intent::General);
        assert_eq!(Intent::parse(None), Intent::General);
        assert!(!Intent::General.needs_enrichment());
    }

    #[test]
    fn trim_keeps_last_eight_in_order() {
        let history: Vec<_> = (0..11)
            .map(|i| HistoryEntry::new("user", format!("m{i}")))
            .collect();
        let trimmed = HistoryEntry::trim(&history);
        assert_eq!(trimmed.len(), 8);
        assert_eq!(trimmed[0].content, "m3");
        assert_eq!(trimmed[7].content, "m10");
    }

    #[test]
    fn short_history_is_untouched() {
        let history = vec![HistoryEntry::new("user", "hi")];
        assert_eq!(HistoryEntry::trim(&history).len(), 1);
    }

    #[test]
    fn transcript_labels_roles() {
        let history = vec![
            HistoryEntry::new("user", "Why is my pay lower?"),
            HistoryEntry::new("assistant", "An unpaid leave day was deducted."),
        ];
        let text = HistoryEntry::transcript(&history);
        assert_eq!(
            text,
            "User: Why is my pay lower?\nAssistant: An unpaid leave day was deducted."
        );
    }

    #[test]
    fn history_from_context_skips_malformed() {
        let ctx = json!({
            "conversation_history": [
                {"role": "user", "content": "a"},
                {"role": "user"},
                "junk",
                {"role": "assistant", "content": "b"}
            ]
        });
        let entries = HistoryEntry::from_context(ctx.as_object().unwrap());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].content, "b");
    }
}
