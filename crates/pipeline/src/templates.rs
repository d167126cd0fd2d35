//! Prompt templates and prompt rendering.
//!
//! Every intent has exactly one template; anything unrecognised gets the
//! general one. Rendering is pure: same inputs, same prompt.

use payassist_core::{Context, HistoryEntry, Intent};
use serde_json::Value;

pub const TAX_GUIDANCE: &str = "\
Reference: common deductions for salaried taxpayers in India
- Section 80C: up to ₹1.5 lakh (PPF, ELSS, life insurance, home loan principal, children's tuition)
- Section 80D: health insurance premiums (₹25,000 for self and family, a further ₹25,000 for parents, ₹50,000 if they are senior citizens)
- Section 80E: interest on an education loan, no upper limit
- HRA exemption: the least of actual HRA received, 50%/40% of salary (metro/non-metro), or rent paid minus 10% of salary
- Section 80CCD(1B): an extra ₹50,000 for NPS contributions
- Standard deduction: ₹50,000
- Section 192: TDS deducted by the employer on salary

A chartered accountant should confirm anything before it is acted on.";

pub const DISCLAIMER: &str = "\
**Disclaimer**: this is general information for educational purposes, not financial, legal or tax advice. \
Tax rules change and personal circumstances differ; check with a qualified Chartered Accountant (CA) \
before making decisions or filing returns.";

const SAFETY_RULES: &str = "\
Privacy rules (always apply):
- Never show or mention bank account numbers, PAN, Aadhaar or any other identity number.
- If such values appear in the context, ignore them without comment.
- Mark every tax figure as an approximate, conservative estimate.";

const PAYSLIP_EXPLAIN: &str = "\
You are a payroll assistant for an Indian company. Explain the employee's payslip plainly and briefly.

Using the payslip data in the context:
1. Open with a two or three sentence summary of net pay and anything notable.
2. Break down earnings and deductions with ₹ amounts.
3. Compare with previous payslips (up to 12 months) and explain any change larger than 10%.
4. Report year-to-date gross and net totals for the fiscal year starting 1 April, when provided.
5. Offer conservative tax-saving ideas (80C, 80D, 80E, HRA, 80CCD(1B), standard deduction).
6. For each idea give the section and limit, the paperwork needed (receipts, declarations, Form 16),
   and an approximate annual saving assuming a 20-30% bracket unless the salary clearly implies more.
   For example: \"₹1.5L in ELSS could save roughly ₹31,200-46,800 at a 20-30% bracket.\"

Keep the tone friendly and use ₹ formatting.";

const LEAVE_ADVICE: &str = "\
You are an HR assistant for an Indian company. Help the employee understand a leave request and what it means for them.

Using the leave details and balances in the context:
1. Count the days requested, including both the start and end date.
2. Say whether the leave is paid or unpaid and what that means for salary.
3. For unpaid leave, estimate the per-day salary deduction.
4. Check whether the remaining balance covers paid leave.
5. Suggest a professional, diplomatic way to word the reason.
6. Point out upcoming leave periods or holidays that may affect the request.

Be brief and use bullet points.";

const TAX_SUGGESTIONS: &str = "\
You are a tax planning assistant for salaried employees in India.

From the payslip data and salary structure in the context, give 3 to 5 high-level tax-saving suggestions.
For each one include the section (80C, 80D, HRA, ...), the proof required,
a conservative annual saving in ₹ and a one-line example.

Present a numbered list. Keep it practical. Do not recommend specific investment products.";

const DASHBOARD_INSIGHTS: &str = "\
You are a payroll insights assistant.

From the recent payslips and leave information in the context, write 2 to 4 sentences covering:
1. why net pay moved, if it changed noticeably from the previous period,
2. any unusual deduction or benefit,
3. one practical tip for managing compensation.

Stay positive and use ₹ for amounts.";

const GENERAL: &str = "\
You are an assistant for a payroll and HR management system used in India.
Answer the question clearly and briefly using the context provided.
If the context does not contain enough information, say so.

Use ₹ formatting where it applies and treat all personal data as confidential.";

const CLOSING: &str = "\
Answer in well-structured, readable prose: short paragraphs or bullet points, \
₹ for amounts, and no raw JSON or field names.";

/// The full template text for an intent.
pub fn template_for(intent: Intent) -> String {
    match intent {
        Intent::PayslipExplain => format!("{PAYSLIP_EXPLAIN}\n\n{DISCLAIMER}\n\n{SAFETY_RULES}"),
        Intent::LeaveAdvice => format!("{LEAVE_ADVICE}\n\n{DISCLAIMER}\n\n{SAFETY_RULES}"),
        Intent::PayslipTaxSuggestions => {
            format!("{TAX_SUGGESTIONS}\n\n{TAX_GUIDANCE}\n\n{DISCLAIMER}\n\n{SAFETY_RULES}")
        }
        Intent::DashboardInsights => format!("{DASHBOARD_INSIGHTS}\n\n{DISCLAIMER}"),
        Intent::General => GENERAL.to_string(),
    }
}

fn inline_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a context as a readable block: intent, page, then each `data` entry.
pub fn format_context(context: &Context, intent: Option<&str>) -> String {
    let mut lines: Vec<String> = Vec::new();

    if let Some(intent) = intent.filter(|i| !i.is_empty()) {
        lines.push(format!("Intent: {intent}"));
        lines.push(String::new());
    }

    if let Some(page) = context.get("page_view").filter(|v| !v.is_null()) {
        lines.push(format!("Page: {}", inline_value(page)));
        lines.push(String::new());
    }

    if let Some(data) = context.get("data").and_then(Value::as_object) {
        if !data.is_empty() {
            lines.push("Data:".into());
            for (key, value) in data {
                let rendered = match value {
                    Value::Object(_) | Value::Array(_) => {
                        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
                    }
                    scalar => inline_value(scalar),
                };
                lines.push(format!("  {key}: {rendered}"));
            }
        }
    }

    if lines.is_empty() {
        "No additional context provided.".into()
    } else {
        lines.join("\n")
    }
}

/// Build the final prompt.
///
/// `intent` falls back to the context's own `intent` tag. The trailing
/// [`MAX_HISTORY_ENTRIES`](payassist_core::MAX_HISTORY_ENTRIES) turns of
/// `conversation_history` are included as a transcript.
pub fn select_and_render(
    query: &str,
    context: &Context,
    intent: Option<&str>,
    system_instruction: Option<&str>,
) -> String {
    let intent_tag = intent
        .or_else(|| context.get("intent").and_then(Value::as_str))
        .map(str::trim)
        .filter(|i| !i.is_empty());

    let mut sections = Vec::with_capacity(6);

    if let Some(instruction) = system_instruction.map(str::trim).filter(|s| !s.is_empty()) {
        sections.push(format!("SYSTEM INSTRUCTION: {instruction}"));
    }

    sections.push(template_for(Intent::parse(intent_tag)));
    sections.push(format!("Context:\n{}", format_context(context, intent_tag)));

    let history = HistoryEntry::from_context(context);
    if !history.is_empty() {
        sections.push(format!(
            "Conversation so far:\n{}",
            HistoryEntry::transcript(&history)
        ));
    }

    sections.push(format!("User Query: {query}"));
    sections.push(CLOSING.to_string());

    sections.join("\n\n")
}
