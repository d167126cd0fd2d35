//! # payassist pipeline
//!
//! Turns a chat request into an answer:
//!
//! ```text
//! request → Enricher → Redactor → Masker → Compactor → Template Selector
//!         → Response Channel → (string | fragment stream)
//! ```
//!
//! Redaction and masking live in `payassist-security`; everything else is
//! here. Only a missing caller is ever reported as an error. Store outages,
//! upstream blocks and LLM failures all degrade to a usable answer.

pub mod channel;
pub mod compact;
pub mod enrich;
pub mod pipeline;
pub mod templates;

#[cfg(test)]
mod test_helpers;

pub use channel::{FragmentStream, ResponseChannel};
pub use compact::compact;
pub use enrich::Enricher;
pub use pipeline::{ChatReply, ChatRequest, ContextPipeline, PreparedPrompt, prepare_unenriched};
pub use templates::select_and_render;
