//! `payassist ask`: Ask the LLM about a local context file.
//!
//! Runs sanitize → compact → render → generate. There is no caller and no
//! database here, so nothing is enriched.

use std::io::Write;

use futures::StreamExt;
use payassist_config::AppConfig;
use payassist_pipeline::{ResponseChannel, prepare_unenriched};
use tracing::debug;

use super::PromptArgs;

pub async fn run(config: AppConfig, args: PromptArgs, stream: bool) -> anyhow::Result<()> {
    if !config.has_llm_key() {
        eprintln!("  No LLM API key configured; set GEMINI_API_KEY or llm.api_key.");
        eprintln!(
            "  Config file: {}",
            AppConfig::config_dir().join("config.toml").display()
        );
    }

    let prepared = prepare_unenriched(&args.to_request()?);
    debug!(
        intent = %prepared.intent,
        context_used = prepared.context_used(),
        "Prompt prepared"
    );

    let provider = payassist_providers::build_from_config(&config)?;
    let channel = ResponseChannel::new(provider, config.llm.model.clone())
        .with_config(config.llm.generation_config());

    if stream {
        let mut fragments =
            channel.generate_stream(&prepared.render_without_history(), &prepared.history);
        let mut stdout = std::io::stdout();
        while let Some(fragment) = fragments.next().await {
            write!(stdout, "{fragment}")?;
            stdout.flush()?;
        }
        writeln!(stdout)?;
    } else {
        eprint!("  Thinking...");
        let answer = channel.generate(&prepared.render()).await;
        eprint!("\r              \r");
        println!("{answer}");
    }

    Ok(())
}
