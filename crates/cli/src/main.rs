//! payassist CLI: the main entry point.
//!
//! Commands:
//! - `serve`: Start the HTTP gateway
//! - `ask`: Sanitize a context file and ask the LLM (no database)
//! - `prompt`: Print the rendered prompt without calling the LLM
//! - `config`: Print the default config, its path, or validate it

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use payassist_config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "payassist",
    about = "payassist: payroll assistant backend",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to ~/.payassist/config.toml)
    #[arg(short, long, global = true, env = "PAYASSIST_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a question against a local context file
    Ask {
        #[command(flatten)]
        args: commands::PromptArgs,

        /// Print fragments as they arrive
        #[arg(long)]
        stream: bool,
    },

    /// Render the prompt for a question without calling the LLM
    Prompt {
        #[command(flatten)]
        args: commands::PromptArgs,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: commands::config_cmd::ConfigAction,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    // Logs go to stderr so `ask` and `prompt` output stays pipeable
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => AppConfig::load().context("Failed to load config"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    match cli.command {
        Commands::Serve { port } => {
            let config = load_config(cli.config.as_deref())?;
            commands::serve::run(config, port).await?
        }
        Commands::Ask { args, stream } => {
            let config = load_config(cli.config.as_deref())?;
            commands::ask::run(config, args, stream).await?
        }
        Commands::Prompt { args } => commands::prompt::run(args)?,
        Commands::Config { action } => commands::config_cmd::run(action, cli.config.as_deref())?,
    }

    Ok(())
}
