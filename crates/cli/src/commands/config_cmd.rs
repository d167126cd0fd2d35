//! `payassist config`: Configuration helpers.

use std::path::Path;

use clap::Subcommand;
use payassist_config::AppConfig;

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print a default config file
    Default,
    /// Print where the config file is read from
    Path,
    /// Load the config (file + environment) and report problems
    Validate,
}

pub fn run(action: ConfigAction, explicit: Option<&Path>) -> anyhow::Result<()> {
    match action {
        ConfigAction::Default => print!("{}", AppConfig::default_toml()),
        ConfigAction::Path => println!("{}", config_path(explicit).display()),
        ConfigAction::Validate => validate(&config_path(explicit))?,
    }
    Ok(())
}

fn config_path(explicit: Option<&Path>) -> std::path::PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Non-fatal gaps in an otherwise valid config.
pub fn warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();
    if !config.has_llm_key() {
        warnings.push("No LLM API key (set GEMINI_API_KEY); answers will be fallback messages");
    }
    if !config.has_database() {
        warnings.push("No database (set SUPABASE_URL and SUPABASE_ANON_KEY); using an empty in-memory store");
    }
    if config.gateway.cors_origins.is_empty() {
        warnings.push("No CORS origins; browsers on other origins will be refused");
    }
    if config.environment == "production" && !config.session.cookie_secure {
        warnings.push("Production without COOKIE_SECURE; session cookies will travel over plain HTTP");
    }
    warnings
}

fn validate(path: &Path) -> anyhow::Result<()> {
    println!("Validating {}", path.display());

    let config = match AppConfig::load_with_env(path) {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   ✅ Config parsed");

    let warnings = warnings(&config);
    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    println!();
    println!("   Environment: {}", config.environment);
    println!("   Model:       {}", config.llm.model);
    println!("   Gateway:     {}:{}", config.gateway.host, config.gateway.port);
    println!("   Origins:     {}", config.gateway.cors_origins.join(", "));
    Ok(())
}
