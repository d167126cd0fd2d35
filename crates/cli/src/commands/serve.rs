//! `payassist serve`: Start the HTTP gateway.

use payassist_config::AppConfig;

pub async fn run(mut config: AppConfig, port_override: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("payassist gateway");
    println!("   Listening:    {}:{}", config.gateway.host, config.gateway.port);
    println!("   Environment:  {}", config.environment);
    println!("   Model:        {}", config.llm.model);
    println!("   Database:     {}", if config.has_database() { "supabase" } else { "in-memory" });

    payassist_gateway::start(config)
        .await
        .map_err(|e| anyhow::anyhow!("Gateway failed: {e}"))
}
