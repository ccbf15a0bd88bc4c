use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tool_gateway::config::loader;
use tool_gateway::server;
use tool_gateway::utils::logging::{self, LogLevel};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML config file; the built-in template (environment driven) is used when absent
    #[arg(short, long, env = "CONFIG")]
    config: Option<String>,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // -------------------------------
    // 1. Load and validate config
    // -------------------------------

    let service_config = loader::run(args.config.as_deref()).await?;
    logging::run(service_config.logging.as_ref(), args.log_level);

    // -------------------------------
    // 2. Serve tools, health and metrics
    // -------------------------------

    info!(backend = %service_config.backend.url, "Service starting...");
    server::server::start(Arc::new(service_config)).await
}
