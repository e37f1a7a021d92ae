mod server;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use multiauth_core::{
    bootstrap::{init_dispatcher, load_config, log_config_summary},
    logging,
};

use server::LoginServer;

/// Multi-provider OAuth2 login hub
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to a YAML config file
    #[arg(short, long, env = "MULTIAUTH_CONFIG_PATH")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load and validate configuration
    let config = load_config(args.config.as_deref())?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("multiauth starting...");
    log_config_summary(&config);

    // 3. Construct every enabled provider adapter
    let dispatcher = init_dispatcher(&config)?;

    // 4. Serve until a shutdown signal arrives
    LoginServer::new(config, dispatcher).run().await
}
