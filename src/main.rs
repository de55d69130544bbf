mod cli;

use anyhow::Result;
use bakery::{config, server};
use clap::Parser;
use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config()?;
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    if let Some(log_level) = cli.log_level {
        config.log_level = log_level;
    }

    // Respect RUST_LOG if set, otherwise derive the filter from LOG_LEVEL
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| format!("bakery={},tower_http=info", config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(server::start_server(config))
}
