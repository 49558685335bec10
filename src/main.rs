//! chatstream - streaming chat service
//!
#![doc = "chatstream - streaming chat service"]
#![doc = "Main entry point for the chatstream binary."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatstream::cli::{Cli, Commands};
use chatstream::commands;
use chatstream::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Serve { .. } => {
            tracing::info!("Starting HTTP server");
            commands::serve::run_serve(config).await?;
            Ok(())
        }
        Commands::Chat {
            conversation,
            search,
        } => {
            tracing::info!("Starting interactive chat mode");
            if let Some(id) = &conversation {
                tracing::debug!("Continuing conversation: {}", id);
            }
            commands::chat::run_chat(config, conversation, search).await?;
            Ok(())
        }
        Commands::History { command } => {
            commands::history::handle_history(&config, command)?;
            Ok(())
        }
        Commands::Search { query, max_results } => {
            tracing::debug!("Searching for: {}", query);
            commands::search::run_search(config, query, max_results).await?;
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "chatstream=debug"
    } else {
        "chatstream=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
