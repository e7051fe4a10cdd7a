//! Diagram server entry point
//!
//! Loads configuration, initializes tracing, and starts the HTTP/WebSocket server.

use anyhow::Result;
use clap::{Parser, Subcommand};
use diagram_common::SystemConfig;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "diagram-server")]
#[command(version)]
#[command(about = "Render-validated diagram generation server")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.dev.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server (default)
    Server {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long)]
        port: Option<u16>,
    },
    /// Validate configuration and exit
    ValidateConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = cli.log_level.as_deref().unwrap_or("info");
    diagram_common::init_tracing_with_level(log_level)?;

    info!(version = diagram_api::VERSION, "Diagram server starting");

    let config = SystemConfig::load_config(&cli.config).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    info!(
        config_path = %cli.config,
        model = %config.llm.model,
        max_fix_attempts = config.repair.max_fix_attempts,
        "Configuration loaded"
    );

    match cli.command {
        Some(Commands::ValidateConfig) => {
            println!("✓ Configuration is valid");
            println!("  Listen:            {}", config.server.bind_address());
            println!("  LLM endpoint:      {} ({})", config.llm.api_base, config.llm.model);
            println!("  Max fix attempts:  {}", config.repair.max_fix_attempts);
            println!("  Validation window: {} ms", config.repair.validation_timeout_ms);
            Ok(())
        }
        Some(Commands::Server { host, port }) => {
            let mut config = config;
            if let Some(h) = host {
                config.server.host = h;
            }
            if let Some(p) = port {
                config.server.port = p;
            }
            start_server(config).await
        }
        None => start_server(config).await,
    }
}

async fn start_server(config: SystemConfig) -> Result<()> {
    info!("Starting diagram server on {}", config.server.bind_address());
    diagram_api::DiagramServer::new(config).run().await
}
