use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use diagram_cli::{api_client::ApiClient, completions, interactive, oneshot, RequestOptions};
use diagram_common::ConnectionId;

#[derive(Parser)]
#[command(name = "diagram")]
#[command(version)]
#[command(about = "Generate render-validated diagrams from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Prompt (one-shot mode); omit for interactive mode
    prompt: Option<String>,

    /// Diagram server URL
    #[arg(long, env = "DIAGRAM_SERVER_URL", default_value = "http://localhost:8080")]
    server_url: String,

    /// Render connection id shown by the browser client; validation targets it
    #[arg(long, env = "DIAGRAM_CONNECTION_ID")]
    connection_id: Option<String>,

    /// Skip render validation
    #[arg(long)]
    no_validate: bool,

    /// File holding the diagram to edit
    #[arg(long)]
    diagram: Option<PathBuf>,

    /// Write the resulting diagram to this file (one-shot mode)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Request timeout in seconds, repair loop included
    #[arg(long, default_value_t = 600)]
    timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "warn")]
    log_level: String,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Check that the server is up
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = cli.command {
        completions::generate(shell, &mut Cli::command());
        return Ok(());
    }

    diagram_common::init_tracing_with_level(&cli.log_level)?;
    let client = ApiClient::new(&cli.server_url, Duration::from_secs(cli.timeout))?;

    if let Some(Commands::Health) = cli.command {
        let health = client.health().await?;
        println!("{}", serde_json::to_string_pretty(&health)?);
        return Ok(());
    }

    let options = RequestOptions {
        connection_id: cli.connection_id.map(ConnectionId::from_string),
        validate: !cli.no_validate,
    };
    let current_diagram = match &cli.diagram {
        Some(path) => Some(
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?,
        ),
        None => None,
    };

    match cli.prompt {
        Some(prompt) => {
            oneshot::execute(
                &client,
                &prompt,
                &options,
                current_diagram.as_deref(),
                cli.output.as_deref(),
            )
            .await
        }
        None => interactive::run(&client, &options, current_diagram).await,
    }
}
