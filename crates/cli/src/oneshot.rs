use anyhow::{Context, Result};
use std::path::Path;

use crate::api_client::{ApiClient, GenerateBody};
use crate::display;
use crate::RequestOptions;

/// Generate once, print the result, and optionally write the diagram to `output`.
///
/// Fails when the server reports `success: false` so scripts see a non-zero exit.
pub async fn execute(
    client: &ApiClient,
    prompt: &str,
    options: &RequestOptions,
    current_diagram: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let body = GenerateBody {
        prompt,
        chat_history: &[],
        current_diagram,
        connection_id: options.connection_id.as_ref(),
        validate: options.validate,
    };
    let outcome = client.generate(&body).await?;

    println!("{}", display::format_outcome(&outcome));

    if let Some(path) = output {
        if !outcome.diagram_source.is_empty() {
            std::fs::write(path, format!("{}\n", outcome.diagram_source))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Diagram written to {}", path.display());
        }
    }

    if !outcome.success {
        anyhow::bail!(outcome.error.unwrap_or_else(|| "generation failed".to_string()));
    }
    Ok(())
}
