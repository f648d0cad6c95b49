use super::CliError;
use crate::catalog::{CatalogClient, LogfileDefinition};
use crate::config::load_or_default;
use console::style;
use std::path::Path;

/// Print the server's logfile catalog
pub async fn list(config_path: Option<&Path>, server: Option<String>) -> Result<(), CliError> {
    let mut config = load_or_default(config_path)?;
    if let Some(server_url) = server {
        config.client.server_url = server_url;
    }

    let client = CatalogClient::new(&config.client)?;
    let definitions = client.list_logfiles().await?;

    if definitions.is_empty() {
        println!("{}", style("No logfiles available").yellow());
        return Ok(());
    }

    for definition in &definitions {
        println!("{}", describe(definition));
    }
    Ok(())
}

fn describe(definition: &LogfileDefinition) -> String {
    let mut line = style(&definition.name).bold().to_string();
    if let Some(description) = &definition.description {
        line.push_str(&format!("  {}", description));
    }
    if !definition.columns.is_empty() {
        line.push_str(&format!(
            "\n    columns: {}",
            style(definition.columns.join(", ")).dim()
        ));
    }
    line
}
