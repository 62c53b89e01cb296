use super::{display_path, kind_label};
use anyhow::{Context, Result};
use colored::Colorize;
use editlayer_sdk::EditLayerClient;

pub fn run(client: &EditLayerClient) -> Result<()> {
    let pending = client
        .pending()
        .context("Could not reach the editlayer server. Run 'editlayer start' first.")?;

    if pending.is_empty() {
        println!("{}", "Nothing staged".green());
        return Ok(());
    }

    println!(
        "{} {}",
        "Staged changes:".bold(),
        format!("({})", pending.len()).yellow()
    );
    println!();

    for composite in &pending {
        println!(
            "  {} {}  {}",
            kind_label(composite.kind),
            display_path(composite),
            composite
                .timestamp
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .dimmed()
        );
    }

    println!();
    println!(
        "Run {} to review, {} to write them to disk",
        "editlayer diff".cyan(),
        "editlayer commit".cyan()
    );

    Ok(())
}
