use super::{display_path, kind_label};
use anyhow::Result;
use colored::Colorize;
use dialoguer::Confirm;
use editlayer_core::store::normalize_path;
use editlayer_core::CompositeChange;
use editlayer_sdk::EditLayerClient;

pub fn run(client: &EditLayerClient, paths: Vec<String>, yes: bool) -> Result<()> {
    let paths: Vec<String> = paths.iter().map(|p| normalize_path(p)).collect();
    let pending = client.pending()?;
    let selected = select(&pending, &paths);

    if selected.is_empty() && paths.is_empty() {
        println!("{}", "No changes to commit".yellow());
        return Ok(());
    }

    println!("{}", "Committing:".bold());
    for composite in &selected {
        println!("  {} {}", kind_label(composite.kind), display_path(composite));
    }
    println!();

    if !yes
        && !Confirm::new()
            .with_prompt("Write these changes to disk?")
            .default(true)
            .interact()?
    {
        println!("{}", "Aborted".yellow());
        return Ok(());
    }

    let paths = (!paths.is_empty()).then_some(paths);
    let report = client.commit(paths.as_deref())?;

    for outcome in &report.outcomes {
        match &outcome.error {
            None => println!("  {} {}", "✓".green(), outcome.path),
            Some(error) => println!("  {} {} - {}", "✗".red(), outcome.path, error.red()),
        }
    }
    println!();

    let committed = report.committed().count();
    if report.is_clean() {
        println!(
            "{}",
            format!("✓ Committed {} path(s)", committed).green().bold()
        );
    } else {
        println!(
            "{}",
            format!(
                "⚠ Committed {}/{} path(s); failed paths stay staged",
                committed,
                report.outcomes.len()
            )
            .yellow()
            .bold()
        );
    }

    Ok(())
}

/// The staged composites a commit of `paths` would write; all of them when
/// no paths are given.
fn select<'a>(pending: &'a [CompositeChange], paths: &[String]) -> Vec<&'a CompositeChange> {
    pending
        .iter()
        .filter(|c| paths.is_empty() || paths.contains(&c.path))
        .collect()
}
