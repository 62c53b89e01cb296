use super::{display_path, kind_label};
use anyhow::Result;
use colored::Colorize;
use editlayer_core::diff::{DiffLineType, FileDiff};
use editlayer_sdk::EditLayerClient;

pub fn run(client: &EditLayerClient, path: Option<String>) -> Result<()> {
    let composites = match path {
        Some(path) => match client.peek(&path)? {
            Some(composite) => vec![composite],
            None => {
                println!("{}", format!("Nothing staged for {}", path).yellow());
                return Ok(());
            }
        },
        None => client.pending()?,
    };

    if composites.is_empty() {
        println!("{}", "Nothing staged".green());
        return Ok(());
    }

    for composite in &composites {
        println!("{}", "━".repeat(80).bright_black());
        println!(
            "{} {}",
            kind_label(composite.kind),
            display_path(composite).white().bold()
        );
        println!();

        let diff = FileDiff::from_composite(composite);
        if !diff.has_changes() {
            println!("  {}", "[no content changes]".dimmed());
            println!();
            continue;
        }

        for line in &diff.diff_lines {
            let (prefix, color): (&str, fn(&str) -> colored::ColoredString) = match line.line_type
            {
                DiffLineType::Addition => ("+", |s| s.green()),
                DiffLineType::Deletion => ("-", |s| s.red()),
                DiffLineType::Context => (" ", |s| s.normal()),
            };
            print!("{}", color(&format!("{}{}", prefix, line.content)));
            if !line.content.ends_with('\n') {
                println!();
            }
        }
        println!();
    }

    Ok(())
}
