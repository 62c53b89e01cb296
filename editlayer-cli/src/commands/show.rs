use anyhow::Result;
use colored::Colorize;
use editlayer_core::{ConflictReason, FileView};
use editlayer_sdk::EditLayerClient;

pub fn run(client: &EditLayerClient, path: &str, raw: bool) -> Result<()> {
    match client.view(path, raw)? {
        None => {
            println!("{}", format!("{} does not exist", path).yellow());
        }
        Some(FileView::Content(content)) => {
            print!("{}", content);
        }
        Some(FileView::Conflict(bundle)) => {
            let reason = match bundle.reason {
                ConflictReason::Text => "staged edit no longer applies to the file on disk",
                ConflictReason::Deleted => "staged for deletion but changed on disk",
            };
            println!("{} {}", "CONFLICT".red().bold(), reason);
            println!();

            let sections = [
                ("on disk", bundle.disk.as_deref()),
                ("staged", bundle.staged.as_deref()),
                ("base", bundle.base.as_deref()),
            ];
            for (label, content) in sections {
                if let Some(content) = content {
                    println!("{}", format!("── {} ──", label).bold());
                    println!("{}", content);
                }
            }

            println!();
            println!(
                "Abandon the edit with {}",
                "editlayer abandon <message-id>".cyan()
            );
        }
    }

    Ok(())
}
