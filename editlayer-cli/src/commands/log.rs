use anyhow::Result;
use colored::Colorize;
use editlayer_sdk::EditLayerClient;

pub fn run(client: &EditLayerClient, limit: Option<usize>) -> Result<()> {
    let records = client.history(limit)?;

    if records.is_empty() {
        println!("{}", "No commits yet".yellow());
        return Ok(());
    }

    println!("{}", "Commit History".bold().cyan());
    println!();

    for record in &records {
        let path = match &record.renamed_from {
            Some(from) => format!("{} → {}", from, record.path),
            None => record.path.clone(),
        };
        println!(
            "{}  {} {}",
            record
                .committed_at
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .dimmed(),
            super::kind_label(record.kind),
            path
        );
    }

    if let Some(limit) = limit {
        if records.len() == limit {
            println!();
            println!("Use {} to see more", "--limit N".cyan());
        }
    }

    Ok(())
}
