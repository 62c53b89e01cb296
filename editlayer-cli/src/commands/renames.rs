use anyhow::Result;
use colored::Colorize;
use editlayer_sdk::EditLayerClient;

pub fn run(client: &EditLayerClient, path: &str, max_age: i64) -> Result<()> {
    match client.resolve_rename(path, Some(max_age))? {
        Some(current) => println!("{} → {}", path, current.green()),
        None => println!(
            "{}",
            format!("{} was not renamed in the last {}s", path, max_age).dimmed()
        ),
    }

    Ok(())
}
