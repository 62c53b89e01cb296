use anyhow::Result;
use colored::Colorize;
use editlayer_sdk::EditLayerClient;

pub fn run(client: &EditLayerClient, message_id: &str) -> Result<()> {
    let discarded = client.abandon(message_id)?;

    if discarded == 0 {
        println!("{}", format!("No staged changes for {}", message_id).yellow());
    } else {
        println!(
            "{}",
            format!("✓ Discarded {} change(s) from {}", discarded, message_id).green()
        );
    }

    Ok(())
}
