use anyhow::{Context, Result};
use colored::Colorize;
use editlayer_core::Config;
use editlayer_server::EditLayerServer;
use std::path::PathBuf;

pub async fn run(path: PathBuf, port: u16, db: Option<PathBuf>) -> Result<()> {
    let abs_path = std::fs::canonicalize(&path)
        .with_context(|| format!("cannot serve {:?}", path))?;

    let db_path = db.unwrap_or_else(|| Config::default_db_path(&abs_path));

    println!("{}", "🚀 Starting editlayer server...".bold().cyan());
    println!("   {}: {:?}", "Root".bold(), abs_path);
    println!("   {}: {:?}", "Database".bold(), db_path);

    let server = EditLayerServer::new(abs_path, db_path)?;

    println!(
        "   {}: {}",
        "API Server".bold(),
        format!("http://localhost:{}", port).green()
    );
    println!();
    println!("{}", "Edits stay staged until you run `editlayer commit`".dimmed());
    println!("{}", "Press Ctrl+C to stop".dimmed());
    println!();

    let addr = format!("0.0.0.0:{}", port).parse()?;
    server.serve(addr).await?;

    Ok(())
}
