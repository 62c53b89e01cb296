use anyhow::Result;
use clap::{Parser, Subcommand};
use editlayer_sdk::EditLayerClient;
use std::path::PathBuf;

mod commands;

use commands::{abandon, commit, diff, log, renames, show, start, status};

#[derive(Parser)]
#[command(name = "editlayer")]
#[command(version, about = "Stage, review and commit AI agent file edits", long_about = None)]
struct Cli {
    /// URL of a running editlayer server
    #[arg(long, global = true, default_value = "http://localhost:3030")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the overlay for a directory and watch it for renames
    Start {
        /// Directory to serve (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Port for the API server
        #[arg(short, long, default_value = "3030")]
        port: u16,

        /// Database path
        #[arg(short, long)]
        db: Option<PathBuf>,
    },

    /// List staged changes
    Status,

    /// Show what committing would change
    Diff {
        /// Only this path
        path: Option<String>,
    },

    /// Print a file as it reads through the overlay
    Show {
        path: String,

        /// Skip staged edits and print what is on disk
        #[arg(long)]
        raw: bool,
    },

    /// Write staged changes to disk
    Commit {
        /// Paths to commit (all staged paths when omitted)
        paths: Vec<String>,

        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Drop every staged change made under a message id
    Abandon { message_id: String },

    /// Find where a path went after being renamed on disk
    Renames {
        path: String,

        /// How far back to look, in seconds
        #[arg(long, default_value = "300")]
        max_age: i64,
    },

    /// Show commit history
    Log {
        /// Number of entries to show
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let client = || EditLayerClient::new(cli.server.clone(), "cli");

    match cli.command {
        Commands::Start { path, port, db } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(start::run(path, port, db))?;
        }
        Commands::Status => {
            status::run(&client())?;
        }
        Commands::Diff { path } => {
            diff::run(&client(), path)?;
        }
        Commands::Show { path, raw } => {
            show::run(&client(), &path, raw)?;
        }
        Commands::Commit { paths, yes } => {
            commit::run(&client(), paths, yes)?;
        }
        Commands::Abandon { message_id } => {
            abandon::run(&client(), &message_id)?;
        }
        Commands::Renames { path, max_age } => {
            renames::run(&client(), &path, max_age)?;
        }
        Commands::Log { limit } => {
            log::run(&client(), limit)?;
        }
    }

    Ok(())
}
