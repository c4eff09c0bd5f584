use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "extrato", version, about = "Import bank statements into a local ledger")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import an OFX or CSV statement and print the result as JSON
    Import {
        /// SQLite database file, created if missing
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        user: String,
        /// Link every row to this account instead of resolving one
        #[arg(long)]
        account: Option<String>,
        /// TOML import settings
        #[arg(long)]
        config: Option<PathBuf>,
        file: PathBuf,
    },
    /// Print the detected format of a statement file
    Detect { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Import {
            db,
            user,
            account,
            config,
            file,
        } => commands::cmd_import(&db, &user, account, config.as_deref(), &file).await,
        Command::Detect { file } => commands::cmd_detect(&file),
    }
}
