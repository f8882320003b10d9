mod commands;
mod config;
mod logging;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::commands::Command;

/// Past Questions portal client
#[derive(Parser)]
#[command(name = "pastq")]
#[command(about = "Browse, download, upload and moderate past exam questions")]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config
        && !path.is_file()
    {
        anyhow::bail!("config file does not exist: {}", path.display());
    }

    logging::init(cli.verbose)?;
    let config = config::load(cli.config.as_deref())?;
    tracing::debug!(
        base_url = %config.base_url,
        session_file = ?config.session_file,
        "configuration loaded"
    );

    commands::run(cli.command, &config).await
}
