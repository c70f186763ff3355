mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "code_depgraph=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            path,
            config,
            hashes,
            compact,
        } => {
            cli::scan(&path, config.as_deref(), hashes, compact)?;
        }
        Commands::Hash { file, entities } => {
            cli::hash_file(&file, entities)?;
        }
        Commands::Compare { old, new } => {
            cli::compare(&old, &new)?;
        }
        Commands::Languages => {
            cli::list_languages()?;
        }
    }

    Ok(())
}
