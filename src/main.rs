use clap::Parser;

use shelve::cli::{Args, Commands};
use shelve::config::Config;
use shelve::logging::init_logger;
use shelve::organize::{handle_organize, handle_scan};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    init_logger();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match args.command {
        Commands::Scan {
            source,
            metadata,
            no_hash,
        } => {
            handle_scan(&source, metadata, no_hash, &config).await?;
        }
        Commands::Organize(organize) => {
            organize.apply_to(&mut config);
            handle_organize(
                &organize.source,
                &organize.dest,
                organize.metadata.clone(),
                organize.log,
                &config,
            )
            .await?;
        }
    }

    Ok(())
}
