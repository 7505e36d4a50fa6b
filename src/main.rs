//! CFSM model inference

use cfsm_infer::{Config, Result, VERSION, cli, init_logging};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let config = if let Some(config_path) = &args.config {
        Config::from_file(config_path)?
    } else {
        Config::load()?
    };

    let level = args.log_level.clone().unwrap_or_else(|| config.logging.level.clone());
    init_logging(&level, config.logging.file.as_deref())?;

    tracing::info!("cfsm-infer v{}", VERSION);
    tracing::debug!("Parsed arguments: {:?}", args);
    tracing::debug!("Loaded configuration: {:?}", config);

    cli::execute(args, config).await?;

    Ok(())
}
