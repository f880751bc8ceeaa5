//! trailcal CLI entry point.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use tracing::Level;
use trailcal_core::{TracingConfig, TracingOutputFormat, init_tracing};

use trailcal_cli::cli::{Cli, Command, ConfigAction};
use trailcal_cli::commands;
use trailcal_cli::config::ClientConfig;
use trailcal_cli::error::{ClientError, ClientResult};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config = match &cli.config {
        Some(path) => ClientConfig::load_from(path).map_err(ClientError::Config)?,
        None => ClientConfig::load().map_err(ClientError::Config)?,
    };

    let debug = cli.debug || config.debug;
    let mut logging = match cli.command {
        Command::Serve { .. } => TracingConfig::server(),
        _ => TracingConfig::cli(debug),
    };
    if cli.json_logs {
        logging = logging.with_format(TracingOutputFormat::Json);
    }
    if debug {
        logging = logging.with_level(Level::DEBUG);
    }
    init_tracing(logging)?;

    match cli.command {
        Command::Serve { feed, bind } => commands::serve::run(&config, feed.as_deref(), bind).await,
        Command::Standardize {
            file,
            force,
            cached_only,
        } => print(commands::calendar::standardize(&config, &file, force, cached_only).await?),
        Command::Legacy { file } => print(commands::calendar::legacy(&config, &file).await?),
        Command::Keys { file } => print(commands::calendar::keys(&file).await?),
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(),
        },
    }
}

fn print(output: String) -> ClientResult<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
