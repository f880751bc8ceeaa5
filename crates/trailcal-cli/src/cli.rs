//! Command-line interface definition.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// trailcal - Standardized calendar feeds for the trail team
#[derive(Debug, Parser)]
#[command(name = "trailcal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "TRAILCAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the original, standardized and legacy feeds over HTTP
    Serve {
        /// Feed URL or path, overriding the configuration
        #[arg(long, env = "TRAILCAL_FEED")]
        feed: Option<String>,

        /// Listen address, overriding the configuration
        #[arg(long)]
        bind: Option<SocketAddr>,
    },

    /// Standardize a calendar file and print the result
    Standardize {
        /// Calendar file
        file: PathBuf,

        /// Ignore cached results
        #[arg(long, short)]
        force: bool,

        /// Only assemble from cached results, without calling the service
        #[arg(long, conflicts_with = "force")]
        cached_only: bool,
    },

    /// Apply the rule-based cleanup to a calendar file and print the result
    Legacy {
        /// Calendar file
        file: PathBuf,
    },

    /// Print the canonical key of every event in a calendar file
    Keys {
        /// Calendar file
        file: PathBuf,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_standardize() {
        let cli = Cli::try_parse_from(["trailcal", "-v", "standardize", "team.ics", "--force"]).unwrap();
        assert!(cli.debug);
        match cli.command {
            Command::Standardize {
                file,
                force,
                cached_only,
            } => {
                assert_eq!(file, PathBuf::from("team.ics"));
                assert!(force);
                assert!(!cached_only);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn force_conflicts_with_cached_only() {
        assert!(
            Cli::try_parse_from(["trailcal", "standardize", "a.ics", "--force", "--cached-only"])
                .is_err()
        );
    }

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::try_parse_from([
            "trailcal",
            "serve",
            "--feed",
            "https://example.com/team.ics",
            "--bind",
            "0.0.0.0:8080",
        ])
        .unwrap();
        match cli.command {
            Command::Serve { feed, bind } => {
                assert_eq!(feed.as_deref(), Some("https://example.com/team.ics"));
                assert_eq!(bind.map(|b| b.port()), Some(8080));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
