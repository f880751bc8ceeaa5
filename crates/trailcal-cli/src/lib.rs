//! CLI: serve feeds, run the pipeline on files, inspect canonical keys
//!
//! This crate provides the `trailcal` command-line interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod secret;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
