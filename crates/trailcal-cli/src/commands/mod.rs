//! Subcommand implementations.

pub mod calendar;
pub mod config;
pub mod serve;
