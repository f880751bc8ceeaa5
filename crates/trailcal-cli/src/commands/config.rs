//! Configuration commands.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout.
pub fn dump(config: &ClientConfig) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {e}")))?;
    println!("# config.toml ({})", ClientConfig::default_path().display());
    println!("{toml_str}");
    Ok(())
}

/// Validate the configuration.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    let server = config.to_server_config(None)?;
    println!("Feed: {}", server.feed.name());

    if let Some(gemini) = &config.gemini {
        match gemini.to_gemini_config(config.pipeline.style)? {
            Some(gemini) => {
                gemini.validate().map_err(|e| ClientError::Config(e.to_string()))?;
                println!("Gemini model: {}", gemini.template.model);
            }
            None => println!("Gemini: no API key, events pass through"),
        }
    }

    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path() -> ClientResult<()> {
    println!("config: {}", ClientConfig::default_path().display());
    Ok(())
}
