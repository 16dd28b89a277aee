//! Configuration parsing, validation, and environment variable overrides.

pub mod env;
pub mod parser;
pub mod types;
pub mod validate;

pub use env::{apply_env_overrides, get_config_path};
pub use parser::{load_config, load_config_str};
pub use types::*;
pub use validate::validate_config;

use crate::common::error::ConfigError;

/// Load, apply environment overrides, and validate configuration.
///
/// This is the main entry point for loading configuration.
pub fn load_and_validate(path: impl AsRef<std::path::Path>) -> Result<Config, ConfigError> {
    let config = load_config(path)?;
    let config = apply_env_overrides(config);
    validate_config(&config)?;
    Ok(config)
}
