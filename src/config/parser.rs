//! Configuration file parsing (HOCON format).
//!
//! The file is read up front so I/O problems surface as [`ConfigError::IoError`]
//! with the real `std::io::Error`, separate from syntax or shape problems in
//! the content itself.

use std::fs;
use std::path::Path;

use hocon::HoconLoader;

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Read and parse a HOCON config file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::IoError {
        path: path.display().to_string(),
        source,
    })?;
    load_config_str(&content)
}

/// Parse configuration from a HOCON string.
pub fn load_config_str(content: &str) -> Result<Config, ConfigError> {
    let document = HoconLoader::new()
        .load_str(content)
        .map_err(|e| parse_error("invalid HOCON", e))?;
    document
        .resolve()
        .map_err(|e| parse_error("config does not match the expected shape", e))
}

fn parse_error(context: &str, error: hocon::Error) -> ConfigError {
    ConfigError::ParseError {
        message: format!("{}: {}", context, error),
    }
}
