//! Client configuration and its TOML file

mod client;
pub mod serde_utils;

pub use client::{BackoffConfig, ClientConfig, CERT_HASH_PATH};

use std::io;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Platform config directory for noaide, e.g. `~/.config/noaide`
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("noaide")
}

/// Default location of the client config file
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("client.toml")
}

/// Read and validate a client configuration.
///
/// Keys missing from the file take their default values.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
        _ => ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let config: ClientConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Validate and write a client configuration, creating parent directories
pub fn save_config(path: &Path, config: &ClientConfig) -> Result<(), ConfigError> {
    config.validate()?;
    let content = toml::to_string_pretty(config)?;

    let io_error = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    std::fs::write(path, content).map_err(io_error)
}
