//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding the listener port.
pub const PORT_ENV: &str = "PORT";

/// Why a configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content, std::env::var(PORT_ENV).ok().as_deref())
}

/// Parse configuration text, applying a port override when given.
pub fn parse_config(content: &str, port: Option<&str>) -> Result<GatewayConfig, ConfigError> {
    let mut config: GatewayConfig = toml::from_str(content)?;

    if let Some(port) = port.filter(|p| !p.is_empty()) {
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
