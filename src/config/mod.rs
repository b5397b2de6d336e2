mod tests;
mod logging_config;
pub mod config;

pub use self::config::{Config, DimseSection, EndpointConfig, ModelKind, QueryConfig};
pub use self::logging_config::LoggingConfig;

use thiserror::Error;

/// Problems found while loading or validating a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid endpoint: {reason}")]
    InvalidEndpoint { reason: String },

    #[error("Invalid AE title '{title}' for {field}")]
    InvalidAeTitle { field: &'static str, title: String },

    #[error("Invalid DIMSE settings: {0}")]
    InvalidDimse(String),

    #[error("Unknown return key '{0}'")]
    UnknownReturnKey(String),

    #[error("Return key '{0}' is not carried by any query level")]
    UnusableReturnKey(String),

    #[error("Invalid logging settings: {0}")]
    InvalidLogging(String),
}
