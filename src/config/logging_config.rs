use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::config::ConfigError;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "qrbrowse=debug,dimse=trace"
    pub level: String,
    pub log_to_file: bool,
    pub log_file_path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file_path: "./qrbrowse.log".to_string(),
        }
    }
}

impl LoggingConfig {
    /// `RUST_LOG` wins over the configured level when set
    pub fn env_filter(&self) -> Result<EnvFilter, ConfigError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.level)
            .map_err(|e| ConfigError::InvalidLogging(format!("level '{}': {}", self.level, e)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_to_file && self.log_file_path.trim().is_empty() {
            return Err(ConfigError::InvalidLogging(
                "log_to_file is set but log_file_path is empty".to_string(),
            ));
        }
        Ok(())
    }
}
