use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::association::Endpoint;
use crate::attributes;
use crate::config::{ConfigError, LoggingConfig};
use crate::query_model::AssociationMode;
use dimse::config::{validate_ae_title, MAX_PDU, MIN_PDU};
use dimse::{DimseConfig, Priority};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub dimse: DimseSection,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote archive and the AE titles used to reach it
#[derive(Debug, Deserialize)]
pub struct EndpointConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub called_ae_title: String,
    #[serde(default = "default_calling_ae_title")]
    pub calling_ae_title: String,
    /// Keep one find and one move association open for the whole session
    #[serde(default)]
    pub reuse_associations: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DimseSection {
    pub max_pdu: u32,
    pub priority: Priority,
    pub strict: bool,
}

impl Default for DimseSection {
    fn default() -> Self {
        let defaults = DimseConfig::default();
        Self {
            max_pdu: defaults.max_pdu,
            priority: defaults.priority,
            strict: defaults.strict,
        }
    }
}

/// Which hierarchy the archive is browsed through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Study,
    Patient,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub information_model: ModelKind,
    /// Extra return keys by dictionary keyword, added to the default filter
    pub return_keys: Vec<String>,
}

fn default_port() -> u16 {
    104
}

fn default_calling_ae_title() -> String {
    "QRBROWSE".to_string()
}

impl Config {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoint.validate()?;

        if !(MIN_PDU..=MAX_PDU).contains(&self.dimse.max_pdu) {
            return Err(ConfigError::InvalidDimse(format!(
                "max_pdu {} outside {}..={}",
                self.dimse.max_pdu, MIN_PDU, MAX_PDU
            )));
        }

        for keyword in &self.query.return_keys {
            match attributes::parse_tag(keyword) {
                None => return Err(ConfigError::UnknownReturnKey(keyword.clone())),
                Some(tag) if !attributes::is_query_key(tag) => {
                    return Err(ConfigError::UnusableReturnKey(keyword.clone()))
                }
                Some(_) => {}
            }
        }

        self.logging.validate()
    }

    /// DIMSE settings with the endpoint's calling AE title
    pub fn dimse_config(&self) -> DimseConfig {
        DimseConfig {
            local_aet: self.endpoint.calling_ae_title.clone(),
            max_pdu: self.dimse.max_pdu,
            priority: self.dimse.priority,
            strict: self.dimse.strict,
        }
    }

    pub fn to_endpoint(&self) -> Endpoint {
        Endpoint::new(
            self.endpoint.host.clone(),
            self.endpoint.port,
            self.endpoint.called_ae_title.clone(),
            self.endpoint.calling_ae_title.clone(),
        )
    }

    pub fn association_mode(&self) -> AssociationMode {
        if self.endpoint.reuse_associations {
            AssociationMode::Reuse
        } else {
            AssociationMode::Transient
        }
    }
}

impl EndpointConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidEndpoint {
                reason: "host is empty".to_string(),
            });
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidEndpoint {
                reason: "port must be non-zero".to_string(),
            });
        }
        for (field, title) in [
            ("called_ae_title", &self.called_ae_title),
            ("calling_ae_title", &self.calling_ae_title),
        ] {
            if validate_ae_title(title).is_err() {
                return Err(ConfigError::InvalidAeTitle {
                    field,
                    title: title.clone(),
                });
            }
        }
        Ok(())
    }
}
