//! Configuration types for the DIMSE service class user

use serde::{Deserialize, Serialize};

use crate::error::{DimseError, Result};
use crate::DEFAULT_DIMSE_PORT;

/// Smallest PDU a peer is required to accept
pub const MIN_PDU: u32 = 4096;

/// Largest PDU this client will propose
pub const MAX_PDU: u32 = 131_072;

/// Configuration for the DIMSE service class user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimseConfig {
    /// Local (calling) Application Entity Title
    pub local_aet: String,

    /// Maximum PDU size in bytes
    #[serde(default = "default_max_pdu")]
    pub max_pdu: u32,

    /// Priority used for C-FIND and C-MOVE requests
    #[serde(default)]
    pub priority: crate::types::Priority,

    /// Reject peers that deviate from the upper layer protocol
    #[serde(default = "default_true")]
    pub strict: bool,
}

/// Configuration for a remote DICOM node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNode {
    /// Remote (called) Application Entity Title
    pub ae_title: String,

    /// Remote host address
    pub host: String,

    /// Remote port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum PDU size for this node (overrides global setting)
    pub max_pdu: Option<u32>,
}

impl Default for DimseConfig {
    fn default() -> Self {
        Self {
            local_aet: "QRBROWSE".to_string(),
            max_pdu: default_max_pdu(),
            priority: Default::default(),
            strict: true,
        }
    }
}

impl DimseConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_ae_title(&self.local_aet)
            .map_err(|_| DimseError::config("Local AE title must be 1-16 characters"))?;

        if self.max_pdu < MIN_PDU || self.max_pdu > MAX_PDU {
            return Err(DimseError::config(format!(
                "Max PDU size must be between {} and {} bytes",
                MIN_PDU, MAX_PDU
            )));
        }

        Ok(())
    }
}

impl RemoteNode {
    /// Create a new remote node configuration
    pub fn new(ae_title: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            ae_title: ae_title.into(),
            host: host.into(),
            port,
            max_pdu: None,
        }
    }

    /// Set the maximum PDU size for this node
    pub fn with_max_pdu(mut self, max_pdu: u32) -> Self {
        self.max_pdu = Some(max_pdu);
        self
    }

    /// Address in the `AE@host:port` form understood by the upper layer
    pub fn address(&self) -> String {
        format!("{}@{}:{}", self.ae_title, self.host, self.port)
    }

    /// Validate the remote node configuration
    pub fn validate(&self) -> Result<()> {
        validate_ae_title(&self.ae_title)
            .map_err(|_| DimseError::config("Remote AE title must be 1-16 characters"))?;

        if self.host.trim().is_empty() {
            return Err(DimseError::config("Remote host cannot be empty"));
        }

        if self.port == 0 {
            return Err(DimseError::config("Remote port must be greater than 0"));
        }

        Ok(())
    }
}

/// Check an AE title against the protocol limits (1-16 characters, no backslash)
pub fn validate_ae_title(ae_title: &str) -> Result<()> {
    let trimmed = ae_title.trim();
    if trimmed.is_empty() || ae_title.len() > 16 || ae_title.contains('\\') {
        return Err(DimseError::InvalidAeTitle(ae_title.to_string()));
    }
    Ok(())
}

// Default value functions
fn default_port() -> u16 {
    DEFAULT_DIMSE_PORT
}

fn default_max_pdu() -> u32 {
    16_384
}

fn default_true() -> bool {
    true
}
