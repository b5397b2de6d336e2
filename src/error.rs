//! Error types for query/retrieve operations

use dimse::DimseError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for query/retrieve operations
pub type Result<T> = std::result::Result<T, QrError>;

/// Errors raised by the query model and the result tree
#[derive(Error, Debug)]
pub enum QrError {
    /// The information model tables are inconsistent (a definition bug)
    #[error("Information model configuration error: {0}")]
    Configuration(String),

    /// A single response from the remote peer was malformed
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Failure while using an established association
    #[error("Transport error: {0}")]
    Transport(String),

    /// Failure opening, negotiating or releasing an association
    #[error("Association error: {0}")]
    Association(String),

    /// Failure of a caller-invoked move request
    #[error("Retrieve failed: {0}")]
    Retrieve(String),

    /// The caller supplied an unusable filter attribute
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl QrError {
    /// Create a new information model configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a new transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new retrieve error
    pub fn retrieve(msg: impl Into<String>) -> Self {
        Self::Retrieve(msg.into())
    }

    /// Whether the error came from the network side rather than from local definitions
    pub fn is_network(&self) -> bool {
        matches!(self, QrError::Transport(_) | QrError::Association(_))
    }
}

impl From<DimseError> for QrError {
    fn from(err: DimseError) -> Self {
        match err {
            DimseError::AssociationRejected(_)
            | DimseError::InvalidAeTitle(_)
            | DimseError::Config(_) => QrError::Association(err.to_string()),
            other => QrError::Transport(other.to_string()),
        }
    }
}
