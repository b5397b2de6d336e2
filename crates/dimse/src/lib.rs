//! DIMSE (DICOM Message Service Element) service class user
//!
//! This crate carries the network side of query/retrieve: it opens
//! associations with a remote archive and exchanges C-FIND and C-MOVE
//! messages over them, encoding identifiers with the negotiated transfer
//! syntax.
//!
//! # Features
//! - Blocking associations built on `dicom-ul`
//! - C-FIND with per-match callback delivery
//! - C-MOVE with sub-operation counters

pub mod config;
pub mod error;
pub mod scu;
pub mod types;

// Re-export commonly used types
pub use config::{DimseConfig, RemoteNode};
pub use error::{DimseError, Result};
pub use scu::{DimseScu, ScuAssociation};
pub use types::{DimseCommand, DimseStatus, MoveSummary, Priority, QueryLevel};

/// Default DICOM port (non-TLS)
pub const DEFAULT_DIMSE_PORT: u16 = 11112;
