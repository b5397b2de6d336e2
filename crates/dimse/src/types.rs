//! Common types for DIMSE operations

use serde::{Deserialize, Serialize};

/// DIMSE command types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimseCommand {
    /// C-FIND request
    Find,
    /// C-MOVE request
    Move,
}

impl DimseCommand {
    /// Command Field value of the request message
    pub fn request_field(self) -> u16 {
        match self {
            DimseCommand::Find => 0x0020,
            DimseCommand::Move => 0x0021,
        }
    }

    /// Command Field value of the matching response message
    pub fn response_field(self) -> u16 {
        self.request_field() | 0x8000
    }

    /// Name used in logs and errors
    pub fn name(self) -> &'static str {
        match self {
            DimseCommand::Find => "C-FIND",
            DimseCommand::Move => "C-MOVE",
        }
    }
}

/// DICOM query/retrieve levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QueryLevel {
    /// Patient level
    Patient,
    /// Study level
    Study,
    /// Series level
    Series,
    /// Image level
    Image,
}

/// Priority of a DIMSE request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority
    Low,
    /// Medium priority (default)
    #[default]
    Medium,
    /// High priority
    High,
}

impl Priority {
    /// Value of the Priority (0000,0700) command element
    pub fn code(self) -> u16 {
        match self {
            Priority::Low => 0x0002,
            Priority::Medium => 0x0000,
            Priority::High => 0x0001,
        }
    }
}

/// DIMSE operation status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimseStatus {
    /// Operation completed successfully
    Success,
    /// Operation is pending (more responses to follow)
    Pending,
    /// Operation cancelled by user
    Cancel,
    /// Operation failed with error
    Failure(u16), // DICOM status code
    /// Warning occurred during operation
    Warning(u16), // DICOM status code
}

impl DimseStatus {
    /// Classify a raw Status (0000,0900) value
    pub fn from_code(code: u16) -> Self {
        match code {
            0x0000 => DimseStatus::Success,
            0xFF00 | 0xFF01 => DimseStatus::Pending,
            0xFE00 => DimseStatus::Cancel,
            0x0001 | 0x0107 | 0x0116 => DimseStatus::Warning(code),
            c if (0xB000..=0xBFFF).contains(&c) => DimseStatus::Warning(code),
            _ => DimseStatus::Failure(code),
        }
    }

    /// Whether more responses follow this one
    pub fn is_pending(&self) -> bool {
        matches!(self, DimseStatus::Pending)
    }

    /// Whether this status terminates the exchange without failure
    pub fn is_final_success(&self) -> bool {
        matches!(
            self,
            DimseStatus::Success | DimseStatus::Warning(_) | DimseStatus::Cancel
        )
    }
}

/// Sub-operation counters reported by C-MOVE responses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveSummary {
    /// Sub-operations still to run
    pub remaining: u32,
    /// Sub-operations completed successfully
    pub completed: u32,
    /// Sub-operations that failed
    pub failed: u32,
    /// Sub-operations that completed with warnings
    pub warning: u32,
}

impl std::fmt::Display for QueryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryLevel::Patient => write!(f, "PATIENT"),
            QueryLevel::Study => write!(f, "STUDY"),
            QueryLevel::Series => write!(f, "SERIES"),
            QueryLevel::Image => write!(f, "IMAGE"),
        }
    }
}

impl std::str::FromStr for QueryLevel {
    type Err = crate::error::DimseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PATIENT" => Ok(QueryLevel::Patient),
            "STUDY" => Ok(QueryLevel::Study),
            "SERIES" => Ok(QueryLevel::Series),
            "IMAGE" | "INSTANCE" => Ok(QueryLevel::Image),
            _ => Err(crate::error::DimseError::config(format!(
                "Invalid query level: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for MoveSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} completed, {} failed, {} warning, {} remaining",
            self.completed, self.failed, self.warning, self.remaining
        )
    }
}
