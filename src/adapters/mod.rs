//! Production implementations of the association service

pub mod dimse;

pub use self::dimse::DimseAssociationService;
