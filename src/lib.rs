//! Hierarchical DICOM query/retrieve browsing
//!
//! A [`QueryModel`] binds an [`InformationModel`] (study root or patient root)
//! to a remote archive through an [`AssociationService`]. Calling
//! [`QueryModel::perform_hierarchical_query`] yields a [`ResultTree`] whose
//! nodes issue C-FIND requests for their children the first time they are
//! browsed; [`QueryModel::perform_hierarchical_move`] asks the archive to
//! push a study, series or instance to another application entity.

pub mod adapters;
pub mod association;
pub mod attributes;
pub mod config;
pub mod error;
pub mod filter;
pub mod information_model;
pub mod model;
pub mod patient_root;
pub mod query_model;
pub mod study_root;
pub mod tree;

pub use crate::adapters::DimseAssociationService;
pub use crate::association::{AssociationService, Endpoint};
pub use crate::error::{QrError, Result};
pub use crate::filter::Filter;
pub use crate::information_model::InformationModel;
pub use crate::model::{InformationEntity, ResponseRecord, UniqueKey, UniqueKeySet};
pub use crate::patient_root::PatientRootModel;
pub use crate::query_model::{build_request_identifier, AssociationMode, QueryModel};
pub use crate::study_root::StudyRootModel;
pub use crate::tree::{NodeId, PopulationState, ResultTree, TreeNode};
pub use dimse::MoveSummary;
