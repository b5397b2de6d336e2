//! Query model: per-level request building and the protocol calls behind it

use dicom_core::header::Header;
use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use dimse::MoveSummary;
use tracing::{debug, info, warn};

use crate::association::{AssociationService, Endpoint};
use crate::attributes;
use crate::filter::Filter;
use crate::information_model::InformationModel;
use crate::model::{InformationEntity, UniqueKeySet};
use crate::tree::ResultTree;
use crate::{QrError, Result};

/// How associations are managed across calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssociationMode {
    /// Find and move associations are opened up front and kept until released
    Reuse,
    /// A fresh association is opened and released around every call
    #[default]
    Transient,
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Find,
    Move,
}

/// Drives hierarchical queries for one information model against one endpoint.
///
/// Not meant to be shared between threads; callers serialize access.
pub struct QueryModel<M, S: AssociationService> {
    model: M,
    service: S,
    endpoint: Endpoint,
    mode: AssociationMode,
    find_association: Option<S::Association>,
    move_association: Option<S::Association>,
}

impl<M: InformationModel, S: AssociationService> QueryModel<M, S> {
    /// Bind `model` to `endpoint`.
    ///
    /// The model tables are checked here, so a broken model fails before any
    /// network traffic. In [`AssociationMode::Reuse`] the find and move
    /// associations are opened immediately.
    pub fn new(model: M, service: S, endpoint: Endpoint, mode: AssociationMode) -> Result<Self> {
        endpoint.validate()?;
        validate_model(&model)?;

        let mut query_model = Self {
            model,
            service,
            endpoint,
            mode,
            find_association: None,
            move_association: None,
        };

        if mode == AssociationMode::Reuse {
            let find = query_model
                .service
                .open(&query_model.endpoint, query_model.model.find_sop_class())?;
            query_model.find_association = Some(find);
            let moving = query_model
                .service
                .open(&query_model.endpoint, query_model.model.move_sop_class())?;
            query_model.move_association = Some(moving);
        }

        info!(
            "Query model '{}' bound to {} ({:?} associations)",
            query_model.model.name(),
            query_model.endpoint,
            mode
        );
        Ok(query_model)
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn mode(&self) -> AssociationMode {
        self.mode
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut S {
        &mut self.service
    }

    /// Identifier for a query at `level` below `ancestor_keys`
    pub fn build_request_identifier(
        &self,
        filter: &Filter,
        ancestor_keys: &UniqueKeySet,
        level: InformationEntity,
    ) -> Result<InMemDicomObject> {
        build_request_identifier(&self.model, filter, ancestor_keys, level)
    }

    /// Query `level` below `ancestor_keys`, handing each match to `sink` as it arrives
    pub fn query(
        &mut self,
        filter: &Filter,
        ancestor_keys: &UniqueKeySet,
        level: InformationEntity,
        sink: &mut dyn FnMut(InMemDicomObject),
    ) -> Result<usize> {
        let identifier = self.build_request_identifier(filter, ancestor_keys, level)?;
        info!(
            "Querying {} level on {} below [{}]",
            level, self.endpoint, ancestor_keys
        );
        debug!("Request identifier: {:?}", identifier);

        self.with_association(Operation::Find, |service, association| {
            service.find(association, &identifier, sink)
        })
    }

    /// Ask the remote peer to push the matches of `identifier` to `destination_aet`
    pub fn move_identifier(
        &mut self,
        identifier: &InMemDicomObject,
        destination_aet: &str,
    ) -> Result<MoveSummary> {
        info!("Moving from {} to {}", self.endpoint, destination_aet);
        self.with_association(Operation::Move, |service, association| {
            service.move_to(association, identifier, destination_aet)
        })
        .map_err(|e| match e {
            QrError::Retrieve(_) => e,
            other => QrError::retrieve(format!("move to {}: {}", destination_aet, other)),
        })
    }

    /// Retrieve the record identified by `keys` and everything below it
    pub fn perform_hierarchical_move(
        &mut self,
        keys: &UniqueKeySet,
        destination_aet: &str,
    ) -> Result<MoveSummary> {
        let identifier = keys.to_identifier().ok_or_else(|| {
            QrError::retrieve(format!("nothing to move: no queryable unique key in [{}]", keys))
        })?;
        self.move_identifier(&identifier, destination_aet)
    }

    /// Start browsing: the root node and its first level are fetched right away
    pub fn perform_hierarchical_query(&mut self, filter: Filter) -> ResultTree<'_, M, S> {
        ResultTree::new(self, filter)
    }

    fn with_association<T>(
        &mut self,
        operation: Operation,
        call: impl FnOnce(&mut S, &mut S::Association) -> Result<T>,
    ) -> Result<T> {
        let sop_class = match operation {
            Operation::Find => self.model.find_sop_class(),
            Operation::Move => self.model.move_sop_class(),
        };

        match self.mode {
            AssociationMode::Transient => {
                let mut association = self.service.open(&self.endpoint, sop_class)?;
                let result = call(&mut self.service, &mut association);
                if let Err(e) = self.service.release(association) {
                    warn!("Failed to release {:?} association: {}", operation, e);
                }
                result
            }
            AssociationMode::Reuse => {
                let cached = match operation {
                    Operation::Find => self.find_association.take(),
                    Operation::Move => self.move_association.take(),
                };
                let mut association = match cached {
                    Some(association) => association,
                    None => {
                        debug!("Reopening {:?} association", operation);
                        self.service.open(&self.endpoint, sop_class)?
                    }
                };

                let result = call(&mut self.service, &mut association);
                if result.is_ok() {
                    match operation {
                        Operation::Find => self.find_association = Some(association),
                        Operation::Move => self.move_association = Some(association),
                    }
                } else if let Err(e) = self.service.release(association) {
                    // state of a failed association is unknown, it is not cached again
                    warn!("Failed to release {:?} association: {}", operation, e);
                }
                result
            }
        }
    }
}

impl<M, S: AssociationService> QueryModel<M, S> {
    /// Close cached associations. Failures are logged, never returned.
    pub fn release_associations(&mut self) {
        for (operation, slot) in [
            (Operation::Find, self.find_association.take()),
            (Operation::Move, self.move_association.take()),
        ] {
            if let Some(association) = slot {
                if let Err(e) = self.service.release(association) {
                    warn!("Failed to release {:?} association: {}", operation, e);
                }
            }
        }
    }

    /// Whether find/move associations are currently held open
    pub fn holds_associations(&self) -> bool {
        self.find_association.is_some() || self.move_association.is_some()
    }
}

impl<M, S: AssociationService> Drop for QueryModel<M, S> {
    fn drop(&mut self) {
        self.release_associations();
    }
}

/// Derive the request identifier for `level` from the session filter.
///
/// Copies every filter attribute owned by an entity visible at `level`
/// (and the character set), stamps the query/retrieve level, merges the
/// ancestors' unique keys and adds an empty unique key for `level` when the
/// filter lacks one.
pub fn build_request_identifier<M: InformationModel + ?Sized>(
    model: &M,
    filter: &Filter,
    ancestor_keys: &UniqueKeySet,
    level: InformationEntity,
) -> Result<InMemDicomObject> {
    let owners = model.level_attribute_owners(level);
    let mut identifier = InMemDicomObject::new_empty();

    for element in filter.iter() {
        let tag = element.tag();
        if tag == tags::SPECIFIC_CHARACTER_SET {
            identifier.put(element.clone());
            continue;
        }
        match attributes::owning_entity(tag) {
            Some(owner) if owners.contains(&owner) => {
                identifier.put(element.clone());
            }
            Some(_) => {}
            None if tag == tags::QUERY_RETRIEVE_LEVEL => {}
            None => warn!(
                "Filter attribute {} belongs to no query level and is not sent",
                tag
            ),
        }
    }

    let marker = level.query_level().ok_or_else(|| {
        QrError::configuration(format!("{} is not a query/retrieve level", level))
    })?;
    identifier.put(DataElement::new(
        tags::QUERY_RETRIEVE_LEVEL,
        VR::CS,
        PrimitiveValue::from(marker.to_string()),
    ));

    ancestor_keys.merge_into(&mut identifier);

    let unique_tag = model.unique_key_tag(level).ok_or_else(|| {
        QrError::configuration(format!("no unique key defined for {} level", level))
    })?;
    if identifier.element(unique_tag).is_err() {
        let vr = attributes::declared_vr(unique_tag).ok_or_else(|| {
            QrError::configuration(format!(
                "no value representation known for unique key {} of {} level",
                unique_tag, level
            ))
        })?;
        identifier.put(DataElement::new(unique_tag, vr, PrimitiveValue::Empty));
    }

    Ok(identifier)
}

/// Check that every level of `model` can be queried
pub fn validate_model<M: InformationModel + ?Sized>(model: &M) -> Result<()> {
    for level in model.levels() {
        if level.query_level().is_none() {
            return Err(QrError::configuration(format!(
                "{} model uses {} as a query level",
                model.name(),
                level
            )));
        }
        let tag = model.unique_key_tag(level).ok_or_else(|| {
            QrError::configuration(format!(
                "{} model defines no unique key for {} level",
                model.name(),
                level
            ))
        })?;
        if attributes::declared_vr(tag).is_none() {
            return Err(QrError::configuration(format!(
                "{} model: no value representation known for unique key {} of {} level",
                model.name(),
                tag,
                level
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::string_value;
    use crate::model::UniqueKey;
    use crate::study_root::StudyRootModel;
    use dicom_core::Tag;

    fn study_keys(uid: &str) -> UniqueKeySet {
        UniqueKeySet::new().with(
            InformationEntity::Study,
            UniqueKey {
                tag: tags::STUDY_INSTANCE_UID,
                vr: VR::UI,
                value: uid.to_string(),
            },
        )
    }

    fn sample_filter() -> Filter {
        Filter::new()
            .with_value(tags::SPECIFIC_CHARACTER_SET, "ISO_IR 100")
            .unwrap()
            .with_value(tags::PATIENT_NAME, "Smith^Mary")
            .unwrap()
            .with_return_key(tags::STUDY_DATE)
            .unwrap()
            .with_return_key(tags::MODALITY)
            .unwrap()
            .with_return_key(Tag(0x0040, 0x0253))
            .unwrap()
            .with_return_key(tags::INSTANCE_NUMBER)
            .unwrap()
    }

    #[test]
    fn test_study_level_identifier() {
        let model = StudyRootModel::new();
        let identifier = build_request_identifier(
            &model,
            &sample_filter(),
            &UniqueKeySet::new(),
            InformationEntity::Study,
        )
        .unwrap();

        assert_eq!(
            string_value(&identifier, tags::QUERY_RETRIEVE_LEVEL).as_deref(),
            Some("STUDY")
        );
        assert_eq!(
            string_value(&identifier, tags::PATIENT_NAME).as_deref(),
            Some("Smith^Mary")
        );
        assert!(identifier.element(tags::SPECIFIC_CHARACTER_SET).is_ok());
        assert!(identifier.element(tags::STUDY_DATE).is_ok());
        assert!(identifier.element(tags::MODALITY).is_err());
        assert!(identifier.element(tags::INSTANCE_NUMBER).is_err());

        // placeholder for the level's own unique key
        let uid = identifier.element(tags::STUDY_INSTANCE_UID).unwrap();
        assert_eq!(uid.vr(), VR::UI);
        assert!(matches!(uid.value().primitive(), Some(PrimitiveValue::Empty)));
    }

    #[test]
    fn test_series_level_identifier_carries_ancestor_keys() {
        let model = StudyRootModel::new();
        let identifier = build_request_identifier(
            &model,
            &sample_filter(),
            &study_keys("1.2.3"),
            InformationEntity::Series,
        )
        .unwrap();

        assert_eq!(
            string_value(&identifier, tags::QUERY_RETRIEVE_LEVEL).as_deref(),
            Some("SERIES")
        );
        assert_eq!(
            string_value(&identifier, tags::STUDY_INSTANCE_UID).as_deref(),
            Some("1.2.3")
        );
        assert!(identifier.element(tags::MODALITY).is_ok());
        assert!(identifier.element(Tag(0x0040, 0x0253)).is_ok());
        assert!(identifier.element(tags::PATIENT_NAME).is_err());
        assert!(identifier.element(tags::SERIES_INSTANCE_UID).is_ok());
    }

    #[test]
    fn test_filter_unique_key_is_kept() {
        let model = StudyRootModel::new();
        let filter = Filter::new()
            .with_value(tags::STUDY_INSTANCE_UID, "9.9.9")
            .unwrap();
        let identifier = build_request_identifier(
            &model,
            &filter,
            &UniqueKeySet::new(),
            InformationEntity::Study,
        )
        .unwrap();
        assert_eq!(
            string_value(&identifier, tags::STUDY_INSTANCE_UID).as_deref(),
            Some("9.9.9")
        );
    }

    #[test]
    fn test_equipment_keys_reach_series_level() {
        let model = StudyRootModel::new();
        let filter = Filter::new()
            .with_keyword("InstitutionName=General Hospital")
            .unwrap()
            .with_keyword("PerformingPhysicianName=Doe")
            .unwrap();

        let study = build_request_identifier(
            &model,
            &filter,
            &UniqueKeySet::new(),
            InformationEntity::Study,
        )
        .unwrap();
        assert!(study.element(tags::INSTITUTION_NAME).is_err());

        let series = build_request_identifier(
            &model,
            &filter,
            &study_keys("1.2.3"),
            InformationEntity::Series,
        )
        .unwrap();
        assert_eq!(
            string_value(&series, tags::INSTITUTION_NAME).as_deref(),
            Some("General Hospital")
        );
        assert_eq!(
            string_value(&series, tags::PERFORMING_PHYSICIAN_NAME).as_deref(),
            Some("Doe")
        );
    }

    #[test]
    fn test_folded_level_is_a_configuration_error() {
        let model = StudyRootModel::new();
        let result = build_request_identifier(
            &model,
            &Filter::new(),
            &UniqueKeySet::new(),
            InformationEntity::Concatenation,
        );
        assert!(matches!(result, Err(QrError::Configuration(_))));
    }

    #[test]
    fn test_study_root_model_is_valid() {
        assert!(validate_model(&StudyRootModel::new()).is_ok());
        assert!(validate_model(&crate::patient_root::PatientRootModel::new()).is_ok());
    }
}
