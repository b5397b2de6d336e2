//! Patient root query/retrieve information model

use std::collections::HashMap;

use dicom_core::Tag;
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;

use crate::information_model::{
    describe_instance, describe_patient, describe_series, describe_study, InformationModel,
};
use crate::model::InformationEntity::{self, *};

/// Patient Root Query/Retrieve Information Model - FIND
pub const PATIENT_ROOT_FIND: &str = "1.2.840.10008.5.1.4.1.2.1.1";
/// Patient Root Query/Retrieve Information Model - MOVE
pub const PATIENT_ROOT_MOVE: &str = "1.2.840.10008.5.1.4.1.2.1.2";

/// Patient → Study → Series → Instance
#[derive(Debug, Clone)]
pub struct PatientRootModel {
    owners: HashMap<InformationEntity, Vec<InformationEntity>>,
}

impl PatientRootModel {
    pub fn new() -> Self {
        let owners = HashMap::from([
            (Patient, vec![Patient]),
            (Study, vec![Study]),
            (Series, vec![Series, ProcedureStep]),
            (Instance, vec![Instance, Concatenation]),
        ]);
        Self { owners }
    }
}

impl Default for PatientRootModel {
    fn default() -> Self {
        Self::new()
    }
}

impl InformationModel for PatientRootModel {
    fn name(&self) -> &'static str {
        "patient"
    }

    fn root_level(&self) -> InformationEntity {
        Patient
    }

    fn child_level(&self, entity: InformationEntity) -> Option<InformationEntity> {
        match entity {
            Patient => Some(Study),
            Study => Some(Series),
            Series => Some(Instance),
            _ => None,
        }
    }

    fn level_attribute_owners(&self, entity: InformationEntity) -> &[InformationEntity] {
        self.owners.get(&entity).map(Vec::as_slice).unwrap_or(&[])
    }

    fn unique_key_tag(&self, entity: InformationEntity) -> Option<Tag> {
        match entity {
            Patient => Some(tags::PATIENT_ID),
            Study => Some(tags::STUDY_INSTANCE_UID),
            Series => Some(tags::SERIES_INSTANCE_UID),
            Instance => Some(tags::SOP_INSTANCE_UID),
            _ => None,
        }
    }

    fn child_count_hint_tag(&self, entity: InformationEntity) -> Option<Tag> {
        match entity {
            Patient => Some(tags::NUMBER_OF_PATIENT_RELATED_STUDIES),
            Study => Some(tags::NUMBER_OF_STUDY_RELATED_SERIES),
            Series => Some(tags::NUMBER_OF_SERIES_RELATED_INSTANCES),
            _ => None,
        }
    }

    fn find_sop_class(&self) -> &'static str {
        PATIENT_ROOT_FIND
    }

    fn move_sop_class(&self) -> &'static str {
        PATIENT_ROOT_MOVE
    }

    fn render_label(&self, entity: InformationEntity, response: &InMemDicomObject) -> String {
        match entity {
            Patient => describe_patient(response),
            Study => describe_study(response),
            Series => describe_series(response),
            Instance => describe_instance(response),
            other => other.name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        let model = PatientRootModel::new();
        assert_eq!(model.levels(), vec![Patient, Study, Series, Instance]);
        assert_eq!(model.unique_key_tag(Patient), Some(tags::PATIENT_ID));
    }

    #[test]
    fn test_patient_attributes_stay_at_patient_level() {
        let model = PatientRootModel::new();
        assert_eq!(model.level_attribute_owners(Patient), &[Patient]);
        assert_eq!(model.level_attribute_owners(Study), &[Study]);
    }
}
