//! Study root query/retrieve information model

use std::collections::HashMap;

use dicom_core::Tag;
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;

use crate::information_model::{
    describe_instance, describe_patient, describe_series, describe_study, join_label,
    InformationModel,
};
use crate::model::InformationEntity::{self, *};

/// Study Root Query/Retrieve Information Model - FIND
pub const STUDY_ROOT_FIND: &str = "1.2.840.10008.5.1.4.1.2.2.1";
/// Study Root Query/Retrieve Information Model - MOVE
pub const STUDY_ROOT_MOVE: &str = "1.2.840.10008.5.1.4.1.2.2.2";

/// Study → Series → Instance, with patient attributes riding on the study level
#[derive(Debug, Clone)]
pub struct StudyRootModel {
    owners: HashMap<InformationEntity, Vec<InformationEntity>>,
}

impl StudyRootModel {
    pub fn new() -> Self {
        let owners = HashMap::from([
            (Study, vec![Patient, Study]),
            (Series, vec![Series, ProcedureStep]),
            (Instance, vec![Instance, Concatenation]),
        ]);
        Self { owners }
    }
}

impl Default for StudyRootModel {
    fn default() -> Self {
        Self::new()
    }
}

impl InformationModel for StudyRootModel {
    fn name(&self) -> &'static str {
        "study"
    }

    fn root_level(&self) -> InformationEntity {
        Study
    }

    fn child_level(&self, entity: InformationEntity) -> Option<InformationEntity> {
        match entity {
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
            Study => Some(tags::STUDY_INSTANCE_UID),
            Series => Some(tags::SERIES_INSTANCE_UID),
            Instance => Some(tags::SOP_INSTANCE_UID),
            _ => None,
        }
    }

    fn child_count_hint_tag(&self, entity: InformationEntity) -> Option<Tag> {
        match entity {
            Study => Some(tags::NUMBER_OF_STUDY_RELATED_SERIES),
            Series => Some(tags::NUMBER_OF_SERIES_RELATED_INSTANCES),
            _ => None,
        }
    }

    fn find_sop_class(&self) -> &'static str {
        STUDY_ROOT_FIND
    }

    fn move_sop_class(&self) -> &'static str {
        STUDY_ROOT_MOVE
    }

    fn render_label(&self, entity: InformationEntity, response: &InMemDicomObject) -> String {
        match entity {
            Study => join_label([
                Some(describe_patient(response).as_str()),
                Some(describe_study(response).as_str()),
            ]),
            Series => describe_series(response),
            Instance => describe_instance(response),
            other => other.name().to_string(),
        }
    }
}
