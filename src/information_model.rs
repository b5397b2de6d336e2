//! Policy hooks a query/retrieve information model variant supplies

use std::collections::BTreeSet;

use dicom_core::Tag;
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;

use crate::attributes::string_value;
use crate::model::InformationEntity;

/// Per-level policy of one hierarchy variant (study root, patient root, ...).
///
/// The query model and the result tree only ever talk to a variant through
/// this trait.
pub trait InformationModel {
    /// Short name used in logs and configuration
    fn name(&self) -> &'static str;

    /// Top level of the hierarchy
    fn root_level(&self) -> InformationEntity;

    /// Next level down, or `None` for a leaf level
    fn child_level(&self, entity: InformationEntity) -> Option<InformationEntity>;

    /// Entities whose attributes are echoed when querying at `entity`
    fn level_attribute_owners(&self, entity: InformationEntity) -> &[InformationEntity];

    /// The single attribute identifying a record at `entity`
    fn unique_key_tag(&self, entity: InformationEntity) -> Option<Tag>;

    /// Attribute carrying the number of children of a record at `entity`
    fn child_count_hint_tag(&self, entity: InformationEntity) -> Option<Tag>;

    /// SOP class of the search operation
    fn find_sop_class(&self) -> &'static str;

    /// SOP class of the retrieval operation
    fn move_sop_class(&self) -> &'static str;

    /// Sortable display label of a response at `entity`
    fn render_label(&self, entity: InformationEntity, response: &InMemDicomObject) -> String;

    /// Query levels from the root down to the leaf
    fn levels(&self) -> Vec<InformationEntity> {
        let mut levels = vec![self.root_level()];
        while let Some(next) = levels.last().and_then(|&l| self.child_level(l)) {
            // a cyclic table would never terminate
            if levels.contains(&next) {
                break;
            }
            levels.push(next);
        }
        levels
    }

    /// Every entity whose attributes can appear in some level's request
    fn reachable_entities(&self) -> BTreeSet<InformationEntity> {
        self.levels()
            .into_iter()
            .flat_map(|level| self.level_attribute_owners(level).to_vec())
            .collect()
    }
}

const SOP_CLASS_ROOT: &str = "1.2.840.10008.5.1.4.1.1.";

const IMAGE_STORAGE_CLASSES: &[&str] = &[
    "1.2.840.10008.5.1.4.1.1.1",        // CR
    "1.2.840.10008.5.1.4.1.1.1.1",      // DX for presentation
    "1.2.840.10008.5.1.4.1.1.1.1.1",    // DX for processing
    "1.2.840.10008.5.1.4.1.1.1.2",      // MG for presentation
    "1.2.840.10008.5.1.4.1.1.1.2.1",    // MG for processing
    "1.2.840.10008.5.1.4.1.1.1.3",      // IO for presentation
    "1.2.840.10008.5.1.4.1.1.1.3.1",    // IO for processing
    "1.2.840.10008.5.1.4.1.1.2",        // CT
    "1.2.840.10008.5.1.4.1.1.2.1",      // Enhanced CT
    "1.2.840.10008.5.1.4.1.1.3.1",      // US multi-frame
    "1.2.840.10008.5.1.4.1.1.4",        // MR
    "1.2.840.10008.5.1.4.1.1.4.1",      // Enhanced MR
    "1.2.840.10008.5.1.4.1.1.6.1",      // US
    "1.2.840.10008.5.1.4.1.1.6.2",      // Enhanced US volume
    "1.2.840.10008.5.1.4.1.1.7",        // Secondary capture
    "1.2.840.10008.5.1.4.1.1.7.1",      // Multi-frame single bit SC
    "1.2.840.10008.5.1.4.1.1.7.2",      // Multi-frame grayscale byte SC
    "1.2.840.10008.5.1.4.1.1.7.3",      // Multi-frame grayscale word SC
    "1.2.840.10008.5.1.4.1.1.7.4",      // Multi-frame true color SC
    "1.2.840.10008.5.1.4.1.1.12.1",     // XA
    "1.2.840.10008.5.1.4.1.1.12.1.1",   // Enhanced XA
    "1.2.840.10008.5.1.4.1.1.12.2",     // RF
    "1.2.840.10008.5.1.4.1.1.12.2.1",   // Enhanced RF
    "1.2.840.10008.5.1.4.1.1.13.1.3",   // Breast tomosynthesis
    "1.2.840.10008.5.1.4.1.1.20",       // NM
    "1.2.840.10008.5.1.4.1.1.77.1.1",   // VL endoscopic
    "1.2.840.10008.5.1.4.1.1.77.1.2",   // VL microscopic
    "1.2.840.10008.5.1.4.1.1.77.1.4",   // VL photographic
    "1.2.840.10008.5.1.4.1.1.77.1.5.1", // Ophthalmic 8 bit
    "1.2.840.10008.5.1.4.1.1.77.1.5.2", // Ophthalmic 16 bit
    "1.2.840.10008.5.1.4.1.1.77.1.6",   // VL whole slide microscopy
    "1.2.840.10008.5.1.4.1.1.128",      // PET
    "1.2.840.10008.5.1.4.1.1.130",      // Enhanced PET
    "1.2.840.10008.5.1.4.1.1.481.1",    // RT image
];

/// Friendlier category name for an instance's SOP class
pub fn instance_category(sop_class_uid: &str) -> Option<&'static str> {
    let uid = sop_class_uid.trim_end_matches(|c: char| c == '\0' || c == ' ');
    let suffix = uid.strip_prefix(SOP_CLASS_ROOT)?;

    if IMAGE_STORAGE_CLASSES.contains(&uid) {
        Some("Image")
    } else if suffix.starts_with("88.") {
        Some("SR Document")
    } else if suffix.starts_with("9.") {
        Some("Waveform")
    } else if suffix == "4.2" {
        Some("Spectra")
    } else if suffix == "66" {
        Some("Raw Data")
    } else {
        None
    }
}

/// Join the non-empty parts with single spaces
pub(crate) fn join_label<'a>(parts: impl IntoIterator<Item = Option<&'a str>>) -> String {
    parts
        .into_iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// "Patient <name> <id>"
pub(crate) fn describe_patient(response: &InMemDicomObject) -> String {
    let name = string_value(response, tags::PATIENT_NAME);
    let id = string_value(response, tags::PATIENT_ID);
    join_label([Some("Patient"), name.as_deref(), id.as_deref()])
}

/// "Study <date> <id> <description>"
pub(crate) fn describe_study(response: &InMemDicomObject) -> String {
    let date = string_value(response, tags::STUDY_DATE);
    let id = string_value(response, tags::STUDY_ID);
    let description = string_value(response, tags::STUDY_DESCRIPTION);
    join_label([
        Some("Study"),
        date.as_deref(),
        id.as_deref(),
        description.as_deref(),
    ])
}

/// "Series <number> <modality> <description>"
pub(crate) fn describe_series(response: &InMemDicomObject) -> String {
    let number = string_value(response, tags::SERIES_NUMBER);
    let modality = string_value(response, tags::MODALITY);
    let description = string_value(response, tags::SERIES_DESCRIPTION);
    join_label([
        Some(InformationEntity::Series.name()),
        number.as_deref(),
        modality.as_deref(),
        description.as_deref(),
    ])
}

/// "<category> <number> <descriptor>" where the category comes from the SOP class
pub(crate) fn describe_instance(response: &InMemDicomObject) -> String {
    let category = string_value(response, tags::SOP_CLASS_UID)
        .and_then(|uid| instance_category(&uid))
        .unwrap_or(InformationEntity::Instance.name());
    let number = string_value(response, tags::INSTANCE_NUMBER);
    let descriptor = match category {
        "Image" => string_value(response, tags::IMAGE_TYPE),
        _ => string_value(response, tags::CONTENT_LABEL)
            .or_else(|| string_value(response, tags::DOCUMENT_TITLE)),
    };
    join_label([Some(category), number.as_deref(), descriptor.as_deref()])
}
