//! Attribute dictionary lookups used by the query model.
//!
//! Value representations come from the standard data dictionary. The
//! owning information entity of each attribute is not part of that
//! dictionary, so it is kept here for the attributes that are meaningful
//! as query or return keys.

use std::collections::HashMap;

use dicom_core::dictionary::{DataDictionary, VirtualVr};
use dicom_core::{Tag, VR};
use dicom_dictionary_std::{tags, StandardDataDictionary};
use dicom_object::InMemDicomObject;
use once_cell::sync::Lazy;

use crate::model::InformationEntity;

use InformationEntity::*;

static OWNERS: Lazy<HashMap<Tag, InformationEntity>> = Lazy::new(|| {
    [
        // Patient
        (Tag(0x0010, 0x0010), Patient), // Patient's Name
        (Tag(0x0010, 0x0020), Patient), // Patient ID
        (Tag(0x0010, 0x0021), Patient), // Issuer of Patient ID
        (Tag(0x0010, 0x0030), Patient), // Patient's Birth Date
        (Tag(0x0010, 0x0032), Patient), // Patient's Birth Time
        (Tag(0x0010, 0x0040), Patient), // Patient's Sex
        (Tag(0x0010, 0x1000), Patient), // Other Patient IDs
        (Tag(0x0010, 0x1001), Patient), // Other Patient Names
        (Tag(0x0010, 0x2160), Patient), // Ethnic Group
        (Tag(0x0010, 0x4000), Patient), // Patient Comments
        (Tag(0x0020, 0x1200), Patient), // Number of Patient Related Studies
        (Tag(0x0020, 0x1202), Patient), // Number of Patient Related Series
        (Tag(0x0020, 0x1204), Patient), // Number of Patient Related Instances
        // Study
        (Tag(0x0008, 0x0020), Study), // Study Date
        (Tag(0x0008, 0x0030), Study), // Study Time
        (Tag(0x0008, 0x0050), Study), // Accession Number
        (Tag(0x0008, 0x0061), Study), // Modalities in Study
        (Tag(0x0008, 0x0062), Study), // SOP Classes in Study
        (Tag(0x0008, 0x0090), Study), // Referring Physician's Name
        (Tag(0x0008, 0x1030), Study), // Study Description
        (Tag(0x0008, 0x1060), Study), // Name of Physician(s) Reading Study
        (Tag(0x0008, 0x1080), Study), // Admitting Diagnoses Description
        (Tag(0x0010, 0x1010), Study), // Patient's Age
        (Tag(0x0010, 0x1020), Study), // Patient's Size
        (Tag(0x0010, 0x1030), Study), // Patient's Weight
        (Tag(0x0020, 0x000D), Study), // Study Instance UID
        (Tag(0x0020, 0x0010), Study), // Study ID
        (Tag(0x0020, 0x1070), Study), // Other Study Numbers
        (Tag(0x0032, 0x1032), Study), // Requesting Physician
        (Tag(0x0032, 0x1060), Study), // Requested Procedure Description
        (Tag(0x0020, 0x1206), Study), // Number of Study Related Series
        (Tag(0x0020, 0x1208), Study), // Number of Study Related Instances
        // Procedure step
        (Tag(0x0040, 0x0244), ProcedureStep), // Performed Procedure Step Start Date
        (Tag(0x0040, 0x0245), ProcedureStep), // Performed Procedure Step Start Time
        (Tag(0x0040, 0x0253), ProcedureStep), // Performed Procedure Step ID
        (Tag(0x0040, 0x0254), ProcedureStep), // Performed Procedure Step Description
        (Tag(0x0040, 0x0275), ProcedureStep), // Request Attributes Sequence
        // Series (equipment attributes fold in here)
        (Tag(0x0008, 0x0021), Series), // Series Date
        (Tag(0x0008, 0x0031), Series), // Series Time
        (Tag(0x0008, 0x0060), Series), // Modality
        (Tag(0x0008, 0x0070), Series), // Manufacturer
        (Tag(0x0008, 0x0080), Series), // Institution Name
        (Tag(0x0008, 0x1010), Series), // Station Name
        (Tag(0x0008, 0x1040), Series), // Institutional Department Name
        (Tag(0x0008, 0x1050), Series), // Performing Physician's Name
        (Tag(0x0008, 0x1070), Series), // Operators' Name
        (Tag(0x0008, 0x103E), Series), // Series Description
        (Tag(0x0008, 0x1090), Series), // Manufacturer's Model Name
        (Tag(0x0018, 0x0015), Series), // Body Part Examined
        (Tag(0x0018, 0x1000), Series), // Device Serial Number
        (Tag(0x0018, 0x1030), Series), // Protocol Name
        (Tag(0x0018, 0x5100), Series), // Patient Position
        (Tag(0x0020, 0x000E), Series), // Series Instance UID
        (Tag(0x0020, 0x0011), Series), // Series Number
        (Tag(0x0020, 0x0060), Series), // Laterality
        (Tag(0x0020, 0x1209), Series), // Number of Series Related Instances
        // Concatenation
        (Tag(0x0020, 0x9161), Concatenation), // Concatenation UID
        (Tag(0x0020, 0x9162), Concatenation), // In-concatenation Number
        (Tag(0x0020, 0x9163), Concatenation), // In-concatenation Total Number
        // Instance
        (Tag(0x0008, 0x0008), Instance), // Image Type
        (Tag(0x0008, 0x0016), Instance), // SOP Class UID
        (Tag(0x0008, 0x0018), Instance), // SOP Instance UID
        (Tag(0x0008, 0x0022), Instance), // Acquisition Date
        (Tag(0x0008, 0x0023), Instance), // Content Date
        (Tag(0x0008, 0x0032), Instance), // Acquisition Time
        (Tag(0x0008, 0x0033), Instance), // Content Time
        (Tag(0x0020, 0x0012), Instance), // Acquisition Number
        (Tag(0x0020, 0x0013), Instance), // Instance Number
        (Tag(0x0020, 0x1041), Instance), // Slice Location
        (Tag(0x0028, 0x0008), Instance), // Number of Frames
        (Tag(0x0028, 0x0010), Instance), // Rows
        (Tag(0x0028, 0x0011), Instance), // Columns
        (Tag(0x0040, 0xA491), Instance), // Completion Flag
        (Tag(0x0040, 0xA493), Instance), // Verification Flag
        (Tag(0x0042, 0x0010), Instance), // Document Title
        (Tag(0x0070, 0x0080), Instance), // Content Label
    ]
    .into_iter()
    .collect()
});

/// The information entity an attribute belongs to, if known
pub fn owning_entity(tag: Tag) -> Option<InformationEntity> {
    OWNERS.get(&tag).copied()
}

/// Whether `tag` can travel in a request identifier: it belongs to a known
/// entity, or it is the character set
pub fn is_query_key(tag: Tag) -> bool {
    tag == tags::SPECIFIC_CHARACTER_SET || owning_entity(tag).is_some()
}

/// Value representation declared by the standard dictionary.
///
/// Tags whose representation depends on context (US or SS, OB or OW, ...)
/// have no single declared type and yield `None`.
pub fn declared_vr(tag: Tag) -> Option<VR> {
    match StandardDataDictionary.by_tag(tag)?.vr {
        VirtualVr::Exact(vr) => Some(vr),
        _ => None,
    }
}

/// Resolve a keyword (`PatientName`), a `(0010,0010)` form or `00100010`
pub fn parse_tag(text: &str) -> Option<Tag> {
    StandardDataDictionary.parse_tag(text.trim())
}

/// Trimmed, non-empty string value of an attribute
pub fn string_value(object: &InMemDicomObject, tag: Tag) -> Option<String> {
    object
        .element(tag)
        .ok()
        .and_then(|element| element.to_str().ok())
        .map(|value| value.trim_matches(|c: char| c == ' ' || c == '\0').to_string())
        .filter(|value| !value.is_empty())
}
