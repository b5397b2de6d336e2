//! Caller supplied matching and return keys spanning every level of a query

use dicom_core::header::Header;
use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
use dicom_dictionary_std::tags;
use dicom_object::mem::InMemElement;
use dicom_object::InMemDicomObject;

use crate::attributes;
use crate::information_model::InformationModel;
use crate::{QrError, Result};

/// Return keys requested when the caller does not name any
const DEFAULT_RETURN_KEYS: &[(Tag, VR)] = &[
    (tags::PATIENT_NAME, VR::PN),
    (tags::PATIENT_ID, VR::LO),
    (tags::PATIENT_BIRTH_DATE, VR::DA),
    (tags::PATIENT_SEX, VR::CS),
    (tags::STUDY_DATE, VR::DA),
    (tags::STUDY_TIME, VR::TM),
    (tags::ACCESSION_NUMBER, VR::SH),
    (tags::STUDY_ID, VR::SH),
    (tags::STUDY_DESCRIPTION, VR::LO),
    (tags::STUDY_INSTANCE_UID, VR::UI),
    (tags::NUMBER_OF_STUDY_RELATED_SERIES, VR::IS),
    (tags::MODALITY, VR::CS),
    (tags::SERIES_NUMBER, VR::IS),
    (tags::SERIES_DESCRIPTION, VR::LO),
    (tags::SERIES_INSTANCE_UID, VR::UI),
    (tags::NUMBER_OF_SERIES_RELATED_INSTANCES, VR::IS),
    (tags::INSTANCE_NUMBER, VR::IS),
    (tags::SOP_CLASS_UID, VR::UI),
    (tags::SOP_INSTANCE_UID, VR::UI),
    (tags::IMAGE_TYPE, VR::CS),
    (Tag(0x0020, 0x9161), VR::UI), // Concatenation UID
];

/// Attribute filter for one hierarchical query session.
///
/// Built up front and never changed while a tree is being browsed; every
/// level's request identifier is derived from it.
#[derive(Debug, Clone)]
pub struct Filter {
    object: InMemDicomObject,
}

impl Default for Filter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter {
    /// An empty filter
    pub fn new() -> Self {
        Self {
            object: InMemDicomObject::new_empty(),
        }
    }

    /// Wrap an already built identifier
    pub fn from_object(object: InMemDicomObject) -> Self {
        Self { object }
    }

    /// Conventional return keys for every level the model can reach
    pub fn default_for<M: InformationModel + ?Sized>(model: &M) -> Self {
        let reachable = model.reachable_entities();
        let mut filter = Self::new();
        for &(tag, vr) in DEFAULT_RETURN_KEYS {
            if attributes::owning_entity(tag).is_some_and(|owner| reachable.contains(&owner)) {
                filter
                    .object
                    .put(DataElement::new(tag, vr, PrimitiveValue::Empty));
            }
        }
        filter
    }

    /// Add a matching key; the value type comes from the standard dictionary.
    ///
    /// Tags that no query level carries are rejected.
    pub fn with_value(mut self, tag: Tag, value: &str) -> Result<Self> {
        let vr = key_vr(tag)?;
        self.object
            .put(DataElement::new(tag, vr, PrimitiveValue::from(value)));
        Ok(self)
    }

    /// Add an empty return key
    pub fn with_return_key(mut self, tag: Tag) -> Result<Self> {
        let vr = key_vr(tag)?;
        self.object
            .put(DataElement::new(tag, vr, PrimitiveValue::Empty));
        Ok(self)
    }

    /// Add a key given as `Keyword` or `Keyword=value`
    pub fn with_keyword(self, key: &str) -> Result<Self> {
        let (keyword, value) = match key.split_once('=') {
            Some((k, v)) => (k, Some(v)),
            None => (key, None),
        };
        let tag = attributes::parse_tag(keyword)
            .ok_or_else(|| QrError::InvalidFilter(format!("unknown attribute '{}'", keyword)))?;
        match value {
            Some(v) if !v.is_empty() => self.with_value(tag, v),
            _ => self.with_return_key(tag),
        }
    }

    /// Add an element as is
    pub fn with_element(mut self, element: InMemElement) -> Self {
        self.object.put(element);
        self
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.object.element(tag).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InMemElement> {
        self.object.iter()
    }

    /// Tags present in the filter, in ascending order
    pub fn tags(&self) -> Vec<Tag> {
        self.object.iter().map(|e| e.tag()).collect()
    }

    pub fn as_object(&self) -> &InMemDicomObject {
        &self.object
    }
}

fn key_vr(tag: Tag) -> Result<VR> {
    if !attributes::is_query_key(tag) {
        return Err(QrError::InvalidFilter(format!(
            "{} is not a query/retrieve key of any level",
            tag
        )));
    }
    attributes::declared_vr(tag)
        .ok_or_else(|| QrError::InvalidFilter(format!("no value representation known for {}", tag)))
}
