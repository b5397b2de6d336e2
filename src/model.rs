//! Core data types of the hierarchical query/retrieve information model

use std::collections::BTreeMap;
use std::fmt;

use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use dimse::QueryLevel;

/// One level of the query/retrieve hierarchy.
///
/// Variants are declared top-down, so the derived ordering follows the
/// hierarchy. `ProcedureStep` and `Concatenation` never form a query level of
/// their own; their attributes ride along with an adjacent level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InformationEntity {
    Patient,
    Study,
    ProcedureStep,
    Series,
    Concatenation,
    Instance,
}

impl InformationEntity {
    /// Human readable name, used as a label prefix
    pub fn name(self) -> &'static str {
        match self {
            InformationEntity::Patient => "Patient",
            InformationEntity::Study => "Study",
            InformationEntity::ProcedureStep => "Procedure Step",
            InformationEntity::Series => "Series",
            InformationEntity::Concatenation => "Concatenation",
            InformationEntity::Instance => "Instance",
        }
    }

    /// Value of the Query/Retrieve Level attribute for this entity, if it is queryable
    pub fn query_level(self) -> Option<QueryLevel> {
        match self {
            InformationEntity::Patient => Some(QueryLevel::Patient),
            InformationEntity::Study => Some(QueryLevel::Study),
            InformationEntity::Series => Some(QueryLevel::Series),
            InformationEntity::Instance => Some(QueryLevel::Image),
            InformationEntity::ProcedureStep | InformationEntity::Concatenation => None,
        }
    }
}

impl fmt::Display for InformationEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The unique-identifying attribute value of one level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    pub tag: Tag,
    pub vr: VR,
    pub value: String,
}

/// Unique keys of a node and all its ancestors, ordered top-down
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniqueKeySet {
    keys: BTreeMap<InformationEntity, UniqueKey>,
}

impl UniqueKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of this set extended with one more level
    pub fn with(&self, entity: InformationEntity, key: UniqueKey) -> Self {
        let mut keys = self.keys.clone();
        keys.insert(entity, key);
        Self { keys }
    }

    /// Add or replace the key of `entity`
    pub fn insert(&mut self, entity: InformationEntity, key: UniqueKey) {
        self.keys.insert(entity, key);
    }

    /// Value of the unique key at `entity`
    pub fn get(&self, entity: InformationEntity) -> Option<&str> {
        self.keys.get(&entity).map(|k| k.value.as_str())
    }

    pub fn key(&self, entity: InformationEntity) -> Option<&UniqueKey> {
        self.keys.get(&entity)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in hierarchy order
    pub fn iter(&self) -> impl Iterator<Item = (InformationEntity, &UniqueKey)> {
        self.keys.iter().map(|(e, k)| (*e, k))
    }

    /// The lowest level covered by this set
    pub fn deepest(&self) -> Option<(InformationEntity, &UniqueKey)> {
        self.keys.iter().next_back().map(|(e, k)| (*e, k))
    }

    /// Entity/value pairs, convenient for comparisons
    pub fn values(&self) -> Vec<(InformationEntity, &str)> {
        self.iter().map(|(e, k)| (e, k.value.as_str())).collect()
    }

    /// Write every key into `identifier`, replacing existing values
    pub fn merge_into(&self, identifier: &mut InMemDicomObject) {
        for (_, key) in self.iter() {
            identifier.put(DataElement::new(
                key.tag,
                key.vr,
                PrimitiveValue::from(key.value.as_str()),
            ));
        }
    }

    /// Identifier selecting exactly the record these keys point at,
    /// as used by move requests
    pub fn to_identifier(&self) -> Option<InMemDicomObject> {
        let (entity, _) = self.deepest()?;
        let level = entity.query_level()?;
        let mut identifier = InMemDicomObject::new_empty();
        identifier.put(DataElement::new(
            tags::QUERY_RETRIEVE_LEVEL,
            VR::CS,
            PrimitiveValue::from(level.to_string()),
        ));
        self.merge_into(&mut identifier);
        Some(identifier)
    }
}

impl fmt::Display for UniqueKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (entity, key) in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", entity, key.value)?;
            first = false;
        }
        Ok(())
    }
}

/// One response of the remote peer at one level
#[derive(Debug, Clone)]
pub struct ResponseRecord {
    /// Level the response was returned for
    pub entity: InformationEntity,
    /// Attributes as returned by the peer, unfiltered
    pub attributes: InMemDicomObject,
    /// Display label, also the primary sort key
    pub label: String,
    /// Number of children announced inline by the peer
    pub child_count_hint: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::header::Header;

    fn uid(tag: Tag, value: &str) -> UniqueKey {
        UniqueKey {
            tag,
            vr: VR::UI,
            value: value.to_string(),
        }
    }

    #[test]
    fn test_hierarchy_order() {
        assert!(InformationEntity::Patient < InformationEntity::Study);
        assert!(InformationEntity::Study < InformationEntity::Series);
        assert!(InformationEntity::Series < InformationEntity::Instance);
        assert!(InformationEntity::Concatenation < InformationEntity::Instance);
    }

    #[test]
    fn test_folded_entities_have_no_level() {
        assert_eq!(InformationEntity::ProcedureStep.query_level(), None);
        assert_eq!(InformationEntity::Concatenation.query_level(), None);
        assert_eq!(
            InformationEntity::Instance.query_level(),
            Some(QueryLevel::Image)
        );
    }

    #[test]
    fn test_unique_key_set_grows_by_one() {
        let root = UniqueKeySet::new();
        let study = root.with(
            InformationEntity::Study,
            uid(tags::STUDY_INSTANCE_UID, "1.2.3"),
        );
        let series = study.with(
            InformationEntity::Series,
            uid(tags::SERIES_INSTANCE_UID, "1.2.3.4"),
        );

        assert!(root.is_empty());
        assert_eq!(study.len(), 1);
        assert_eq!(series.len(), 2);
        assert_eq!(
            series.values(),
            vec![
                (InformationEntity::Study, "1.2.3"),
                (InformationEntity::Series, "1.2.3.4")
            ]
        );
        assert_eq!(series.deepest().map(|(e, _)| e), Some(InformationEntity::Series));
        assert_eq!(series.to_string(), "Study=1.2.3, Series=1.2.3.4");
    }

    #[test]
    fn test_to_identifier_uses_deepest_level() {
        let keys = UniqueKeySet::new()
            .with(InformationEntity::Study, uid(tags::STUDY_INSTANCE_UID, "1.2"))
            .with(InformationEntity::Series, uid(tags::SERIES_INSTANCE_UID, "1.2.5"));
        let identifier = keys.to_identifier().expect("identifier");

        let level = identifier
            .element(tags::QUERY_RETRIEVE_LEVEL)
            .unwrap()
            .to_str()
            .unwrap()
            .trim()
            .to_string();
        assert_eq!(level, "SERIES");
        let study = identifier.element(tags::STUDY_INSTANCE_UID).unwrap();
        assert_eq!(study.vr(), VR::UI);
        assert!(UniqueKeySet::new().to_identifier().is_none());
    }
}
