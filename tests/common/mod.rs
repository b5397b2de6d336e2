#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use qrbrowse::{AssociationService, Endpoint, MoveSummary, QrError, Result};

/// What the mock saw, shared with the test after the service is moved
#[derive(Debug, Default)]
pub struct Stats {
    pub opened: Vec<String>,
    pub released: usize,
    pub find_calls: usize,
    pub identifiers: Vec<InMemDicomObject>,
    pub move_requests: Vec<(InMemDicomObject, String)>,
}

/// One canned match: returned for queries at `level` whose identifier
/// carries `parent` (when set)
pub struct Scripted {
    pub level: &'static str,
    pub parent: Option<(Tag, String)>,
    pub response: InMemDicomObject,
}

/// Call-counting association service answering from a script
#[derive(Default)]
pub struct MockService {
    pub script: Vec<Scripted>,
    /// Query levels whose find requests fail
    pub failing_levels: Vec<&'static str>,
    pub fail_open: bool,
    pub fail_move: bool,
    next_association: u32,
    stats: Rc<RefCell<Stats>>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Rc<RefCell<Stats>> {
        Rc::clone(&self.stats)
    }

    pub fn respond(
        mut self,
        level: &'static str,
        parent: Option<(Tag, &str)>,
        response: InMemDicomObject,
    ) -> Self {
        self.script.push(Scripted {
            level,
            parent: parent.map(|(tag, value)| (tag, value.to_string())),
            response,
        });
        self
    }

    pub fn failing(mut self, level: &'static str) -> Self {
        self.failing_levels.push(level);
        self
    }
}

impl AssociationService for MockService {
    type Association = u32;

    fn open(&mut self, _endpoint: &Endpoint, sop_class_uid: &str) -> Result<u32> {
        if self.fail_open {
            return Err(QrError::transport("connection refused"));
        }
        self.stats.borrow_mut().opened.push(sop_class_uid.to_string());
        self.next_association += 1;
        Ok(self.next_association)
    }

    fn find(
        &mut self,
        _association: &mut u32,
        identifier: &InMemDicomObject,
        on_response: &mut dyn FnMut(InMemDicomObject),
    ) -> Result<usize> {
        {
            let mut stats = self.stats.borrow_mut();
            stats.find_calls += 1;
            stats.identifiers.push(identifier.clone());
        }

        let level = text(identifier, tags::QUERY_RETRIEVE_LEVEL).unwrap_or_default();
        if self.failing_levels.contains(&level.as_str()) {
            return Err(QrError::transport(format!("{} query failed", level)));
        }

        let mut matches = 0;
        for entry in &self.script {
            if entry.level != level {
                continue;
            }
            if let Some((tag, value)) = &entry.parent {
                if text(identifier, *tag).as_deref() != Some(value.as_str()) {
                    continue;
                }
            }
            on_response(entry.response.clone());
            matches += 1;
        }
        Ok(matches)
    }

    fn move_to(
        &mut self,
        _association: &mut u32,
        identifier: &InMemDicomObject,
        destination_aet: &str,
    ) -> Result<MoveSummary> {
        self.stats
            .borrow_mut()
            .move_requests
            .push((identifier.clone(), destination_aet.to_string()));
        if self.fail_move {
            return Err(QrError::transport("association aborted"));
        }
        Ok(MoveSummary {
            remaining: 0,
            completed: 3,
            failed: 0,
            warning: 0,
        })
    }

    fn release(&mut self, _association: u32) -> Result<()> {
        self.stats.borrow_mut().released += 1;
        Ok(())
    }
}

pub fn endpoint() -> Endpoint {
    Endpoint::new("127.0.0.1", 11112, "PACS", "QRBROWSE")
}

/// Dataset from (tag, vr, value) triples
pub fn dataset(elements: &[(Tag, VR, &str)]) -> InMemDicomObject {
    let mut object = InMemDicomObject::new_empty();
    for (tag, vr, value) in elements {
        object.put(DataElement::new(*tag, *vr, PrimitiveValue::from(*value)));
    }
    object
}

/// Trimmed string value of an attribute
pub fn text(object: &InMemDicomObject, tag: Tag) -> Option<String> {
    qrbrowse::attributes::string_value(object, tag)
}

pub fn study(uid: &str, hint: Option<&str>) -> InMemDicomObject {
    let mut object = dataset(&[
        (tags::PATIENT_NAME, VR::PN, "Smith^Mary"),
        (tags::PATIENT_ID, VR::LO, "P001"),
        (tags::STUDY_DATE, VR::DA, "20240102"),
        (tags::STUDY_ID, VR::SH, "42"),
        (tags::STUDY_INSTANCE_UID, VR::UI, uid),
    ]);
    if let Some(hint) = hint {
        object.put(DataElement::new(
            tags::NUMBER_OF_STUDY_RELATED_SERIES,
            VR::IS,
            PrimitiveValue::from(hint),
        ));
    }
    object
}

pub fn series(uid: &str, number: &str) -> InMemDicomObject {
    dataset(&[
        (tags::SERIES_INSTANCE_UID, VR::UI, uid),
        (tags::SERIES_NUMBER, VR::IS, number),
        (tags::MODALITY, VR::CS, "CT"),
    ])
}

pub fn image(uid: &str, number: &str) -> InMemDicomObject {
    dataset(&[
        (tags::SOP_CLASS_UID, VR::UI, "1.2.840.10008.5.1.4.1.1.2"),
        (tags::SOP_INSTANCE_UID, VR::UI, uid),
        (tags::INSTANCE_NUMBER, VR::IS, number),
    ])
}

/// One study "S1" announcing two series, "Ser1" holding three images
pub fn scripted_archive() -> MockService {
    MockService::new()
        .respond("STUDY", None, study("S1", Some("2")))
        .respond("SERIES", Some((tags::STUDY_INSTANCE_UID, "S1")), series("Ser1", "1"))
        .respond("SERIES", Some((tags::STUDY_INSTANCE_UID, "S1")), series("Ser2", "2"))
        .respond("IMAGE", Some((tags::SERIES_INSTANCE_UID, "Ser1")), image("I3", "3"))
        .respond("IMAGE", Some((tags::SERIES_INSTANCE_UID, "Ser1")), image("I1", "1"))
        .respond("IMAGE", Some((tags::SERIES_INSTANCE_UID, "Ser1")), image("I2", "2"))
}
