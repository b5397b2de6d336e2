mod common;

use common::{scripted_archive, text, MockService};
use dicom_core::VR;
use dicom_dictionary_std::tags;
use qrbrowse::study_root::{STUDY_ROOT_FIND, STUDY_ROOT_MOVE};
use qrbrowse::{
    AssociationMode, Endpoint, Filter, InformationEntity, QrError, QueryModel, StudyRootModel,
    UniqueKey, UniqueKeySet,
};

fn query_model(
    service: MockService,
    mode: AssociationMode,
) -> QueryModel<StudyRootModel, MockService> {
    QueryModel::new(StudyRootModel::new(), service, common::endpoint(), mode).unwrap()
}

fn keys(study: &str, series: Option<&str>) -> UniqueKeySet {
    let mut keys = UniqueKeySet::new();
    keys.insert(
        InformationEntity::Study,
        UniqueKey {
            tag: tags::STUDY_INSTANCE_UID,
            vr: VR::UI,
            value: study.to_string(),
        },
    );
    if let Some(series) = series {
        keys.insert(
            InformationEntity::Series,
            UniqueKey {
                tag: tags::SERIES_INSTANCE_UID,
                vr: VR::UI,
                value: series.to_string(),
            },
        );
    }
    keys
}

#[test]
fn test_transient_associations_wrap_each_call() {
    let service = scripted_archive();
    let stats = service.stats();
    let mut model = query_model(service, AssociationMode::Transient);
    assert!(stats.borrow().opened.is_empty());

    let mut tree = model.perform_hierarchical_query(Filter::new());
    let study = tree.child_at(tree.root(), 0).unwrap();
    tree.child_at(study, 0).unwrap();

    let stats = stats.borrow();
    assert_eq!(stats.find_calls, 2);
    assert_eq!(stats.opened, vec![STUDY_ROOT_FIND, STUDY_ROOT_FIND]);
    assert_eq!(stats.released, 2);
}

#[test]
fn test_reused_associations_stay_open() {
    let service = scripted_archive();
    let stats = service.stats();
    let mut model = query_model(service, AssociationMode::Reuse);
    assert_eq!(stats.borrow().opened, vec![STUDY_ROOT_FIND, STUDY_ROOT_MOVE]);
    assert!(model.holds_associations());

    {
        let mut tree = model.perform_hierarchical_query(Filter::new());
        let study = tree.child_at(tree.root(), 0).unwrap();
        let series = tree.child_at(study, 0).unwrap();
        assert_eq!(tree.child_count(series), 3);
    }
    model.perform_hierarchical_move(&keys("S1", None), "STORESCP").unwrap();

    assert_eq!(stats.borrow().find_calls, 3);
    assert_eq!(stats.borrow().opened.len(), 2);
    assert_eq!(stats.borrow().released, 0);

    model.release_associations();
    assert!(!model.holds_associations());
    assert_eq!(stats.borrow().released, 2);

    // released associations are reopened on demand
    model.perform_hierarchical_move(&keys("S1", None), "STORESCP").unwrap();
    assert_eq!(stats.borrow().opened.len(), 3);
}

#[test]
fn test_dropping_the_model_releases_associations() {
    let service = MockService::new();
    let stats = service.stats();
    let model = query_model(service, AssociationMode::Reuse);
    drop(model);
    assert_eq!(stats.borrow().released, 2);
}

#[test]
fn test_failed_reused_association_is_replaced() {
    let service = scripted_archive().failing("SERIES");
    let stats = service.stats();
    let mut model = query_model(service, AssociationMode::Reuse);

    let mut tree = model.perform_hierarchical_query(Filter::new());
    let study = tree.child_at(tree.root(), 0).unwrap();
    assert!(tree.child_at(study, 0).is_none());

    // the failed find association was released and not cached again
    assert_eq!(stats.borrow().released, 1);

    tree.query_model_mut().service_mut().failing_levels.clear();
    assert!(tree.retry_population(study));
    assert_eq!(tree.children(study).len(), 2);
    assert_eq!(
        stats.borrow().opened,
        vec![STUDY_ROOT_FIND, STUDY_ROOT_MOVE, STUDY_ROOT_FIND]
    );
}

#[test]
fn test_open_failure_in_reuse_mode() {
    let mut service = MockService::new();
    service.fail_open = true;
    let result = QueryModel::new(
        StudyRootModel::new(),
        service,
        common::endpoint(),
        AssociationMode::Reuse,
    );
    assert!(matches!(result, Err(QrError::Transport(_))));
}

#[test]
fn test_invalid_endpoint_is_rejected_before_opening() {
    let service = MockService::new();
    let stats = service.stats();
    let result = QueryModel::new(
        StudyRootModel::new(),
        service,
        Endpoint::new("127.0.0.1", 11112, "", "QRBROWSE"),
        AssociationMode::Reuse,
    );
    assert!(matches!(result, Err(QrError::Association(_))));
    assert!(stats.borrow().opened.is_empty());
}

#[test]
fn test_hierarchical_move() {
    let service = MockService::new();
    let stats = service.stats();
    let mut model = query_model(service, AssociationMode::Transient);

    let summary = model
        .perform_hierarchical_move(&keys("S1", Some("Ser1")), "STORESCP")
        .unwrap();
    assert_eq!(summary.completed, 3);
    assert_eq!(summary.failed, 0);

    let stats = stats.borrow();
    assert_eq!(stats.opened, vec![STUDY_ROOT_MOVE]);
    assert_eq!(stats.released, 1);
    let (identifier, destination) = &stats.move_requests[0];
    assert_eq!(destination, "STORESCP");
    assert_eq!(text(identifier, tags::QUERY_RETRIEVE_LEVEL).as_deref(), Some("SERIES"));
    assert_eq!(text(identifier, tags::STUDY_INSTANCE_UID).as_deref(), Some("S1"));
    assert_eq!(text(identifier, tags::SERIES_INSTANCE_UID).as_deref(), Some("Ser1"));
}

#[test]
fn test_move_failure_is_a_retrieve_error() {
    let mut service = MockService::new();
    service.fail_move = true;
    let mut model = query_model(service, AssociationMode::Transient);

    let result = model.perform_hierarchical_move(&keys("S1", None), "STORESCP");
    match result {
        Err(QrError::Retrieve(message)) => assert!(message.contains("STORESCP")),
        other => panic!("expected retrieve error, got {:?}", other),
    }
}

#[test]
fn test_move_without_keys() {
    let service = MockService::new();
    let stats = service.stats();
    let mut model = query_model(service, AssociationMode::Transient);

    let result = model.perform_hierarchical_move(&UniqueKeySet::new(), "STORESCP");
    assert!(matches!(result, Err(QrError::Retrieve(_))));
    assert!(stats.borrow().move_requests.is_empty());
    assert!(stats.borrow().opened.is_empty());
}

#[test]
fn test_move_browsed_node() {
    let service = scripted_archive();
    let stats = service.stats();
    let mut model = query_model(service, AssociationMode::Transient);
    let mut tree = model.perform_hierarchical_query(Filter::new());
    let study = tree.child_at(tree.root(), 0).unwrap();
    let series = tree.child_at(study, 1).unwrap();

    tree.move_node(series, "STORESCP").unwrap();

    let stats = stats.borrow();
    let (identifier, _) = &stats.move_requests[0];
    assert_eq!(text(identifier, tags::QUERY_RETRIEVE_LEVEL).as_deref(), Some("SERIES"));
    assert_eq!(text(identifier, tags::SERIES_INSTANCE_UID).as_deref(), Some("Ser2"));
}
