#![cfg(test)]

use std::io::Write;

use crate::config::{Config, ConfigError, ModelKind};
use crate::query_model::AssociationMode;
use dimse::Priority;

#[test]
fn test_basic_config() {
    let toml = r#"
        [endpoint]
        host = "pacs.example.org"
        port = 11112
        called_ae_title = "PACS"
        calling_ae_title = "WORKSTATION"
        reuse_associations = true

        [dimse]
        max_pdu = 32768
        priority = "high"

        [query]
        information_model = "patient"
        return_keys = ["PatientComments", "BodyPartExamined"]

        [logging]
        level = "debug"
    "#;

    let config = Config::from_toml_str(toml).expect("valid config");

    assert_eq!(config.endpoint.host, "pacs.example.org");
    assert_eq!(config.endpoint.port, 11112);
    assert_eq!(config.association_mode(), AssociationMode::Reuse);
    assert_eq!(config.query.information_model, ModelKind::Patient);
    assert_eq!(config.query.return_keys.len(), 2);
    assert_eq!(config.logging.level, "debug");
    assert!(!config.logging.log_to_file);

    let dimse = config.dimse_config();
    assert_eq!(dimse.local_aet, "WORKSTATION");
    assert_eq!(dimse.max_pdu, 32768);
    assert_eq!(dimse.priority, Priority::High);

    let endpoint = config.to_endpoint();
    assert_eq!(endpoint.called_ae_title, "PACS");
    assert_eq!(endpoint.remote_node().address(), "PACS@pacs.example.org:11112");
}

#[test]
fn test_defaults() {
    let toml = r#"
        [endpoint]
        host = "localhost"
        called_ae_title = "ORTHANC"
    "#;

    let config = Config::from_toml_str(toml).expect("valid config");

    assert_eq!(config.endpoint.port, 104);
    assert_eq!(config.endpoint.calling_ae_title, "QRBROWSE");
    assert_eq!(config.association_mode(), AssociationMode::Transient);
    assert_eq!(config.query.information_model, ModelKind::Study);
    assert!(config.query.return_keys.is_empty());
    assert_eq!(config.dimse.max_pdu, 16384);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_missing_endpoint_section() {
    let result = Config::from_toml_str("[logging]\nlevel = \"info\"\n");
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_invalid_ae_title() {
    let toml = r#"
        [endpoint]
        host = "localhost"
        called_ae_title = "THIS_TITLE_IS_TOO_LONG"
    "#;

    match Config::from_toml_str(toml) {
        Err(ConfigError::InvalidAeTitle { field, .. }) => assert_eq!(field, "called_ae_title"),
        other => panic!("expected invalid AE title, got {:?}", other),
    }
}

#[test]
fn test_invalid_endpoint() {
    let toml = r#"
        [endpoint]
        host = ""
        called_ae_title = "PACS"
    "#;
    assert!(matches!(
        Config::from_toml_str(toml),
        Err(ConfigError::InvalidEndpoint { .. })
    ));

    let toml = r#"
        [endpoint]
        host = "localhost"
        port = 0
        called_ae_title = "PACS"
    "#;
    assert!(matches!(
        Config::from_toml_str(toml),
        Err(ConfigError::InvalidEndpoint { .. })
    ));
}

#[test]
fn test_pdu_out_of_bounds() {
    let toml = r#"
        [endpoint]
        host = "localhost"
        called_ae_title = "PACS"

        [dimse]
        max_pdu = 1024
    "#;
    assert!(matches!(
        Config::from_toml_str(toml),
        Err(ConfigError::InvalidDimse(_))
    ));
}

#[test]
fn test_unknown_model_and_return_key() {
    let toml = r#"
        [endpoint]
        host = "localhost"
        called_ae_title = "PACS"

        [query]
        information_model = "worklist"
    "#;
    assert!(matches!(Config::from_toml_str(toml), Err(ConfigError::Parse(_))));

    let toml = r#"
        [endpoint]
        host = "localhost"
        called_ae_title = "PACS"

        [query]
        return_keys = ["NotAKeyword"]
    "#;
    match Config::from_toml_str(toml) {
        Err(ConfigError::UnknownReturnKey(keyword)) => assert_eq!(keyword, "NotAKeyword"),
        other => panic!("expected unknown return key, got {:?}", other),
    }
}

#[test]
fn test_return_key_without_query_level() {
    let toml = r#"
        [endpoint]
        host = "localhost"
        called_ae_title = "PACS"

        [query]
        return_keys = ["InstitutionName", "PixelData"]
    "#;
    match Config::from_toml_str(toml) {
        Err(ConfigError::UnusableReturnKey(keyword)) => assert_eq!(keyword, "PixelData"),
        other => panic!("expected unusable return key, got {:?}", other),
    }
}

#[test]
fn test_log_file_required_when_logging_to_file() {
    let toml = r#"
        [endpoint]
        host = "localhost"
        called_ae_title = "PACS"

        [logging]
        log_to_file = true
        log_file_path = ""
    "#;
    assert!(matches!(
        Config::from_toml_str(toml),
        Err(ConfigError::InvalidLogging(_))
    ));
}

#[test]
fn test_from_path() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        "[endpoint]\nhost = \"127.0.0.1\"\nport = 4242\ncalled_ae_title = \"PACS\""
    )
    .expect("write config");

    let config = Config::from_path(file.path()).expect("valid config");
    assert_eq!(config.endpoint.port, 4242);

    let missing = Config::from_path("/nonexistent/qrbrowse.toml");
    assert!(matches!(missing, Err(ConfigError::Read { .. })));
}
