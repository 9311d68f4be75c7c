//! Unit tests for the source record data structures

use crate::record::{
    Ownership, RegistryMeta, RegistrySource, SourceId, SourceProvider, SourceRecord,
};

fn registry_source() -> RegistrySource {
    RegistrySource {
        id: SourceId::new("src-1"),
        name: "Traffic Light".to_string(),
        owner_id: "user-7".to_string(),
        updated_at: 1_700_000_000_000,
        text: "fsm TrafficLight {}".to_string(),
    }
}

#[test]
fn test_record_new_is_empty() {
    let record = SourceRecord::new();
    assert!(record.id.is_none());
    assert!(record.provider.is_none());
    assert!(record.registry.is_none());
    assert!(record.raw_content.is_empty());
    assert!(record.validate().is_ok());
}

#[test]
fn test_record_from_registry() {
    let record = SourceRecord::from_registry(&registry_source());
    assert_eq!(record.id, Some(SourceId::new("src-1")));
    assert_eq!(record.provider, Some(SourceProvider::Registry));
    assert_eq!(record.raw_content, "fsm TrafficLight {}");
    assert_eq!(record.desired_name, "Traffic Light");
    assert!(record.validate().is_ok());
}

#[test]
fn test_adopt_replaces_wholesale() {
    let mut record = SourceRecord::new();
    record.raw_content = "draft text".to_string();
    record.adopt(&registry_source());
    assert_eq!(record.raw_content, "fsm TrafficLight {}");
    assert_eq!(record.registry.as_ref().unwrap().owner_id, "user-7");
}

#[test]
fn test_ownership_derivation() {
    let record = SourceRecord::from_registry(&registry_source());
    assert_eq!(record.ownership(Some("user-7")), Ownership::Owner);
    assert_eq!(record.ownership(Some("user-8")), Ownership::NotOwner);
    assert_eq!(record.ownership(None), Ownership::Unknown);
}

#[test]
fn test_ownership_gist_never_owned() {
    let record = SourceRecord {
        id: Some(SourceId::new("gist-1")),
        provider: Some(SourceProvider::Gist),
        ..SourceRecord::new()
    };
    assert_eq!(record.ownership(Some("user-7")), Ownership::NotOwner);
}

#[test]
fn test_mark_forked_is_idempotent() {
    let mut record = SourceRecord::new();
    record.desired_name = "Foo".to_string();
    record.mark_forked();
    assert_eq!(record.desired_name, "Foo (forked)");
    record.mark_forked();
    assert_eq!(record.desired_name, "Foo (forked)");
}

#[test]
fn test_validate_registry_meta_requires_registry_provider() {
    let record = SourceRecord {
        id: Some(SourceId::new("gist-1")),
        provider: Some(SourceProvider::Gist),
        registry: Some(RegistryMeta {
            owner_id: "user-7".to_string(),
            updated_at: 1,
        }),
        ..SourceRecord::new()
    };
    let errors = record.validate().unwrap_err();
    assert!(errors.iter().any(|e| e.contains("registry metadata")));
}

#[test]
fn test_validate_provider_requires_id() {
    let record = SourceRecord {
        provider: Some(SourceProvider::Registry),
        ..SourceRecord::new()
    };
    let errors = record.validate().unwrap_err();
    assert!(errors.iter().any(|e| e.contains("source id")));
}
