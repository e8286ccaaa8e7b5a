//! Configuration loading: JSON documents, inheritance, validation and caching

use std::fs;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use entity_tracking::{
    AcceptedValues, BackendKind, BehaviorConfig, BehaviorError, ChainConfigurationProvider,
    ChangeRule, ClassMetadata, ConfigurationCache, ConfigurationProvider, FieldType, FixedClock,
    JsonConfigurationProvider, MemoryObjectManager, ObjectRef, Record,
    StaticConfigurationProvider, TimestampResolver, TrackedField, TrackingListener, Value,
};
use tempfile::TempDir;

fn article_meta() -> ClassMetadata {
    ClassMetadata::new("Article")
        .extends("Timestamped")
        .with_field("title", FieldType::Text)
        .with_field("status", FieldType::Text)
        .with_field("created", FieldType::Timestamp)
        .with_field("updated", FieldType::Timestamp)
        .with_field("published", FieldType::Timestamp)
}

fn manager_with(provider: Arc<dyn ConfigurationProvider>) -> MemoryObjectManager {
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 2, 2, 2, 2, 2).unwrap()));
    let listener = TrackingListener::new(Arc::new(TimestampResolver::with_clock(clock)), provider);
    let manager = MemoryObjectManager::new(BackendKind::Document);
    manager.add_subscriber(Arc::new(listener)).unwrap();
    manager
}

const MAPPING: &str = r#"{
    "Article": {
        "timestampable": {
            "create": ["created"],
            "update": ["updated"],
            "change": [
                { "field": "published", "trackedField": "status", "value": ["Published", "Featured"] }
            ]
        }
    }
}"#;

#[test]
fn test_json_document_is_loaded_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("mapping.json");
    fs::write(&path, MAPPING).unwrap();

    let provider = JsonConfigurationProvider::from_path(&path).unwrap();
    assert_eq!(provider.classes().collect::<Vec<_>>(), vec!["Article"]);

    let config = provider.load("timestampable", "Article").unwrap().unwrap();
    assert_eq!(config.create(), ["created".to_string()]);
    assert_eq!(config.update(), ["updated".to_string()]);
    assert_eq!(
        config.change()[0],
        ChangeRule::new("published", "status").when(["Published", "Featured"])
    );
    assert!(provider.load("blameable", "Article").unwrap().is_none());
}

#[test]
fn test_json_rules_drive_a_flush() {
    let provider = JsonConfigurationProvider::from_json(MAPPING).unwrap();
    let manager = manager_with(Arc::new(provider));
    manager.register_class(article_meta()).unwrap();

    let article = ObjectRef::new(Record::new("Article").with("status", "Draft"));
    manager.persist(&article).unwrap();
    manager.flush().unwrap();
    assert!(!article.get("created").unwrap().is_null());
    assert!(article.get("published").unwrap().is_null());

    article.set("status", "Featured").unwrap();
    manager.flush().unwrap();
    assert!(!article.get("published").unwrap().is_null());
}

#[test]
fn test_missing_file_is_an_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let result = JsonConfigurationProvider::from_path(temp_dir.path().join("absent.json"));
    assert!(matches!(result, Err(BehaviorError::IoError(_))));
}

#[test]
fn test_malformed_documents_are_rejected() {
    let unknown_key = r#"{ "Article": { "timestampable": { "created": ["created"] } } }"#;
    assert!(matches!(
        JsonConfigurationProvider::from_json(unknown_key),
        Err(BehaviorError::Configuration(_))
    ));

    let nested_value = r#"{ "Article": { "timestampable": {
        "change": [{ "field": "published", "trackedField": "status", "value": {"a": 1} }]
    } } }"#;
    assert!(JsonConfigurationProvider::from_json(nested_value).is_err());

    let missing_tracked = r#"{ "Article": { "timestampable": {
        "change": [{ "field": "published" }]
    } } }"#;
    assert!(JsonConfigurationProvider::from_json(missing_tracked).is_err());
}

#[test]
fn test_scalar_and_null_values_in_documents() {
    let document = r#"{ "Article": { "timestampable": { "change": [
        { "field": "published", "trackedField": "status", "value": "Published" },
        { "field": "updated", "trackedField": ["title", "status"], "value": null },
        { "field": "created", "tracked_field": "title" }
    ] } } }"#;
    let provider = JsonConfigurationProvider::from_json(document).unwrap();
    let config = provider.load("timestampable", "Article").unwrap().unwrap();

    assert_eq!(
        config.change()[0].value,
        AcceptedValues::OneOf(vec![Value::from("Published")])
    );
    assert_eq!(
        config.change()[1].tracked,
        TrackedField::many(["title", "status"])
    );
    assert_eq!(config.change()[1].value, AcceptedValues::Any);
    assert_eq!(config.change()[2].value, AcceptedValues::Any);
}

#[test]
fn test_parent_configuration_is_merged_first() {
    let provider = StaticConfigurationProvider::new()
        .with(
            "timestampable",
            "Timestamped",
            BehaviorConfig::new().on_create("created").on_update("updated"),
        )
        .with(
            "timestampable",
            "Article",
            BehaviorConfig::new().on_update("updated").on_update("published"),
        );
    let manager = manager_with(Arc::new(provider));
    manager.register_class(article_meta()).unwrap();

    let article = ObjectRef::new(Record::new("Article"));
    manager.persist(&article).unwrap();

    for field in ["created", "updated", "published"] {
        assert!(!article.get(field).unwrap().is_null(), "{field} not seeded");
    }
}

#[test]
fn test_unmapped_field_fails_at_metadata_load() {
    let provider = StaticConfigurationProvider::new().with(
        "timestampable",
        "Article",
        BehaviorConfig::new().on_update("modified"),
    );
    let manager = manager_with(Arc::new(provider));

    let err = manager.register_class(article_meta()).unwrap_err();
    assert!(matches!(err, BehaviorError::Configuration(_)));
    assert!(err.to_string().contains("modified"));
    assert!(matches!(
        manager.metadata("Article"),
        Err(BehaviorError::ClassNotMapped(_))
    ));
}

#[test]
fn test_field_type_unsupported_by_resolver_is_rejected() {
    let provider = StaticConfigurationProvider::new().with(
        "timestampable",
        "Article",
        BehaviorConfig::new().on_create("title"),
    );
    let manager = manager_with(Arc::new(provider));

    let err = manager.register_class(article_meta()).unwrap_err();
    assert!(err.to_string().contains("not a valid timestampable field"));
}

#[test]
fn test_ill_formed_tracked_field_is_rejected() {
    let provider = StaticConfigurationProvider::new().with(
        "timestampable",
        "Article",
        BehaviorConfig::new().on_change(ChangeRule::new("published", "status..x")),
    );
    let manager = manager_with(Arc::new(provider));

    assert!(matches!(
        manager.register_class(article_meta()),
        Err(BehaviorError::Configuration(_))
    ));
}

#[test]
fn test_child_of_scalar_field_is_rejected() {
    let provider = StaticConfigurationProvider::new().with(
        "timestampable",
        "Article",
        BehaviorConfig::new().on_change(ChangeRule::new("published", "status.name")),
    );
    let manager = manager_with(Arc::new(provider));

    assert!(manager.register_class(article_meta()).is_err());
}

#[test]
fn test_chain_provider_prefers_first_match() {
    let first = StaticConfigurationProvider::new().with(
        "timestampable",
        "Article",
        BehaviorConfig::new().on_create("created"),
    );
    let second = StaticConfigurationProvider::new()
        .with(
            "timestampable",
            "Article",
            BehaviorConfig::new().on_create("updated"),
        )
        .with(
            "timestampable",
            "Comment",
            BehaviorConfig::new().on_create("created"),
        );
    let chain = ChainConfigurationProvider::new()
        .with(Arc::new(first))
        .with(Arc::new(second));

    let article = chain.load("timestampable", "Article").unwrap().unwrap();
    assert_eq!(article.create(), ["created".to_string()]);
    assert!(chain.load("timestampable", "Comment").unwrap().is_some());
    assert!(chain.load("timestampable", "Tag").unwrap().is_none());
}

#[test]
fn test_shared_cache_is_populated_once_per_class() {
    let cache = Arc::new(ConfigurationCache::new());
    let provider: Arc<dyn ConfigurationProvider> = Arc::new(StaticConfigurationProvider::new().with(
        "timestampable",
        "Article",
        BehaviorConfig::new().on_create("created"),
    ));
    let listener = TrackingListener::with_cache(
        Arc::new(TimestampResolver::new()),
        provider.clone(),
        cache.clone(),
    );
    let manager = MemoryObjectManager::new(BackendKind::Relational);
    manager.add_subscriber(Arc::new(listener)).unwrap();
    manager.register_class(article_meta()).unwrap();

    assert!(cache.contains("timestampable", "Article").unwrap());
    assert_eq!(cache.len().unwrap(), 1);

    let second = TrackingListener::with_cache(
        Arc::new(TimestampResolver::new()),
        Arc::new(StaticConfigurationProvider::new()),
        cache.clone(),
    );
    let config = second.configuration(&manager, "Article").unwrap().unwrap();
    assert_eq!(config.create(), ["created".to_string()]);
}
