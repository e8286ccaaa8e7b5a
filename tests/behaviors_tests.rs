//! Blame and IP tracking, association cascades and the notify policy

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Duration, TimeZone, Utc};
use entity_tracking::{
    AssociationKind, BackendKind, BehaviorConfig, BehaviorError, BlameResolver, ClassMetadata,
    EventAdapter, FieldType, FixedClock, IpTraceResolver, LifecycleEvent, LifecycleSubscriber,
    MemoryObjectManager, ObjectRef, ObjectState, Operation, Record, Result,
    StaticConfigurationProvider, TimestampResolver, TrackingListener, Value,
};

fn blame_manager(backend: BackendKind, resolver: Arc<BlameResolver>) -> MemoryObjectManager {
    let provider = StaticConfigurationProvider::new().with(
        BlameResolver::NAME,
        "Article",
        BehaviorConfig::new()
            .on_create("author")
            .on_create("createdBy")
            .on_update("updatedBy"),
    );
    let manager = MemoryObjectManager::new(backend);
    manager
        .add_subscriber(Arc::new(TrackingListener::new(resolver, Arc::new(provider))))
        .unwrap();
    manager
        .register_class(ClassMetadata::new("User").with_field("username", FieldType::Text))
        .unwrap();
    manager
        .register_class(
            ClassMetadata::new("Article")
                .with_field("title", FieldType::Text)
                .with_association("author", "User", AssociationKind::ToOne)
                .with_field("createdBy", FieldType::Text)
                .with_field("updatedBy", FieldType::Text),
        )
        .unwrap();
    manager
}

#[test]
fn test_blame_cascades_new_user_on_relational_backend() {
    let resolver = Arc::new(BlameResolver::new());
    let manager = blame_manager(BackendKind::Relational, resolver.clone());
    let alice = ObjectRef::new(Record::new("User").with("username", "alice"));
    resolver.set_user(alice.clone()).unwrap();

    let article = ObjectRef::new(Record::new("Article").with("title", "news"));
    manager.persist(&article).unwrap();

    assert_eq!(article.get("author").unwrap(), Value::Object(alice.clone()));
    assert_eq!(article.get("createdBy").unwrap(), Value::from("alice"));
    assert_eq!(manager.state(&alice).unwrap(), ObjectState::New);
    assert!(manager.is_known(&alice).unwrap());

    let report = manager.flush().unwrap();
    assert_eq!(report.count(Operation::Insert), 2);
    assert_eq!(report.find(&alice).unwrap().class, "User");
}

#[test]
fn test_blame_cascades_new_user_on_document_backend() {
    let resolver = Arc::new(BlameResolver::new());
    let manager = blame_manager(BackendKind::Document, resolver.clone());
    let bob = ObjectRef::new(Record::new("User").with("username", "bob"));
    resolver.set_user(bob.clone()).unwrap();

    let article = ObjectRef::new(Record::new("Article"));
    manager.persist(&article).unwrap();
    manager.flush().unwrap();

    assert_eq!(manager.state(&bob).unwrap(), ObjectState::Managed);
}

#[test]
fn test_managed_user_is_not_persisted_again() {
    let resolver = Arc::new(BlameResolver::new());
    let manager = blame_manager(BackendKind::Relational, resolver.clone());
    let carol = ObjectRef::new(Record::new("User").with("username", "carol"));
    manager.persist(&carol).unwrap();
    manager.flush().unwrap();
    resolver.set_user(carol.clone()).unwrap();

    let article = ObjectRef::new(Record::new("Article"));
    manager.persist(&article).unwrap();
    let report = manager.flush().unwrap();

    assert_eq!(report.count(Operation::Insert), 1);
    assert!(report.find(&carol).is_none());
}

#[test]
fn test_update_refreshes_blame_with_current_user() {
    let resolver = Arc::new(BlameResolver::new());
    let manager = blame_manager(BackendKind::Relational, resolver.clone());
    resolver.set_user("alice").unwrap();
    let rejected = ObjectRef::new(Record::new("Article").with("title", "a"));
    // the association cannot take a name
    assert!(matches!(
        manager.persist(&rejected),
        Err(BehaviorError::InvalidArgument(_))
    ));
    assert!(!manager.is_known(&rejected).unwrap());

    let dave = ObjectRef::new(Record::new("User").with("username", "dave"));
    resolver.set_user(dave).unwrap();
    let article = ObjectRef::new(Record::new("Article").with("title", "a"));
    manager.persist(&article).unwrap();
    manager.flush().unwrap();
    assert_eq!(article.get("updatedBy").unwrap(), Value::from("dave"));

    let erin = ObjectRef::new(Record::new("User").with("username", "erin"));
    resolver.set_user(erin).unwrap();
    article.set("title", "b").unwrap();
    manager.flush().unwrap();

    assert_eq!(article.get("updatedBy").unwrap(), Value::from("erin"));
    assert_eq!(article.get("createdBy").unwrap(), Value::from("dave"));
}

#[test]
fn test_ip_trace_records_client_address() {
    let resolver = Arc::new(IpTraceResolver::new());
    let provider = StaticConfigurationProvider::new().with(
        IpTraceResolver::NAME,
        "Comment",
        BehaviorConfig::new().on_create("createdFromIp"),
    );
    let manager = MemoryObjectManager::new(BackendKind::Relational);
    manager
        .add_subscriber(Arc::new(TrackingListener::new(
            resolver.clone(),
            Arc::new(provider),
        )))
        .unwrap();
    manager
        .register_class(ClassMetadata::new("Comment").with_field("createdFromIp", FieldType::Text))
        .unwrap();

    resolver.set_ip(" 192.168.0.7 ").unwrap();
    let first = ObjectRef::new(Record::new("Comment"));
    manager.persist(&first).unwrap();
    assert_eq!(first.get("createdFromIp").unwrap(), Value::from("192.168.0.7"));

    assert!(matches!(
        resolver.set_ip("not-an-ip"),
        Err(BehaviorError::InvalidArgument(_))
    ));

    resolver.clear_ip().unwrap();
    let second = ObjectRef::new(Record::new("Comment"));
    manager.persist(&second).unwrap();
    assert_eq!(second.get("createdFromIp").unwrap(), Value::Null);
}

#[test]
fn test_notify_objects_report_tracked_writes() {
    let start = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
    let clock = Arc::new(FixedClock::new(start));
    let provider = StaticConfigurationProvider::new().with(
        TimestampResolver::NAME,
        "Page",
        BehaviorConfig::new().on_update("updated"),
    );
    let manager = MemoryObjectManager::new(BackendKind::Relational);
    manager
        .add_subscriber(Arc::new(TrackingListener::new(
            Arc::new(TimestampResolver::with_clock(clock.clone())),
            Arc::new(provider),
        )))
        .unwrap();
    manager
        .register_class(
            ClassMetadata::new("Page")
                .with_field("title", FieldType::Text)
                .with_field("updated", FieldType::Timestamp),
        )
        .unwrap();

    let page = ObjectRef::new(Record::new("Page").with("title", "a").notify());
    manager.persist(&page).unwrap();
    manager.flush().unwrap();

    // writes without a notification are invisible
    clock.advance(Duration::minutes(1));
    page.set("title", "silent").unwrap();
    assert!(manager.flush().unwrap().is_empty());

    clock.advance(Duration::minutes(1));
    page.set("title", "b").unwrap();
    manager
        .property_changed(&page, "title", Value::from("silent"), Value::from("b"))
        .unwrap();
    let report = manager.flush().unwrap();

    let later = start + Duration::minutes(2);
    let committed = report.find(&page).unwrap();
    assert_eq!(committed.operation, Operation::Update);
    assert_eq!(
        committed.change_set.new_value("updated"),
        Some(&Value::Timestamp(later))
    );
    assert_eq!(page.get("updated").unwrap(), Value::Timestamp(later));
}

struct FailingSubscriber {
    fail: AtomicBool,
}

impl LifecycleSubscriber for FailingSubscriber {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn subscribed_events(&self) -> &'static [LifecycleEvent] {
        &[LifecycleEvent::OnFlush]
    }

    fn on_flush(&self, _ea: &dyn EventAdapter) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BehaviorError::InvalidArgument("flush rejected".to_string()));
        }
        Ok(())
    }
}

#[test]
fn test_failed_flush_keeps_scheduled_insertions() {
    let subscriber = Arc::new(FailingSubscriber {
        fail: AtomicBool::new(true),
    });
    let manager = MemoryObjectManager::new(BackendKind::Relational);
    manager.add_subscriber(subscriber.clone()).unwrap();
    manager
        .register_class(ClassMetadata::new("Note").with_field("body", FieldType::Text))
        .unwrap();

    let note = ObjectRef::new(Record::new("Note").with("body", "x"));
    manager.persist(&note).unwrap();
    assert!(manager.flush().is_err());
    assert_eq!(manager.state(&note).unwrap(), ObjectState::New);

    subscriber.fail.store(false, Ordering::SeqCst);
    let report = manager.flush().unwrap();
    assert_eq!(report.count(Operation::Insert), 1);
    assert_eq!(manager.state(&note).unwrap(), ObjectState::Managed);
}

#[test]
fn test_detached_objects_are_forgotten() {
    let manager = MemoryObjectManager::new(BackendKind::Relational);
    manager
        .register_class(ClassMetadata::new("Note").with_field("body", FieldType::Text))
        .unwrap();
    let note = ObjectRef::new(Record::new("Note").with("body", "x"));
    manager.persist(&note).unwrap();
    manager.flush().unwrap();

    manager.detach(&note).unwrap();
    note.set("body", "y").unwrap();

    assert_eq!(manager.state(&note).unwrap(), ObjectState::Detached);
    assert!(manager.flush().unwrap().is_empty());
}
