// ============================================================================
// entity_tracking
// ============================================================================

//! Behavioral extensions for object mappers.
//!
//! A [`TrackingListener`] subscribes to the lifecycle events of an object
//! manager and keeps configured fields up to date: set once on creation,
//! refreshed on every update, or recomputed when other fields change to
//! given values. What gets written is decided by the injected
//! [`FieldValueResolver`]: the current time ([`TimestampResolver`]), the
//! acting user ([`BlameResolver`]) or the client IP address
//! ([`IpTraceResolver`]).
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use entity_tracking::{
//!     BackendKind, BehaviorConfig, ClassMetadata, FieldType, MemoryObjectManager, ObjectRef,
//!     Record, StaticConfigurationProvider, TimestampResolver, TrackingListener,
//! };
//!
//! # fn main() -> entity_tracking::Result<()> {
//! let provider = StaticConfigurationProvider::new().with(
//!     "timestampable",
//!     "Article",
//!     BehaviorConfig::new().on_create("created").on_update("updated"),
//! );
//! let listener = TrackingListener::new(Arc::new(TimestampResolver::new()), Arc::new(provider));
//!
//! let manager = MemoryObjectManager::new(BackendKind::Relational);
//! manager.add_subscriber(Arc::new(listener))?;
//! manager.register_class(
//!     ClassMetadata::new("Article")
//!         .with_field("title", FieldType::Text)
//!         .with_field("created", FieldType::Timestamp)
//!         .with_field("updated", FieldType::Timestamp),
//! )?;
//!
//! let article = ObjectRef::new(Record::new("Article").with("title", "Hello"));
//! manager.persist(&article)?;
//! manager.flush()?;
//! assert!(!article.get("created")?.is_null());
//! # Ok(())
//! # }
//! ```

extern crate self as entity_tracking;

pub mod adapter;
pub mod config;
pub mod core;
pub mod events;
pub mod mapping;
pub mod memory;
pub mod resolver;
pub mod tracking;

pub use adapter::{BackendKind, EventAdapter, ObjectManager, ObjectState};
pub use config::{
    AcceptedValues, BehaviorConfig, ChainConfigurationProvider, ChangeRule, ConfigurationCache,
    ConfigurationProvider, EntityConfigurationProvider, JsonConfigurationProvider,
    StaticConfigurationProvider, TrackedField,
};
pub use core::{
    BehaviorError, ChangeSet, ChangeTrackingPolicy, FieldChange, FieldType, FieldValue, ObjectId,
    ObjectRef, Result, ScalarField, TrackedObject, Value,
};
pub use events::{EventManager, LifecycleEvent, LifecycleSubscriber};
pub use mapping::{AssociationKind, ClassMetadata, Entity, FieldKind, FieldMapping};
pub use memory::{
    CommittedObject, FlushReport, MemoryEventAdapter, MemoryObjectManager, Operation, Record,
};
pub use resolver::{
    BlameResolver, Clock, FieldValueResolver, FixedClock, IpTraceResolver, SystemClock,
    TimestampResolver,
};
pub use tracking::TrackingListener;

pub use entity_tracking_derive::Trackable;
