//! The seam between the tracking layer and a concrete object mapper.

use std::sync::Arc;

use crate::core::{ChangeSet, ObjectRef, Result, Value};
use crate::mapping::ClassMetadata;

/// Storage family of the object mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Persisting an already managed object must be avoided.
    Relational,
    /// Persisting is idempotent and always safe.
    Document,
}

/// Lifecycle state of an object within the object manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    New,
    Managed,
    Detached,
}

/// Object manager operations used by the tracking layer.
pub trait ObjectManager {
    fn backend(&self) -> BackendKind;

    fn class_metadata(&self, class: &str) -> Result<Arc<ClassMetadata>>;

    /// Whether the object is known to the manager (managed or scheduled).
    fn contains(&self, object: &ObjectRef) -> Result<bool>;

    fn object_state(&self, object: &ObjectRef) -> Result<ObjectState>;

    fn persist(&self, object: &ObjectRef) -> Result<()>;
}

/// Event-scoped facade over the object manager and its unit of work.
pub trait EventAdapter {
    fn object_manager(&self) -> &dyn ObjectManager;

    /// Subject of a single-object lifecycle event.
    fn object(&self) -> Option<ObjectRef>;

    fn scheduled_object_insertions(&self) -> Result<Vec<ObjectRef>>;

    fn scheduled_object_updates(&self) -> Result<Vec<ObjectRef>>;

    fn is_scheduled_for_insert(&self, object: &ObjectRef) -> Result<bool>;

    fn object_change_set(&self, object: &ObjectRef) -> Result<ChangeSet>;

    /// Recomputes the change set of one object against its last snapshot.
    ///
    /// Must not start a new flush.
    fn recompute_single_object_change_set(
        &self,
        meta: &ClassMetadata,
        object: &ObjectRef,
    ) -> Result<()>;

    /// Reports a field write for objects using the `Notify` tracking policy.
    fn property_changed(
        &self,
        object: &ObjectRef,
        field: &str,
        old: Value,
        new: Value,
    ) -> Result<()>;
}
