use std::any::Any;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use crate::core::{BehaviorError, Result, Value};

/// Stable identity of a live object, assigned when its handle is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(Uuid);

impl ObjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the object mapper learns about changes made to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeTrackingPolicy {
    /// Changes are discovered by diffing against the last committed snapshot.
    #[default]
    DeferredImplicit,
    /// The object reports every property change; nothing is diffed.
    Notify,
}

/// Field-level reflection over a persisted object.
///
/// This is the only way the tracking layer reads or writes entity state.
pub trait TrackedObject: Any + Send + Sync {
    /// Mapped class name of the object.
    fn class_name(&self) -> &str;

    /// Reads the current value of a field.
    fn get_field(&self, field: &str) -> Result<Value>;

    /// Assigns a field.
    fn set_field(&mut self, field: &str, value: Value) -> Result<()>;

    /// Whether the object takes part in explicit property-change notification.
    fn change_tracking_policy(&self) -> ChangeTrackingPolicy {
        ChangeTrackingPolicy::DeferredImplicit
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Shared handle to a live object.
///
/// Cloning the handle does not clone the object. Equality is identity.
#[derive(Clone)]
pub struct ObjectRef {
    id: ObjectId,
    inner: Arc<RwLock<dyn TrackedObject>>,
}

impl ObjectRef {
    pub fn new<T: TrackedObject>(object: T) -> Self {
        Self {
            id: ObjectId::new(),
            inner: Arc::new(RwLock::new(object)),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn same_object(&self, other: &ObjectRef) -> bool {
        self.id == other.id
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, dyn TrackedObject>> {
        Ok(self.inner.read()?)
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, dyn TrackedObject>> {
        Ok(self.inner.write()?)
    }

    pub fn class_name(&self) -> Result<String> {
        Ok(self.read()?.class_name().to_string())
    }

    pub fn get(&self, field: &str) -> Result<Value> {
        self.read()?.get_field(field)
    }

    pub fn set(&self, field: &str, value: impl Into<Value>) -> Result<()> {
        self.write()?.set_field(field, value.into())
    }

    pub fn change_tracking_policy(&self) -> Result<ChangeTrackingPolicy> {
        Ok(self.read()?.change_tracking_policy())
    }

    /// Runs `f` against the concrete object type.
    pub fn with<T: TrackedObject, R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let guard = self.read()?;
        let class = guard.class_name().to_string();
        guard
            .as_any()
            .downcast_ref::<T>()
            .map(f)
            .ok_or_else(|| downcast_error::<T>(&class))
    }

    /// Runs `f` against the concrete object type, mutably.
    pub fn with_mut<T: TrackedObject, R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut guard = self.write()?;
        let class = guard.class_name().to_string();
        guard
            .as_any_mut()
            .downcast_mut::<T>()
            .map(f)
            .ok_or_else(|| downcast_error::<T>(&class))
    }
}

fn downcast_error<T>(class: &str) -> BehaviorError {
    BehaviorError::TypeMismatch(format!(
        "Object of class '{}' is not a {}",
        class,
        std::any::type_name::<T>()
    ))
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_object(other)
    }
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef").field("id", &self.id).finish()
    }
}
