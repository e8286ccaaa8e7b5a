use std::sync::Arc;

use super::MemoryObjectManager;
use crate::adapter::{BackendKind, EventAdapter, ObjectManager, ObjectState};
use crate::core::{ChangeSet, ObjectRef, Result, Value};
use crate::mapping::ClassMetadata;

/// Event adapter handed to subscribers by [`MemoryObjectManager`].
pub struct MemoryEventAdapter<'a> {
    manager: &'a MemoryObjectManager,
    object: Option<ObjectRef>,
}

impl<'a> MemoryEventAdapter<'a> {
    pub(super) fn new(manager: &'a MemoryObjectManager, object: Option<ObjectRef>) -> Self {
        Self { manager, object }
    }
}

impl EventAdapter for MemoryEventAdapter<'_> {
    fn object_manager(&self) -> &dyn ObjectManager {
        self.manager
    }

    fn object(&self) -> Option<ObjectRef> {
        self.object.clone()
    }

    fn scheduled_object_insertions(&self) -> Result<Vec<ObjectRef>> {
        let uow = self.manager.unit_of_work.lock()?;
        Ok(uow.objects(&uow.insertions))
    }

    fn scheduled_object_updates(&self) -> Result<Vec<ObjectRef>> {
        let uow = self.manager.unit_of_work.lock()?;
        Ok(uow.objects(&uow.updates))
    }

    fn is_scheduled_for_insert(&self, object: &ObjectRef) -> Result<bool> {
        Ok(self
            .manager
            .unit_of_work
            .lock()?
            .is_scheduled_for_insert(object.id()))
    }

    fn object_change_set(&self, object: &ObjectRef) -> Result<ChangeSet> {
        let uow = self.manager.unit_of_work.lock()?;
        Ok(uow
            .change_sets
            .get(&object.id())
            .cloned()
            .unwrap_or_default())
    }

    fn recompute_single_object_change_set(
        &self,
        meta: &ClassMetadata,
        object: &ObjectRef,
    ) -> Result<()> {
        self.manager.recompute_change_set(meta, object)
    }

    fn property_changed(
        &self,
        object: &ObjectRef,
        field: &str,
        old: Value,
        new: Value,
    ) -> Result<()> {
        self.manager.property_changed(object, field, old, new)
    }
}

impl ObjectManager for MemoryObjectManager {
    fn backend(&self) -> BackendKind {
        self.backend
    }

    fn class_metadata(&self, class: &str) -> Result<Arc<ClassMetadata>> {
        self.metadata(class)
    }

    fn contains(&self, object: &ObjectRef) -> Result<bool> {
        self.is_known(object)
    }

    fn object_state(&self, object: &ObjectRef) -> Result<ObjectState> {
        self.state(object)
    }

    fn persist(&self, object: &ObjectRef) -> Result<()> {
        MemoryObjectManager::persist(self, object)
    }
}
