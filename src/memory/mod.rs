//! In-memory object manager: identity map, unit of work and lifecycle event
//! dispatch, enough to host tracking listeners without a database.

mod adapter;
mod record;
mod unit_of_work;

pub use adapter::MemoryEventAdapter;
pub use record::Record;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{Level, event, info_span};

use crate::adapter::{BackendKind, ObjectState};
use crate::core::{BehaviorError, ChangeSet, ChangeTrackingPolicy, ObjectRef, Result, Value};
use crate::events::{EventManager, LifecycleSubscriber};
use crate::mapping::{ClassMetadata, Entity};
use unit_of_work::{UnitOfWork, diff, insert_change_set, snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Update,
}

/// An object written by a flush, with the change set it was written with.
#[derive(Debug, Clone)]
pub struct CommittedObject {
    pub object: ObjectRef,
    pub class: String,
    pub operation: Operation,
    pub change_set: ChangeSet,
}

#[derive(Debug, Clone, Default)]
pub struct FlushReport {
    pub committed: Vec<CommittedObject>,
}

impl FlushReport {
    pub fn find(&self, object: &ObjectRef) -> Option<&CommittedObject> {
        self.committed
            .iter()
            .find(|committed| committed.object.same_object(object))
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.committed
            .iter()
            .filter(|committed| committed.operation == operation)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }
}

pub struct MemoryObjectManager {
    backend: BackendKind,
    classes: RwLock<HashMap<String, Arc<ClassMetadata>>>,
    events: EventManager,
    unit_of_work: Mutex<UnitOfWork>,
}

impl MemoryObjectManager {
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            classes: RwLock::new(HashMap::new()),
            events: EventManager::new(),
            unit_of_work: Mutex::new(UnitOfWork::default()),
        }
    }

    pub fn events(&self) -> &EventManager {
        &self.events
    }

    pub fn add_subscriber(&self, subscriber: Arc<dyn LifecycleSubscriber>) -> Result<()> {
        self.events.add_subscriber(subscriber)
    }

    pub fn event_adapter(&self, object: Option<ObjectRef>) -> MemoryEventAdapter<'_> {
        MemoryEventAdapter::new(self, object)
    }

    /// Maps a class and dispatches `LoadClassMetadata`.
    ///
    /// A failing subscriber unmaps the class again.
    pub fn register_class(&self, meta: ClassMetadata) -> Result<Arc<ClassMetadata>> {
        let meta = Arc::new(meta);
        self.classes
            .write()?
            .insert(meta.name.clone(), meta.clone());

        if let Err(err) = self.events.dispatch_load_class_metadata(self, &meta) {
            self.classes.write()?.remove(&meta.name);
            return Err(err);
        }
        event!(Level::DEBUG, class = %meta.name, "class mapped");
        Ok(meta)
    }

    pub fn register_entity<T: Entity>(&self) -> Result<Arc<ClassMetadata>> {
        self.register_class(T::class_metadata())
    }

    pub fn metadata(&self, class: &str) -> Result<Arc<ClassMetadata>> {
        self.classes
            .read()?
            .get(class)
            .cloned()
            .ok_or_else(|| BehaviorError::ClassNotMapped(class.to_string()))
    }

    /// Schedules a new object for insertion and dispatches `PrePersist`.
    ///
    /// Known objects are left alone.
    pub fn persist(&self, object: &ObjectRef) -> Result<()> {
        let meta = self.metadata(&object.class_name()?)?;
        {
            let mut uow = self.unit_of_work.lock()?;
            if uow.entries.contains_key(&object.id()) {
                return Ok(());
            }
            uow.schedule_insert(object.clone());
        }

        let adapter = self.event_adapter(Some(object.clone()));
        if let Err(err) = self.events.dispatch_pre_persist(&adapter) {
            self.unit_of_work.lock()?.unschedule_insert(object.id());
            return Err(err);
        }

        // Cascaded from a running flush: the object joins this flush.
        let flushing = self.unit_of_work.lock()?.flushing;
        if flushing {
            let change_set = insert_change_set(snapshot(&meta, object)?);
            self.unit_of_work
                .lock()?
                .change_sets
                .insert(object.id(), change_set);
        }
        Ok(())
    }

    /// Stops managing an object; pending changes are forgotten.
    pub fn detach(&self, object: &ObjectRef) -> Result<()> {
        let mut uow = self.unit_of_work.lock()?;
        let id = object.id();
        if uow.entries.remove(&id).is_some() {
            uow.insertions.retain(|scheduled| *scheduled != id);
            uow.updates.retain(|scheduled| *scheduled != id);
            uow.change_sets.remove(&id);
            uow.notifications.remove(&id);
            uow.detached.insert(id);
        }
        Ok(())
    }

    pub fn state(&self, object: &ObjectRef) -> Result<ObjectState> {
        Ok(self.unit_of_work.lock()?.state_of(object.id()))
    }

    /// Whether the object is managed or scheduled for insertion.
    pub fn is_known(&self, object: &ObjectRef) -> Result<bool> {
        Ok(self.unit_of_work.lock()?.entries.contains_key(&object.id()))
    }

    /// Number of forced change-set recomputations requested for `object`.
    pub fn recompute_requests(&self, object: &ObjectRef) -> Result<usize> {
        let uow = self.unit_of_work.lock()?;
        Ok(uow
            .recompute_requests
            .get(&object.id())
            .copied()
            .unwrap_or_default())
    }

    /// Records a property change reported by a `Notify` object.
    pub fn property_changed(
        &self,
        object: &ObjectRef,
        field: &str,
        old: Value,
        new: Value,
    ) -> Result<()> {
        let mut uow = self.unit_of_work.lock()?;
        let id = object.id();
        uow.record_notification(id, field, old, new);
        uow.schedule_update(id);
        Ok(())
    }

    /// Computes change sets, dispatches `OnFlush` and commits.
    ///
    /// A failing subscriber aborts the flush before anything is committed.
    pub fn flush(&self) -> Result<FlushReport> {
        let span = info_span!("memory_flush", backend = ?self.backend);
        let _guard = span.enter();

        {
            let mut uow = self.unit_of_work.lock()?;
            if uow.flushing {
                return Err(BehaviorError::InvalidArgument(
                    "flush is already in progress".to_string(),
                ));
            }
            uow.flushing = true;
        }

        match self.run_flush() {
            Ok(report) => {
                self.unit_of_work.lock()?.flushing = false;
                event!(
                    Level::DEBUG,
                    inserted = report.count(Operation::Insert),
                    updated = report.count(Operation::Update),
                    "flush committed"
                );
                Ok(report)
            }
            Err(err) => {
                self.unit_of_work.lock()?.abort_flush();
                event!(Level::ERROR, error = %err, "flush aborted");
                Err(err)
            }
        }
    }

    fn run_flush(&self) -> Result<FlushReport> {
        let (insertions, managed) = {
            let uow = self.unit_of_work.lock()?;
            (uow.objects(&uow.insertions), uow.managed_objects())
        };

        for object in &insertions {
            let meta = self.metadata(&object.class_name()?)?;
            let change_set = insert_change_set(snapshot(&meta, object)?);
            self.unit_of_work
                .lock()?
                .change_sets
                .insert(object.id(), change_set);
        }

        for object in &managed {
            let change_set = self.update_change_set(object)?;
            if !change_set.is_empty() {
                let mut uow = self.unit_of_work.lock()?;
                uow.change_sets.insert(object.id(), change_set);
                uow.schedule_update(object.id());
            }
        }

        self.events.dispatch_on_flush(&self.event_adapter(None))?;
        self.commit()
    }

    fn update_change_set(&self, object: &ObjectRef) -> Result<ChangeSet> {
        if object.change_tracking_policy()? == ChangeTrackingPolicy::Notify {
            let uow = self.unit_of_work.lock()?;
            return Ok(uow
                .notifications
                .get(&object.id())
                .cloned()
                .unwrap_or_default());
        }

        let meta = self.metadata(&object.class_name()?)?;
        let current = snapshot(&meta, object)?;
        let uow = self.unit_of_work.lock()?;
        Ok(match uow.entries.get(&object.id()) {
            Some(entry) => diff(&entry.original, current),
            None => ChangeSet::new(),
        })
    }

    /// Recomputes the change set of one object. No events are dispatched.
    pub(crate) fn recompute_change_set(
        &self,
        meta: &ClassMetadata,
        object: &ObjectRef,
    ) -> Result<()> {
        let id = object.id();
        let inserting = self.unit_of_work.lock()?.is_scheduled_for_insert(id);

        let change_set = if inserting {
            insert_change_set(snapshot(meta, object)?)
        } else {
            self.update_change_set(object)?
        };

        let mut uow = self.unit_of_work.lock()?;
        *uow.recompute_requests.entry(id).or_default() += 1;
        if change_set.is_empty() {
            uow.change_sets.remove(&id);
        } else {
            uow.change_sets.insert(id, change_set);
            if !inserting {
                uow.schedule_update(id);
            }
        }
        Ok(())
    }

    fn commit(&self) -> Result<FlushReport> {
        let scheduled = {
            let uow = self.unit_of_work.lock()?;
            let inserts = uow
                .objects(&uow.insertions)
                .into_iter()
                .map(|object| (object, Operation::Insert));
            let updates = uow
                .objects(&uow.updates)
                .into_iter()
                .map(|object| (object, Operation::Update));
            inserts.chain(updates).collect::<Vec<_>>()
        };

        let mut report = FlushReport::default();
        for (object, operation) in scheduled {
            let class = object.class_name()?;
            let meta = self.metadata(&class)?;
            let committed_state = snapshot(&meta, &object)?;

            let mut uow = self.unit_of_work.lock()?;
            let id = object.id();
            let change_set = uow.change_sets.remove(&id).unwrap_or_default();
            if let Some(entry) = uow.entries.get_mut(&id) {
                entry.original = committed_state;
                entry.state = ObjectState::Managed;
            }
            uow.notifications.remove(&id);
            report.committed.push(CommittedObject {
                object,
                class,
                operation,
                change_set,
            });
        }

        let mut uow = self.unit_of_work.lock()?;
        uow.insertions.clear();
        uow.updates.clear();
        uow.change_sets.clear();
        Ok(report)
    }
}
