use std::collections::{BTreeMap, HashMap, HashSet};

use crate::adapter::ObjectState;
use crate::core::{ChangeSet, FieldChange, ObjectId, ObjectRef, Result, Value};
use crate::mapping::ClassMetadata;

pub(super) type Snapshot = BTreeMap<String, Value>;

pub(super) struct ManagedEntry {
    pub object: ObjectRef,
    pub state: ObjectState,
    /// Field values as of the last commit; empty until first commit.
    pub original: Snapshot,
}

/// Bookkeeping of the in-memory object manager.
#[derive(Default)]
pub(super) struct UnitOfWork {
    pub entries: HashMap<ObjectId, ManagedEntry>,
    pub insertions: Vec<ObjectId>,
    pub updates: Vec<ObjectId>,
    pub change_sets: HashMap<ObjectId, ChangeSet>,
    pub notifications: HashMap<ObjectId, ChangeSet>,
    pub recompute_requests: HashMap<ObjectId, usize>,
    pub detached: HashSet<ObjectId>,
    pub flushing: bool,
}

impl UnitOfWork {
    pub fn state_of(&self, id: ObjectId) -> ObjectState {
        match self.entries.get(&id) {
            Some(entry) => entry.state,
            None if self.detached.contains(&id) => ObjectState::Detached,
            None => ObjectState::New,
        }
    }

    pub fn schedule_insert(&mut self, object: ObjectRef) {
        let id = object.id();
        self.detached.remove(&id);
        self.entries.insert(
            id,
            ManagedEntry {
                object,
                state: ObjectState::New,
                original: Snapshot::new(),
            },
        );
        self.insertions.push(id);
    }

    pub fn unschedule_insert(&mut self, id: ObjectId) {
        self.insertions.retain(|scheduled| *scheduled != id);
        self.change_sets.remove(&id);
        self.entries.remove(&id);
    }

    pub fn schedule_update(&mut self, id: ObjectId) {
        let managed = self.state_of(id) == ObjectState::Managed;
        if managed && !self.updates.contains(&id) {
            self.updates.push(id);
        }
    }

    pub fn is_scheduled_for_insert(&self, id: ObjectId) -> bool {
        self.insertions.contains(&id)
    }

    pub fn objects(&self, ids: &[ObjectId]) -> Vec<ObjectRef> {
        ids.iter()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| entry.object.clone())
            .collect()
    }

    /// Managed objects that are not pending insertion.
    pub fn managed_objects(&self) -> Vec<ObjectRef> {
        let mut managed: Vec<_> = self
            .entries
            .values()
            .filter(|entry| entry.state == ObjectState::Managed)
            .map(|entry| entry.object.clone())
            .collect();
        managed.sort_by_key(ObjectRef::id);
        managed
    }

    pub fn record_notification(&mut self, id: ObjectId, field: &str, old: Value, new: Value) {
        self.notifications
            .entry(id)
            .or_default()
            .merge(ChangeSet::new().with(field, old, new));
    }

    /// Drops the state computed by an aborted flush. Pending insertions and
    /// notifications stay scheduled.
    pub fn abort_flush(&mut self) {
        self.flushing = false;
        self.updates.clear();
        self.change_sets.clear();
    }
}

pub(super) fn snapshot(meta: &ClassMetadata, object: &ObjectRef) -> Result<Snapshot> {
    let guard = object.read()?;
    meta.field_names()
        .map(|field| Ok((field.to_string(), guard.get_field(field)?)))
        .collect()
}

/// Every mapped field of a new object, as changed from `Null`.
pub(super) fn insert_change_set(current: Snapshot) -> ChangeSet {
    let mut change_set = ChangeSet::new();
    for (field, value) in current {
        change_set.insert(field, FieldChange::new(Value::Null, value));
    }
    change_set
}

pub(super) fn diff(original: &Snapshot, current: Snapshot) -> ChangeSet {
    let mut change_set = ChangeSet::new();
    for (field, value) in current {
        let old = original.get(&field).cloned().unwrap_or(Value::Null);
        if old != value {
            change_set.insert(field, FieldChange::new(old, value));
        }
    }
    change_set
}
