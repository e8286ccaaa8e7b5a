use std::collections::BTreeMap;

use crate::core::Value;

/// Old and new value of one field within a flush.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

impl FieldChange {
    pub fn new(old: impl Into<Value>, new: impl Into<Value>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
        }
    }
}

/// Per-object field changes computed by the unit of work for one flush.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: BTreeMap<String, FieldChange>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, old: impl Into<Value>, new: impl Into<Value>) -> Self {
        self.insert(field, FieldChange::new(old, new));
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, change: FieldChange) {
        self.changes.insert(field.into(), change);
    }

    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.changes.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.changes.contains_key(field)
    }

    pub fn new_value(&self, field: &str) -> Option<&Value> {
        self.changes.get(field).map(|change| &change.new)
    }

    /// True when the field is present with a non-null new value,
    /// i.e. the value was set explicitly during this flush.
    pub fn has_new_value(&self, field: &str) -> bool {
        self.new_value(field).is_some_and(|value| !value.is_null())
    }

    /// Merges `other` into this change set. An existing entry keeps its
    /// original old value and takes the newer new value.
    pub fn merge(&mut self, other: ChangeSet) {
        for (field, change) in other.changes {
            match self.changes.get_mut(&field) {
                Some(existing) => existing.new = change.new,
                None => {
                    self.changes.insert(field, change);
                }
            }
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldChange> {
        self.changes.remove(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldChange)> {
        self.changes.iter().map(|(field, change)| (field.as_str(), change))
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_value_requires_non_null_new_value() {
        let change_set = ChangeSet::new()
            .with("name", "old", "new")
            .with("deletedAt", Value::Null, Value::Null);

        assert!(change_set.has_new_value("name"));
        assert!(change_set.contains("deletedAt"));
        assert!(!change_set.has_new_value("deletedAt"));
        assert!(!change_set.has_new_value("missing"));
    }

    #[test]
    fn merge_keeps_first_old_value() {
        let mut change_set = ChangeSet::new().with("status", "draft", "review");
        change_set.merge(ChangeSet::new().with("status", "review", "published"));

        let change = change_set.get("status").unwrap();
        assert_eq!(change.old, Value::from("draft"));
        assert_eq!(change.new, Value::from("published"));
    }
}
