//! Class metadata: the mapped shape of an entity class.

use std::collections::BTreeMap;

use crate::config::BehaviorConfig;
use crate::core::{BehaviorError, FieldType, Result, TrackedObject};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
    ToOne,
    ToMany,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(FieldType),
    Association {
        target: String,
        kind: AssociationKind,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldMapping {
    pub fn scalar(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar(field_type),
        }
    }

    pub fn association(
        name: impl Into<String>,
        target: impl Into<String>,
        kind: AssociationKind,
    ) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Association {
                target: target.into(),
                kind,
            },
        }
    }

    pub fn field_type(&self) -> Option<FieldType> {
        match &self.kind {
            FieldKind::Scalar(field_type) => Some(*field_type),
            FieldKind::Association { .. } => None,
        }
    }

    pub fn is_association(&self) -> bool {
        matches!(self.kind, FieldKind::Association { .. })
    }

    pub fn is_to_one(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::Association {
                kind: AssociationKind::ToOne,
                ..
            }
        )
    }

    pub fn target_class(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Association { target, .. } => Some(target),
            FieldKind::Scalar(_) => None,
        }
    }
}

/// Mapped fields and associations of one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMetadata {
    pub name: String,
    /// Mapped ancestors, root first.
    pub parent_classes: Vec<String>,
    fields: BTreeMap<String, FieldMapping>,
}

impl ClassMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_classes: Vec::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent_classes.push(parent.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.add_mapping(FieldMapping::scalar(name, field_type));
        self
    }

    pub fn with_association(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        kind: AssociationKind,
    ) -> Self {
        self.add_mapping(FieldMapping::association(name, target, kind));
        self
    }

    pub fn add_mapping(&mut self, mapping: FieldMapping) {
        self.fields.insert(mapping.name.clone(), mapping);
    }

    pub fn field(&self, name: &str) -> Option<&FieldMapping> {
        self.fields.get(name)
    }

    pub fn require_field(&self, name: &str) -> Result<&FieldMapping> {
        self.field(name)
            .ok_or_else(|| BehaviorError::FieldNotFound(name.to_string(), self.name.clone()))
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn has_association(&self, name: &str) -> bool {
        self.field(name).is_some_and(FieldMapping::is_association)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn mappings(&self) -> impl Iterator<Item = &FieldMapping> {
        self.fields.values()
    }
}

/// A statically known entity type, usually implemented by `#[derive(Trackable)]`.
pub trait Entity: TrackedObject + Sized {
    fn entity_class() -> &'static str;

    fn class_metadata() -> ClassMetadata;

    /// Behavior configurations declared on the type, keyed by behavior name.
    fn behavior_mappings() -> Vec<(&'static str, BehaviorConfig)>;
}
