//! Per-class behavior configuration: which fields are set on create, refreshed
//! on update, or recomputed when other fields change.

pub mod cache;
pub mod provider;
pub mod validation;

pub use cache::ConfigurationCache;
pub use provider::{
    ChainConfigurationProvider, ConfigurationProvider, EntityConfigurationProvider,
    JsonConfigurationProvider, StaticConfigurationProvider,
};

use serde::Deserialize;

use crate::core::{BehaviorError, Value};

/// One or more tracked field entries of a `change` rule.
///
/// Each entry is a field name or `association.child`.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackedField {
    Single(String),
    Many(Vec<String>),
}

impl TrackedField {
    pub fn many<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Many(entries.into_iter().map(Into::into).collect())
    }

    /// Accepted-value matching only applies to a singular tracked field.
    pub fn is_single(&self) -> bool {
        matches!(self, Self::Single(_))
    }

    pub fn entries(&self) -> &[String] {
        match self {
            Self::Single(entry) => std::slice::from_ref(entry),
            Self::Many(entries) => entries,
        }
    }
}

impl From<&str> for TrackedField {
    fn from(entry: &str) -> Self {
        Self::Single(entry.to_string())
    }
}

impl From<String> for TrackedField {
    fn from(entry: String) -> Self {
        Self::Single(entry)
    }
}

/// Values of the tracked field that trigger a `change` rule.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AcceptedValues {
    /// Any change of the tracked field triggers.
    #[default]
    Any,
    OneOf(Vec<Value>),
}

impl AcceptedValues {
    pub fn matches(&self, single_field: bool, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::OneOf(accepted) => single_field && accepted.contains(value),
        }
    }

    fn from_json(json: &serde_json::Value) -> Result<Self, BehaviorError> {
        match json {
            serde_json::Value::Null => Ok(Self::Any),
            serde_json::Value::Array(items) => items
                .iter()
                .map(Value::from_json_literal)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::OneOf),
            literal => Ok(Self::OneOf(vec![Value::from_json_literal(literal)?])),
        }
    }
}

/// Recompute `field` when a tracked field changes to an accepted value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawChangeRule")]
pub struct ChangeRule {
    pub field: String,
    pub tracked: TrackedField,
    pub value: AcceptedValues,
}

impl ChangeRule {
    pub fn new(field: impl Into<String>, tracked: impl Into<TrackedField>) -> Self {
        Self {
            field: field.into(),
            tracked: tracked.into(),
            value: AcceptedValues::Any,
        }
    }

    pub fn when<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.value = AcceptedValues::OneOf(values.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTrackedField {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawChangeRule {
    field: String,
    #[serde(rename = "trackedField", alias = "tracked_field")]
    tracked_field: RawTrackedField,
    #[serde(default)]
    value: serde_json::Value,
}

impl TryFrom<RawChangeRule> for ChangeRule {
    type Error = BehaviorError;

    fn try_from(raw: RawChangeRule) -> Result<Self, Self::Error> {
        let tracked = match raw.tracked_field {
            RawTrackedField::One(entry) => TrackedField::Single(entry),
            RawTrackedField::Many(entries) => TrackedField::Many(entries),
        };
        Ok(Self {
            field: raw.field,
            tracked,
            value: AcceptedValues::from_json(&raw.value)?,
        })
    }
}

/// Behavior rules of one class for one behavior.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawBehaviorConfig")]
pub struct BehaviorConfig {
    create: Vec<String>,
    update: Vec<String>,
    change: Vec<ChangeRule>,
}

#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawBehaviorConfig {
    create: Vec<String>,
    update: Vec<String>,
    change: Vec<ChangeRule>,
}

impl From<RawBehaviorConfig> for BehaviorConfig {
    fn from(raw: RawBehaviorConfig) -> Self {
        let mut config = Self::new();
        raw.create.into_iter().for_each(|field| config.add_create(field));
        raw.update.into_iter().for_each(|field| config.add_update(field));
        raw.change.into_iter().for_each(|rule| config.add_change(rule));
        config
    }
}

impl BehaviorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_create(mut self, field: impl Into<String>) -> Self {
        self.add_create(field);
        self
    }

    pub fn on_update(mut self, field: impl Into<String>) -> Self {
        self.add_update(field);
        self
    }

    pub fn on_change(mut self, rule: ChangeRule) -> Self {
        self.add_change(rule);
        self
    }

    pub fn add_create(&mut self, field: impl Into<String>) {
        push_unique(&mut self.create, field.into());
    }

    pub fn add_update(&mut self, field: impl Into<String>) {
        push_unique(&mut self.update, field.into());
    }

    pub fn add_change(&mut self, rule: ChangeRule) {
        if !self.change.contains(&rule) {
            self.change.push(rule);
        }
    }

    pub fn create(&self) -> &[String] {
        &self.create
    }

    pub fn update(&self) -> &[String] {
        &self.update
    }

    pub fn change(&self) -> &[ChangeRule] {
        &self.change
    }

    /// Appends the rules of `other`, keeping the first position of duplicates.
    pub fn merge(&mut self, other: &BehaviorConfig) {
        other.create.iter().for_each(|field| self.add_create(field.clone()));
        other.update.iter().for_each(|field| self.add_update(field.clone()));
        other.change.iter().for_each(|rule| self.add_change(rule.clone()));
    }

    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.change.is_empty()
    }
}

fn push_unique(fields: &mut Vec<String>, field: String) {
    if !fields.contains(&field) {
        fields.push(field);
    }
}
