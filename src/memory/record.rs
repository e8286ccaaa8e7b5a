use std::any::Any;
use std::collections::BTreeMap;

use crate::core::{ChangeTrackingPolicy, Result, TrackedObject, Value};

/// A dynamically shaped entity: a class name and a map of field values.
///
/// Unset fields read as `Null`.
#[derive(Debug, Clone)]
pub struct Record {
    class: String,
    fields: BTreeMap<String, Value>,
    policy: ChangeTrackingPolicy,
}

impl Record {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            fields: BTreeMap::new(),
            policy: ChangeTrackingPolicy::DeferredImplicit,
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Switches the record to the `Notify` change tracking policy.
    pub fn notify(mut self) -> Self {
        self.policy = ChangeTrackingPolicy::Notify;
        self
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }
}

impl TrackedObject for Record {
    fn class_name(&self) -> &str {
        &self.class
    }

    fn get_field(&self, field: &str) -> Result<Value> {
        Ok(self.fields.get(field).cloned().unwrap_or(Value::Null))
    }

    fn set_field(&mut self, field: &str, value: Value) -> Result<()> {
        self.fields.insert(field.to_string(), value);
        Ok(())
    }

    fn change_tracking_policy(&self) -> ChangeTrackingPolicy {
        self.policy
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
