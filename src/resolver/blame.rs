use std::sync::RwLock;

use super::FieldValueResolver;
use crate::adapter::EventAdapter;
use crate::core::{BehaviorError, FieldType, Result, Value};
use crate::mapping::{ClassMetadata, FieldMapping};

/// Writes the current user into text fields or to-one associations.
///
/// The user is either a name (`Value::Text`) or a user object
/// (`Value::Object`). Text fields receive the name, or the object's
/// identifier field; associations receive the object itself.
pub struct BlameResolver {
    user: RwLock<Value>,
    identifier_field: String,
}

impl BlameResolver {
    pub const NAME: &'static str = "blameable";

    pub fn new() -> Self {
        Self::with_identifier_field("username")
    }

    pub fn with_identifier_field(field: impl Into<String>) -> Self {
        Self {
            user: RwLock::new(Value::Null),
            identifier_field: field.into(),
        }
    }

    pub fn set_user(&self, user: impl Into<Value>) -> Result<()> {
        let user = user.into();
        if !matches!(user, Value::Null | Value::Text(_) | Value::Object(_)) {
            return Err(BehaviorError::InvalidArgument(format!(
                "Blame user must be a name or an object, got {}",
                user.type_name()
            )));
        }
        *self.user.write()? = user;
        Ok(())
    }

    pub fn clear_user(&self) -> Result<()> {
        *self.user.write()? = Value::Null;
        Ok(())
    }

    pub fn user(&self) -> Result<Value> {
        Ok(self.user.read()?.clone())
    }
}

impl Default for BlameResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldValueResolver for BlameResolver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn supports_field(&self, mapping: &FieldMapping) -> bool {
        mapping.is_to_one() || mapping.field_type() == Some(FieldType::Text)
    }

    fn resolve(
        &self,
        meta: &ClassMetadata,
        field: &str,
        _adapter: &dyn EventAdapter,
    ) -> Result<Value> {
        let user = self.user()?;

        if meta.has_association(field) {
            return match user {
                Value::Null | Value::Object(_) => Ok(user),
                other => Err(BehaviorError::InvalidArgument(format!(
                    "Blame is a reference in {}.{}, user must be an object, got {}",
                    meta.name,
                    field,
                    other.type_name()
                ))),
            };
        }

        match user {
            Value::Object(object) => match object.get(&self.identifier_field)? {
                name @ Value::Text(_) => Ok(name),
                _ => Err(BehaviorError::InvalidArgument(format!(
                    "Field {}.{} expects a string, user object must have a text '{}' field",
                    meta.name, field, self.identifier_field
                ))),
            },
            other => Ok(other),
        }
    }
}
