use chrono::{DateTime, NaiveDate, Utc};

use crate::core::{BehaviorError, FieldType, ObjectRef, Result, Value};

/// Conversion between a Rust field type and a tracking [`Value`].
///
/// Used by `#[derive(Trackable)]` to implement field reflection.
pub trait FieldValue: Sized {
    fn to_value(&self) -> Value;
    fn from_value(value: Value) -> Result<Self>;
}

/// A [`FieldValue`] that maps to a scalar column.
pub trait ScalarField: FieldValue {
    const FIELD_TYPE: FieldType;
}

fn mismatch(expected: &str, value: &Value) -> BehaviorError {
    BehaviorError::TypeMismatch(format!(
        "Expected {}, got {}",
        expected,
        value.type_name()
    ))
}

macro_rules! scalar_field {
    ($ty:ty, $field_type:expr, $variant:ident) => {
        impl FieldValue for $ty {
            fn to_value(&self) -> Value {
                Value::$variant(self.clone())
            }

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::$variant(inner) => Ok(inner),
                    other => Err(mismatch(stringify!($variant), &other)),
                }
            }
        }

        impl ScalarField for $ty {
            const FIELD_TYPE: FieldType = $field_type;
        }
    };
}

scalar_field!(i64, FieldType::Integer, Integer);
scalar_field!(String, FieldType::Text, Text);
scalar_field!(bool, FieldType::Boolean, Boolean);
scalar_field!(DateTime<Utc>, FieldType::Timestamp, Timestamp);
scalar_field!(NaiveDate, FieldType::Date, Date);

impl FieldValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Integer(i) => Ok(i as f64),
            other => Err(mismatch("Float", &other)),
        }
    }
}

impl ScalarField for f64 {
    const FIELD_TYPE: FieldType = FieldType::Float;
}

impl FieldValue for ObjectRef {
    fn to_value(&self) -> Value {
        Value::Object(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(object) => Ok(object),
            other => Err(mismatch("Object", &other)),
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: ScalarField> ScalarField for Option<T> {
    const FIELD_TYPE: FieldType = T::FIELD_TYPE;
}
