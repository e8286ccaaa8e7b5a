use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};

use crate::core::{BehaviorError, ObjectRef, Result};

/// A field value as seen by the tracking layer.
///
/// `Object` carries a handle to another persisted object (the value of an
/// association); two objects are equal only when they are the same instance.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Object(ObjectRef),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Integer(_) => "INTEGER",
            Self::Float(_) => "FLOAT",
            Self::Text(_) => "TEXT",
            Self::Boolean(_) => "BOOLEAN",
            Self::Timestamp(_) => "TIMESTAMP",
            Self::Date(_) => "DATE",
            Self::Object(_) => "OBJECT",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// Converts a scalar JSON literal (as found in mapping documents).
    ///
    /// Arrays and objects are not literals and are rejected.
    pub fn from_json_literal(json: &serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::Bool(b) => Ok(Self::Boolean(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Self::Float(f))
                } else {
                    Err(BehaviorError::Configuration(format!(
                        "Numeric literal {} is out of range",
                        n
                    )))
                }
            }
            serde_json::Value::String(s) => Ok(Self::Text(s.clone())),
            other => Err(BehaviorError::Configuration(format!(
                "Expected a scalar literal, got {}",
                other
            ))),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.same_object(b),
            (Self::Integer(i), Self::Float(f)) | (Self::Float(f), Self::Integer(i)) => {
                integer_equals_float(*i, *f)
            }
            _ => false,
        }
    }
}

/// Exact comparison: the float must be integral and in `i64` range.
fn integer_equals_float(i: i64, f: f64) -> bool {
    const BOUND: f64 = 9_223_372_036_854_775_808.0; // 2^63
    f.fract() == 0.0 && (-BOUND..BOUND).contains(&f) && f as i64 == i
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(fl) => write!(f, "{}", fl),
            Self::Text(s) => write!(f, "{}", s),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Object(object) => write!(f, "object#{}", object.id()),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Self::Object(object)
    }
}

/// Storage type of a scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Integer,
    Float,
    Text,
    Boolean,
    Timestamp,
    Date,
}

impl FieldType {
    pub fn is_compatible(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Integer, Value::Integer(_)) => true,
            (Self::Float, Value::Float(_)) => true,
            (Self::Float, Value::Integer(_)) => true,
            (Self::Text, Value::Text(_)) => true,
            (Self::Boolean, Value::Boolean(_)) => true,
            (Self::Timestamp, Value::Timestamp(_)) => true,
            (Self::Date, Value::Date(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "INTEGER"),
            Self::Float => write!(f, "FLOAT"),
            Self::Text => write!(f, "TEXT"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::Date => write!(f, "DATE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Record;

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::Integer(42), Value::Integer(42));
        assert_eq!(Value::Integer(0), Value::Float(0.0));
        assert_ne!(Value::Integer(1), Value::Text("1".into()));
        assert_ne!(Value::Null, Value::Boolean(false));
    }

    #[test]
    fn test_float_equality_is_exact() {
        assert_ne!(Value::Float(1e-17), Value::Float(2e-17));
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_eq!(Value::Integer(-3), Value::Float(-3.0));
        assert_ne!(Value::Integer(3), Value::Float(3.5));
        assert_ne!(Value::Integer(i64::MAX), Value::Float(i64::MAX as f64));
        assert_ne!(Value::Integer(1 << 53 | 1), Value::Float((1i64 << 53) as f64));
    }

    #[test]
    fn test_object_equality_is_identity() {
        let a = ObjectRef::new(Record::new("User"));
        let b = ObjectRef::new(Record::new("User"));

        assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
        assert_ne!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn test_json_literals() {
        assert_eq!(
            Value::from_json_literal(&serde_json::json!("Published")).unwrap(),
            Value::Text("Published".into())
        );
        assert_eq!(
            Value::from_json_literal(&serde_json::json!(0)).unwrap(),
            Value::Integer(0)
        );
        assert!(Value::from_json_literal(&serde_json::json!([1])).is_err());
        assert!(Value::from_json_literal(&serde_json::json!({"a": 1})).is_err());
    }

    #[test]
    fn test_type_compatibility() {
        assert!(FieldType::Timestamp.is_compatible(&Value::Timestamp(Utc::now())));
        assert!(FieldType::Integer.is_compatible(&Value::Null));
        assert!(!FieldType::Integer.is_compatible(&Value::Text("hello".into())));
    }
}
