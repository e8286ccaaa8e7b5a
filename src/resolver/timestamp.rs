use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};

use super::FieldValueResolver;
use crate::adapter::EventAdapter;
use crate::core::{FieldType, Result, Value};
use crate::mapping::{ClassMetadata, FieldMapping};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Writes the current time into timestamp, date or integer (unix seconds) fields.
pub struct TimestampResolver {
    clock: Arc<dyn Clock>,
}

impl TimestampResolver {
    pub const NAME: &'static str = "timestampable";

    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Default for TimestampResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldValueResolver for TimestampResolver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn supports_field(&self, mapping: &FieldMapping) -> bool {
        matches!(
            mapping.field_type(),
            Some(FieldType::Timestamp | FieldType::Date | FieldType::Integer)
        )
    }

    fn resolve(
        &self,
        meta: &ClassMetadata,
        field: &str,
        _adapter: &dyn EventAdapter,
    ) -> Result<Value> {
        let now = self.clock.now();
        let value = match meta.require_field(field)?.field_type() {
            Some(FieldType::Integer) => Value::Integer(now.timestamp()),
            Some(FieldType::Date) => Value::Date(now.date_naive()),
            _ => Value::Timestamp(now),
        };
        Ok(value)
    }
}
