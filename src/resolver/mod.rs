pub mod blame;
pub mod ip_trace;
pub mod timestamp;

pub use blame::BlameResolver;
pub use ip_trace::IpTraceResolver;
pub use timestamp::{Clock, FixedClock, SystemClock, TimestampResolver};

use crate::adapter::EventAdapter;
use crate::core::{Result, Value};
use crate::mapping::{ClassMetadata, FieldMapping};

/// Strategy computing the value written into a tracked field.
pub trait FieldValueResolver: Send + Sync {
    /// Behavior name, used to look up and cache configuration
    fn name(&self) -> &'static str;

    /// Can this resolver produce a value for the mapped field?
    fn supports_field(&self, mapping: &FieldMapping) -> bool;

    /// Produce the new value of `field`.
    fn resolve(&self, meta: &ClassMetadata, field: &str, adapter: &dyn EventAdapter)
    -> Result<Value>;
}
