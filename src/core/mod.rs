pub mod change_set;
pub mod error;
pub mod field;
pub mod object;
pub mod value;

pub use change_set::{ChangeSet, FieldChange};
pub use error::{BehaviorError, Result};
pub use field::{FieldValue, ScalarField};
pub use object::{ChangeTrackingPolicy, ObjectId, ObjectRef, TrackedObject};
pub use value::{FieldType, Value};
