use thiserror::Error;

#[derive(Error, Debug)]
pub enum BehaviorError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unexpected value: {0}")]
    UnexpectedValue(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Class '{0}' is not mapped")]
    ClassNotMapped(String),

    #[error("Field '{0}' not found in class '{1}'")]
    FieldNotFound(String, String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

pub type Result<T> = std::result::Result<T, BehaviorError>;

impl<T> From<std::sync::PoisonError<T>> for BehaviorError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<std::io::Error> for BehaviorError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for BehaviorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}
