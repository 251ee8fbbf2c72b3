//! Unified error handling for shopgraph
//!
//! Every loader, proxy and store speaks `DataError`. The type is `Clone`
//! because a single batch failure is delivered to every demand waiting on it.

use std::fmt;

/// Typed failure outcomes for the data-access layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// Persistence collaborator failures
    Store(String),

    /// A record that the caller required was not found
    NotFound(String),

    /// Malformed key or input rejected before any downstream call
    Validation(String),

    /// Downstream dependency returned an error or a malformed response
    Downstream(String),

    /// Downstream dependency is not configured
    Unavailable(String),

    /// The batch a demand was waiting on was abandoned
    Cancelled(String),

    /// Configuration-related errors
    Configuration(String),

    /// Internal invariant violations
    Internal(String),
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::Store(msg) => write!(f, "Store error: {msg}"),
            DataError::NotFound(msg) => write!(f, "Resource not found: {msg}"),
            DataError::Validation(msg) => write!(f, "Validation error: {msg}"),
            DataError::Downstream(msg) => write!(f, "Downstream error: {msg}"),
            DataError::Unavailable(msg) => write!(f, "Dependency unavailable: {msg}"),
            DataError::Cancelled(msg) => write!(f, "Batch cancelled: {msg}"),
            DataError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            DataError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for DataError {}

impl From<serde_yaml::Error> for DataError {
    fn from(err: serde_yaml::Error) -> Self {
        DataError::Configuration(err.to_string())
    }
}

impl From<validator::ValidationErrors> for DataError {
    fn from(err: validator::ValidationErrors) -> Self {
        DataError::Configuration(err.to_string())
    }
}

/// Result type alias for data-access operations
pub type DataResult<T> = std::result::Result<T, DataError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn with_context(self, context: &str) -> DataResult<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: fmt::Display,
{
    fn with_context(self, context: &str) -> DataResult<T> {
        self.map_err(|e| DataError::Internal(format!("{context}: {e}")))
    }
}

/// Convenience macros for error creation
#[macro_export]
macro_rules! store_error {
    ($msg:expr) => {
        $crate::core::error::DataError::Store($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::DataError::Store(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::core::error::DataError::Internal($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::DataError::Internal(format!($fmt, $($arg)*))
    };
}
