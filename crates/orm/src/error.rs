//! Error types for the ORM system
//!
//! Every model operation fails with a [`ModelError`]. Driver failures are kept
//! as a typed [`DbError`] so the retry layers can tell transient network and
//! lock errors apart from constraint or syntax errors.

use std::fmt;
use thiserror::Error;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Classification of a driver-level failure.
///
/// The codes mirror the signatures the mysql client reports, so logs and
/// retry lists stay readable for anyone who has operated the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DbErrorKind {
    /// `ETIMEDOUT`
    TimedOut,
    /// `ECONNRESET`
    ConnectionReset,
    /// `PROTOCOL_CONNECTION_LOST`
    ConnectionLost,
    /// `PROTOCOL_ENQUEUE_AFTER_FATAL_ERROR`
    EnqueueAfterFatal,
    /// `PROTOCOL_SEQUENCE_TIMEOUT`
    SequenceTimeout,
    /// `ER_LOCK_DEADLOCK`
    LockDeadlock,
    /// `ER_LOCK_WAIT_TIMEOUT`
    LockWaitTimeout,
    /// `ER_QUERY_TIMEOUT`
    QueryTimeout,
    /// Anything else, carrying the driver's own code
    Other(String),
}

impl DbErrorKind {
    pub fn code(&self) -> &str {
        match self {
            DbErrorKind::TimedOut => "ETIMEDOUT",
            DbErrorKind::ConnectionReset => "ECONNRESET",
            DbErrorKind::ConnectionLost => "PROTOCOL_CONNECTION_LOST",
            DbErrorKind::EnqueueAfterFatal => "PROTOCOL_ENQUEUE_AFTER_FATAL_ERROR",
            DbErrorKind::SequenceTimeout => "PROTOCOL_SEQUENCE_TIMEOUT",
            DbErrorKind::LockDeadlock => "ER_LOCK_DEADLOCK",
            DbErrorKind::LockWaitTimeout => "ER_LOCK_WAIT_TIMEOUT",
            DbErrorKind::QueryTimeout => "ER_QUERY_TIMEOUT",
            DbErrorKind::Other(code) => code,
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code {
            "ETIMEDOUT" => DbErrorKind::TimedOut,
            "ECONNRESET" => DbErrorKind::ConnectionReset,
            "PROTOCOL_CONNECTION_LOST" => DbErrorKind::ConnectionLost,
            "PROTOCOL_ENQUEUE_AFTER_FATAL_ERROR" => DbErrorKind::EnqueueAfterFatal,
            "PROTOCOL_SEQUENCE_TIMEOUT" => DbErrorKind::SequenceTimeout,
            "ER_LOCK_DEADLOCK" => DbErrorKind::LockDeadlock,
            "ER_LOCK_WAIT_TIMEOUT" => DbErrorKind::LockWaitTimeout,
            "ER_QUERY_TIMEOUT" => DbErrorKind::QueryTimeout,
            other => DbErrorKind::Other(other.to_string()),
        }
    }

    /// Whether the caller-side retry wrapper may re-run an operation that
    /// failed with this kind.
    pub fn is_transient(&self) -> bool {
        !matches!(self, DbErrorKind::Other(_))
    }
}

impl fmt::Display for DbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A failure reported by the connection collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}{}", retry_suffix(.retries))]
pub struct DbError {
    pub kind: DbErrorKind,
    pub message: String,
    /// Number of retries already spent on the statement that produced this error
    pub retries: u32,
}

fn retry_suffix(retries: &u32) -> String {
    if *retries == 0 {
        String::new()
    } else {
        format!(" (after {} retries)", retries)
    }
}

impl DbError {
    pub fn new(kind: DbErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retries: 0,
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

/// Error types for ORM operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Driver or server failure
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Tenant database settings are missing or incomplete
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A model definition cannot be interpreted
    #[error("Improper model definition for '{model}.{field}': {reason}")]
    Definition {
        model: String,
        field: String,
        reason: String,
    },

    /// `find`, `update` or `destroy` was called without a condition
    #[error("{operation} requires a condition")]
    MissingCondition { operation: &'static str },

    /// A lifecycle hook rejected the operation
    #[error("Hook '{stage}' failed: {message}")]
    Hook { stage: &'static str, message: String },

    /// A condition or statement could not be built
    #[error("Query error: {0}")]
    Query(String),

    /// Model key not present in the registry
    #[error("Unknown model '{0}'")]
    UnknownModel(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Connection pool error
    #[error("Connection error: {0}")]
    Connection(String),
}

impl ModelError {
    pub fn definition(
        model: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Definition {
            model: model.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn hook(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Hook {
            stage,
            message: message.into(),
        }
    }

    /// Stable error code for callers that format responses.
    pub fn code(&self) -> &str {
        match self {
            ModelError::Database(err) => err.kind.code(),
            ModelError::Configuration(_) => "E_CONFIG_ERROR",
            ModelError::Definition { .. } => "E_DEFINITION",
            ModelError::MissingCondition { .. } => "E_MISSING_CONDITION",
            ModelError::Hook { .. } => "E_HOOK",
            ModelError::Query(_) => "E_QUERY",
            ModelError::UnknownModel(_) => "E_UNKNOWN_MODEL",
            ModelError::Serialization(_) => "E_SERIALIZATION",
            ModelError::Connection(_) => "E_CONNECTION",
        }
    }

    /// The driver error, if this failure came from the database.
    pub fn db_error(&self) -> Option<&DbError> {
        match self {
            ModelError::Database(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for ModelError {
    fn from(err: serde_yaml::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for ModelError {
    fn from(err: std::io::Error) -> Self {
        ModelError::Configuration(err.to_string())
    }
}
