use std::fmt;

use chrono::NaiveDate;
use thiserror::Error;

/// What kind of server-side entity a lookup was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Account,
    Mailbox,
    Calendar,
    Message,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Account => "account",
            Self::Mailbox => "mailbox",
            Self::Calendar => "calendar",
            Self::Message => "message",
        };
        f.write_str(name)
    }
}

/// Bad caller input, detected before any network activity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid argument `{field}`: {reason}")]
    InvalidArgument { field: String, reason: String },

    #[error("Invalid date in `{field}`: {value:?} (expected YYYY-MM-DD)")]
    InvalidDate { field: String, value: String },

    #[error("Invalid date range: date_start {start} is after date_end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Invalid sort field {0:?} (expected receivedAt, sentAt or subject)")]
    InvalidSortField(String),
}

impl ValidationError {
    pub fn invalid_argument(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failures reported by the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Request timed out")]
    Timeout,

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Authentication failed: {0}")]
    AuthFailure(String),
}

impl From<reqwest::Error> for ExecutionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::TransportFailure(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("{kind} {id} no longer exists")]
    StaleReference { kind: EntityKind, id: String },

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("JMAP error: {method} failed - {error_type}: {description}")]
    Jmap {
        method: String,
        error_type: String,
        description: String,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Stable machine-readable code for the error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(ValidationError::InvalidArgument { .. }) => "InvalidArgument",
            Self::Validation(ValidationError::InvalidDate { .. }) => "InvalidDate",
            Self::Validation(ValidationError::InvalidRange { .. }) => "InvalidRange",
            Self::Validation(ValidationError::InvalidSortField(_)) => "InvalidSortField",
            Self::NotFound { .. } => "NotFound",
            Self::StaleReference { .. } => "StaleReference",
            Self::Execution(ExecutionError::Timeout) => "Timeout",
            Self::Execution(ExecutionError::TransportFailure(_)) => "TransportFailure",
            Self::Execution(ExecutionError::AuthFailure(_)) => "AuthFailure",
            Self::Jmap { .. } => "JmapError",
            Self::Config(_) => "ConfigError",
            Self::Io(_) => "IoError",
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Execution(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
