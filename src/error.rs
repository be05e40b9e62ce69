use anyhow::anyhow;
use serde::Serialize;

use crate::models::TaskId;

pub type Result<T> = std::result::Result<T, LibError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Conflict,
    Database,
    InvalidInput,
    NotFound,
    Unauthorized,
    Unknown,
}

/// Structured payloads attached to errors that need more than a message,
/// serialized into API error bodies for the client to render.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiErrorDetails {
    /// The dependency graph is not a DAG; `path` walks one offending cycle
    /// (first and last entries are the same task).
    CycleDetected { path: Vec<TaskId> },
}

#[derive(Debug)]
pub struct LibError {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub public: &'static str,
    pub details: Option<ApiErrorDetails>,
    pub source: anyhow::Error,
}

impl LibError {
    pub fn conflict_with_details(
        code: &'static str,
        public: &'static str,
        details: ApiErrorDetails,
        source: anyhow::Error,
    ) -> Self {
        Self {
            kind: ErrorKind::Conflict,
            code,
            public,
            details: Some(details),
            source,
        }
    }

    pub fn database(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Database,
            code: "database_error",
            public,
            details: None,
            source,
        }
    }

    pub fn invalid(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            code: "invalid_input",
            public,
            details: None,
            source,
        }
    }

    pub fn invalid_with_code(
        code: &'static str,
        public: &'static str,
        source: anyhow::Error,
    ) -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            code,
            public,
            details: None,
            source,
        }
    }

    pub fn not_found(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::NotFound,
            code: "not_found",
            public,
            details: None,
            source,
        }
    }

    pub fn unauthorized(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Unauthorized,
            code: "unauthorized",
            public,
            details: None,
            source,
        }
    }

    pub fn unknown(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Unknown,
            code: "unknown_error",
            public,
            details: None,
            source,
        }
    }

    pub fn message(public: &'static str) -> Self {
        Self::unknown(public, anyhow!(public))
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for LibError {
    fn from(value: sqlx::Error) -> Self {
        Self::database("Database request failed", anyhow!(value))
    }
}
