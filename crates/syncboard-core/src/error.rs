// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for syncboard-core.
//!
//! Provides a unified error type that maps to wire `ERROR` messages.

use std::fmt;

use syncboard_protocol::ErrorPayload;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur during request processing.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum CoreError {
    /// Task was not found in the database.
    TaskNotFound {
        /// The task ID that was not found.
        task_id: String,
    },

    /// A stored column value is not one of the board columns.
    InvalidColumn {
        /// The offending value.
        value: String,
    },

    /// Database operation failed.
    DatabaseError {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },

    /// Anything else that escaped a handler.
    Internal {
        /// Error details.
        details: String,
    },
}

impl CoreError {
    /// Convert this error to a wire `ERROR` payload.
    pub fn to_error_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.error_code().to_string(),
            message: self.to_string(),
            task_id: match self {
                Self::TaskNotFound { task_id } => Some(task_id.clone()),
                _ => None,
            },
        }
    }

    /// Get the wire error code for this error type.
    ///
    /// Database failures are re-raised as internal errors on the wire; the
    /// distinction only matters for logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TaskNotFound { .. } => "NOT_FOUND",
            Self::InvalidColumn { .. } | Self::DatabaseError { .. } | Self::Internal { .. } => {
                "INTERNAL_ERROR"
            }
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaskNotFound { task_id } => {
                write!(f, "Task '{}' not found", task_id)
            }
            Self::InvalidColumn { value } => {
                write!(f, "'{}' is not a board column", value)
            }
            Self::DatabaseError { operation, details } => {
                write!(f, "Database error during '{}': {}", operation, details)
            }
            Self::Internal { details } => {
                write!(f, "Internal error: {}", details)
            }
        }
    }
}

impl std::error::Error for CoreError {}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::DatabaseError {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Internal {
            details: err.to_string(),
        }
    }
}
