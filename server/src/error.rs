//! Error types for the TodoLists server.
//!
//! This module defines the error hierarchy used throughout the server.
//!
//! # Error Types
//!
//! - [`ValidationError`] - A list or todo name was rejected
//! - [`NotFoundError`] - A list index or todo id does not exist
//! - [`StoreError`] - Either of the above, returned by store operations that
//!   can fail both ways
//! - [`ServerError`] - Infrastructure failures (config, session storage)
//!
//! Store errors are always recoverable: the HTTP layer renders them inline or
//! turns them into a redirect with a flash message. Only [`ServerError`] ever
//! becomes an error status.
//!
//! # Example
//!
//! ```rust
//! use todolists_server::error::{StoreError, ValidationError};
//!
//! let err: StoreError = ValidationError::DuplicateName.into();
//! assert_eq!(err.to_string(), "List name must be unique.");
//! ```

use std::error::Error;
use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error as ThisError;
use tracing::error;

use crate::config::ConfigError;
use crate::session::SessionError;

/// A name submitted for a list or todo failed validation.
///
/// The display strings are shown to the user verbatim.
#[derive(ThisError, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// The trimmed list name is empty or longer than 100 characters.
    #[error("List name must be between 1 and 100 characters.")]
    InvalidListNameLength,

    /// The trimmed todo text is empty or longer than 100 characters.
    #[error("Todo must be between 1 and 100 characters.")]
    InvalidTodoLength,

    /// Another list in the session already uses this name.
    #[error("List name must be unique.")]
    DuplicateName,
}

/// A list or todo reference did not resolve.
#[derive(ThisError, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundError {
    /// No list exists at the given position.
    #[error("The specified list was not found.")]
    List {
        /// The position that was requested.
        index: usize,
    },

    /// The list exists but holds no todo with the given id.
    #[error("The specified todo was not found.")]
    Todo {
        /// Position of the list that was searched.
        list_index: usize,
        /// The todo id that was requested.
        todo_id: u64,
    },
}

/// Failure of a store operation that both validates input and looks up a list.
#[derive(ThisError, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),
}

/// Top-level error type for server infrastructure.
///
/// These are the only errors that surface as an HTTP error status. Everything
/// the user can cause through a form is a [`StoreError`] instead.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error during server initialization.
    Config(ConfigError),

    /// Session storage refused or lost a session.
    Session(SessionError),

    /// Unexpected internal server error.
    Internal(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "configuration error: {err}"),
            Self::Session(err) => write!(f, "session error: {err}"),
            Self::Internal(msg) => write!(f, "internal server error: {msg}"),
        }
    }
}

impl Error for ServerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Session(err) => Some(err),
            Self::Internal(_) => None,
        }
    }
}

impl From<ConfigError> for ServerError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<SessionError> for ServerError {
    fn from(err: SessionError) -> Self {
        Self::Session(err)
    }
}

impl ServerError {
    /// Creates a new internal error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use todolists_server::error::ServerError;
    ///
    /// let err = ServerError::internal("listener closed");
    /// assert!(matches!(err, ServerError::Internal(_)));
    /// ```
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns `true` if the failure is attributable to load rather than a bug.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Session(SessionError::AtCapacity { .. }))
    }

    /// Returns `true` if this error indicates a server-side problem.
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// The HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Session(SessionError::AtCapacity { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, status.canonical_reason().unwrap_or("error")).into_response()
    }
}

/// A specialized Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_are_user_facing() {
        assert_eq!(
            ValidationError::InvalidListNameLength.to_string(),
            "List name must be between 1 and 100 characters."
        );
        assert_eq!(
            ValidationError::InvalidTodoLength.to_string(),
            "Todo must be between 1 and 100 characters."
        );
        assert_eq!(
            ValidationError::DuplicateName.to_string(),
            "List name must be unique."
        );
    }

    #[test]
    fn not_found_messages_are_user_facing() {
        assert_eq!(
            NotFoundError::List { index: 3 }.to_string(),
            "The specified list was not found."
        );
        assert_eq!(
            NotFoundError::Todo {
                list_index: 0,
                todo_id: 9
            }
            .to_string(),
            "The specified todo was not found."
        );
    }

    #[test]
    fn store_error_is_transparent() {
        let err: StoreError = ValidationError::DuplicateName.into();
        assert_eq!(err.to_string(), "List name must be unique.");

        let err: StoreError = NotFoundError::List { index: 1 }.into();
        assert_eq!(err.to_string(), "The specified list was not found.");
    }

    #[test]
    fn from_errors_work_with_question_mark() {
        fn inner() -> std::result::Result<(), StoreError> {
            let _: () = Err(NotFoundError::List { index: 0 })?;
            Ok(())
        }

        assert!(matches!(
            inner().unwrap_err(),
            StoreError::NotFound(NotFoundError::List { index: 0 })
        ));
    }

    #[test]
    fn server_error_session_displays_correctly() {
        let err = ServerError::from(SessionError::AtCapacity { max_capacity: 5 });
        assert_eq!(
            err.to_string(),
            "session error: session store at maximum capacity (5 sessions)"
        );
    }

    #[test]
    fn server_error_internal_displays_correctly() {
        let err = ServerError::internal("listener closed");
        assert_eq!(err.to_string(), "internal server error: listener closed");
    }

    #[test]
    fn capacity_errors_map_to_service_unavailable() {
        let err = ServerError::from(SessionError::AtCapacity { max_capacity: 1 });
        assert!(err.is_client_error());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn other_errors_map_to_internal_server_error() {
        let err = ServerError::from(ConfigError::ValidationError("bad".to_string()));
        assert!(err.is_server_error());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ServerError::internal("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn server_error_source_returns_inner_error() {
        let err = ServerError::from(SessionError::AtCapacity { max_capacity: 2 });
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("session store at maximum capacity (2 sessions)".to_string())
        );
        assert!(ServerError::internal("x").source().is_none());
    }

    #[test]
    fn into_response_uses_status_code() {
        let response = ServerError::from(SessionError::AtCapacity { max_capacity: 1 }).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
