//! Structured error types for API responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::position::PositionError;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication errors
    Unauthenticated,
    InvalidCredentials,
    Forbidden,

    // Validation errors
    MissingRequiredField,
    InvalidFieldValue,
    AlreadyExists,

    // Not found errors
    ProjectNotFound,
    ColumnNotFound,
    TaskNotFound,
    ChecklistNotFound,
    ChecklistItemNotFound,
    CommentNotFound,
    TimeEntryNotFound,
    AttachmentNotFound,
    UserNotFound,

    // Internal errors
    StorageFailure,
    DatabaseError,
    RemoteError,
    InternalError,
}

impl ErrorCode {
    /// HTTP status this code is reported with.
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::Unauthenticated | ErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFieldValue
            | ErrorCode::AlreadyExists => StatusCode::BAD_REQUEST,
            ErrorCode::ProjectNotFound
            | ErrorCode::ColumnNotFound
            | ErrorCode::TaskNotFound
            | ErrorCode::ChecklistNotFound
            | ErrorCode::ChecklistItemNotFound
            | ErrorCode::CommentNotFound
            | ErrorCode::TimeEntryNotFound
            | ErrorCode::AttachmentNotFound
            | ErrorCode::UserNotFound => StatusCode::NOT_FOUND,
            ErrorCode::RemoteError => StatusCode::BAD_GATEWAY,
            ErrorCode::StorageFailure | ErrorCode::DatabaseError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn is_not_found(self) -> bool {
        self.status() == StatusCode::NOT_FOUND
    }

    pub fn is_validation(self) -> bool {
        matches!(
            self,
            ErrorCode::MissingRequiredField | ErrorCode::InvalidFieldValue
        )
    }
}

/// Structured error for API responses.
///
/// Serializes as `{"error": message, "code": CODE, "field": ...}` so that
/// clients reading only the `error` key keep working.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    #[serde(rename = "error")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }

    // Convenience constructors

    pub fn unauthenticated() -> Self {
        Self::new(ErrorCode::Unauthenticated, "Unauthorized")
    }

    pub fn invalid_credentials() -> Self {
        Self::new(ErrorCode::InvalidCredentials, "Invalid email or password")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("{} is required", field),
        )
        .with_field(field)
    }

    /// Missing-field error with a caller-chosen message, for inputs that
    /// require several fields together.
    pub fn missing_fields(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MissingRequiredField, message)
    }

    pub fn invalid_value(field: &str, reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AlreadyExists, message)
    }

    pub fn project_not_found(id: &str) -> Self {
        Self::new(ErrorCode::ProjectNotFound, "Project not found").with_details(id)
    }

    pub fn column_not_found(id: &str) -> Self {
        Self::new(ErrorCode::ColumnNotFound, "Column not found").with_details(id)
    }

    pub fn task_not_found(id: &str) -> Self {
        Self::new(ErrorCode::TaskNotFound, "Task not found").with_details(id)
    }

    pub fn checklist_not_found(id: &str) -> Self {
        Self::new(ErrorCode::ChecklistNotFound, "Checklist not found").with_details(id)
    }

    pub fn checklist_item_not_found(id: &str) -> Self {
        Self::new(ErrorCode::ChecklistItemNotFound, "Checklist item not found").with_details(id)
    }

    pub fn comment_not_found(id: &str) -> Self {
        Self::new(ErrorCode::CommentNotFound, "Comment not found").with_details(id)
    }

    pub fn time_entry_not_found(id: &str) -> Self {
        Self::new(ErrorCode::TimeEntryNotFound, "Time entry not found").with_details(id)
    }

    pub fn attachment_not_found(id: &str) -> Self {
        Self::new(ErrorCode::AttachmentNotFound, "Attachment not found").with_details(id)
    }

    pub fn user_not_found(id: &str) -> Self {
        Self::new(ErrorCode::UserNotFound, "User not found").with_details(id)
    }

    pub fn storage_failure(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::StorageFailure, "Storage operation failed")
            .with_details(err.to_string())
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn remote(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::RemoteError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{} ({})", self.message, details),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ApiError {}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<ApiError>() {
            Ok(api_err) => return api_err,
            Err(err) => err,
        };
        match err.downcast::<rusqlite::Error>() {
            Ok(sql_err) => ApiError::database(sql_err),
            Err(err) => ApiError::internal(err),
        }
    }
}

impl From<PositionError> for ApiError {
    fn from(err: PositionError) -> Self {
        match err {
            PositionError::EmptyBatch => ApiError::missing_fields("Tasks array is required"),
            PositionError::ContainerFull(_) => ApiError::invalid_value("position", err.to_string()),
            other => ApiError::invalid_value("tasks", other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = ?self.code, error = %self, "Request failed");
        }
        (status, axum::Json(self)).into_response()
    }
}

/// Result type for store and API operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
