//! Structured error types for engine operations.

use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (rejected before any work)
    MissingRequiredField,
    InvalidFieldValue,
    BatchTooLarge,

    // Not found errors
    TaskNotFound,
    IdentityNotFound,

    // Permission errors
    PermissionDenied,
    AssignmentLocked,

    // Internal errors
    PersistenceFailed,
    DatabaseError,
    InternalError,
}

/// Structured error surfaced by engine operations.
#[derive(Debug, Serialize)]
pub struct EngineError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl EngineError {
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

    // Convenience constructors

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("{} is required", field),
        )
        .with_field(field)
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn batch_too_large(len: usize, limit: usize) -> Self {
        Self::new(
            ErrorCode::BatchTooLarge,
            format!("Too many tasks; limit is {} per request, got {}", limit, len),
        )
    }

    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }

    pub fn identity_not_found(candidate_id: &str) -> Self {
        Self::new(
            ErrorCode::IdentityNotFound,
            format!("No identity found for candidate: {}", candidate_id),
        )
    }

    pub fn permission_denied(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, reason)
    }

    pub fn assignment_locked(task_id: &str) -> Self {
        Self::new(
            ErrorCode::AssignmentLocked,
            format!(
                "Task {} is locked from reassignment (AI-assigned). Staff must force to override.",
                task_id
            ),
        )
    }

    pub fn persistence(task_id: &str, candidate_id: &str, err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::PersistenceFailed,
            format!(
                "Failed to persist assignment of task {} to {}",
                task_id, candidate_id
            ),
        )
        .with_details(err.to_string())
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EngineError {}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<EngineError>() {
            Ok(engine_err) => engine_err,
            Err(err) => EngineError::database(err),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
