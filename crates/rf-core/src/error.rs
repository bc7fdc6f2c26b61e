//! # AppError
//!
//! Centralized error handling for the Rusty-Feed ecosystem.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

/// The primary error type for all rf-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Post, Comment, Topic)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Invariant violation (e.g., double vote, author change, empty content)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// No authenticated identity on a request that needs one
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not the owner or an admin
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Precondition on the save relation failed
    #[error("conflict: {0}")]
    Conflict(String),

    /// Media collaborator failure (e.g., disk full, unreachable host)
    #[error("media storage error: {0}")]
    Storage(String),

    /// Infrastructure failure (e.g., DB down)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        AppError::NotFound(entity.to_string(), id.to_string())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::ValidationError(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(message.into())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{err:#}"))
    }
}

/// A specialized Result type for Rusty-Feed logic.
pub type Result<T> = std::result::Result<T, AppError>;
