//! Error types for fintrack-core

use fintrack_store::StoreError;
use thiserror::Error;

/// Main error type for business logic
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Invalid credentials")]
    Unauthorized,

    #[error("Storage error: {0}")]
    Store(StoreError),

    #[error("Upstream service error: {message}")]
    Upstream { message: String },
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        CoreError::NotFound {
            resource: resource.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        CoreError::Upstream {
            message: message.into(),
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => CoreError::NotFound {
                resource: "Record".to_string(),
            },
            StoreError::Duplicate => CoreError::Conflict {
                message: "A record with the same unique fields already exists".to_string(),
            },
            error => CoreError::Store(error),
        }
    }
}

/// Result type with CoreError
pub type CoreResult<T> = Result<T, CoreError>;
