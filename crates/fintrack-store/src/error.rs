//! Error types for fintrack-store

use thiserror::Error;

/// Main error type for the persistence layer
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record violates a uniqueness constraint")]
    Duplicate,

    #[error("Connection pool error: {message}")]
    Pool { message: String },

    #[error("Invalid stored value: {message}")]
    InvalidValue { message: String },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("SQL error: {0}")]
    Sql(rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(error: rusqlite::Error) -> Self {
        match error {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => StoreError::Duplicate,
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY,
                },
                _,
            ) => StoreError::Duplicate,
            error => StoreError::Sql(error),
        }
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(error: r2d2::Error) -> Self {
        StoreError::Pool {
            message: error.to_string(),
        }
    }
}

/// Result type with StoreError
pub type StoreResult<T> = Result<T, StoreError>;
