//! SQL backend error types

use thiserror::Error;

/// Errors raised by SQL backends
#[derive(Debug, Error)]
pub enum DbError {
    /// Could not reach the database
    #[error("Database connection error: {0}")]
    Connection(String),

    /// The database rejected or failed a statement
    #[error("{0}")]
    Query(String),

    /// A result could not be decoded
    #[error("Failed to decode result: {0}")]
    Decode(String),

    /// Backend is misconfigured
    #[error("Invalid database configuration: {0}")]
    Configuration(String),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => DbError::Query(db.message().to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DbError::Connection(err.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DbError::Decode(err.to_string())
            }
            other => DbError::Query(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for DbError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DbError::Decode(err.to_string())
        } else {
            DbError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Decode(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
