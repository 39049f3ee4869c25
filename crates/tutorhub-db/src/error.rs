//! Database errors

use thiserror::Error;

/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("record not found")]
    NotFound,

    /// A uniqueness constraint rejected the write
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored value does not map onto the domain model
    #[error("corrupt row: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let constraint = db_err.constraint().unwrap_or("unique").to_string();
                tracing::warn!(constraint = %constraint, "Unique constraint rejected write");
                return Self::Conflict(constraint);
            }
        }
        Self::Sqlx(err)
    }
}

impl From<tutorhub_types::DomainError> for DbError {
    fn from(err: tutorhub_types::DomainError) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result alias for repository calls
pub type DbResult<T> = Result<T, DbError>;
