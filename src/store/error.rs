use thiserror::Error;

/// Database and repository errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to open the database or acquire a connection.
    #[error("database connection error: {0}")]
    Connection(String),

    /// SQL statement execution failed.
    #[error("query execution error: {0}")]
    Query(String),

    /// A primary key or unique constraint rejected the write.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A foreign key or other integrity constraint rejected the write.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Begin, commit or rollback failed.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// A stored value could not be decoded.
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

impl StoreError {
    pub(crate) fn transaction(e: sqlx::Error) -> Self {
        StoreError::Transaction(e.to_string())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::UniqueViolation(db.message().to_string())
            }
            sqlx::Error::Database(db)
                if db.is_foreign_key_violation() || db.is_check_violation() =>
            {
                StoreError::ConstraintViolation(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Connection(e.to_string())
            }
            _ => StoreError::Query(e.to_string()),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
