use thiserror::Error;

/// Crate-root error type for the handful of concerns outside the locking
/// core itself. `locking::error::LockError` converts into this so embedders
/// that want one error type across their call stack can use `?` freely.
#[derive(Error, Debug, Clone)]
pub enum DbError {
    #[error("lock error: {0}")]
    Lock(#[from] crate::locking::error::LockError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DbError>;
