//! Error types for the registry layer

use thiserror::Error;

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// The store could not be reached; whether a binding exists is unknown.
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    #[error("registry query failed: {0}")]
    Query(String),

    #[error("registry migration failed: {0}")]
    Migration(String),

    #[error("invalid registry entry: {0}")]
    Validation(String),
}

impl RegistryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RegistryError::Unavailable(_))
    }
}

impl From<sqlx::Error> for RegistryError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => RegistryError::Unavailable(error.to_string()),
            other => RegistryError::Query(other.to_string()),
        }
    }
}
