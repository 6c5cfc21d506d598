use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid record id returned for {expected}@{entity}: got {actual}")]
    IdMismatch {
        entity: String,
        expected: String,
        actual: String,
    },

    #[error("Record has no '{0}' value to address it remotely")]
    MissingId(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;

impl<T> From<std::sync::PoisonError<T>> for ModelError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
