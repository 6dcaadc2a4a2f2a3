use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Ordering error: {0}")]
    Ordering(#[from] core_ordering::OrderingError),
}

impl CoreError {
    /// Whether the caller sent a bad request rather than the service failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Ordering(err) if err.is_client_error())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
