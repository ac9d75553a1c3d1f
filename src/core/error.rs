use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Pool error: {0}")]
    Pool(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Wrap a failure raised by the backend driver.
    ///
    /// The underlying error is kept as the source so callers can inspect
    /// the original failure after retries are exhausted.
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Backend(err.into())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClientError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}
