use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReaderError>;

#[derive(Debug, Clone, Error)]
pub enum ReaderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Reader error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for ReaderError {
    fn from(err: reqwest::Error) -> Self {
        ReaderError::Network(err.to_string())
    }
}

impl ReaderError {
    /// Transport failures and server-side errors are worth another attempt;
    /// a 4xx means the reader looked at the URL and gave up.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReaderError::Network(_) => true,
            ReaderError::Api { status, .. } => *status >= 500,
        }
    }
}
