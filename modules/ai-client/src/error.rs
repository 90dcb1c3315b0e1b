use thiserror::Error;

pub type Result<T> = std::result::Result<T, AiError>;

#[derive(Debug, Clone, Error)]
pub enum AiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("AI service error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        AiError::Network(err.to_string())
    }
}

impl AiError {
    /// Transport failures and server-side errors are worth another attempt;
    /// a 4xx means the service rejected the content itself.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::Network(_) => true,
            AiError::Api { status, .. } => *status >= 500,
        }
    }
}
