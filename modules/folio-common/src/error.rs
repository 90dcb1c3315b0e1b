use thiserror::Error;

#[derive(Error, Debug)]
pub enum FolioError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("monthly quota exceeded")]
    QuotaExceeded,

    #[error("not found")]
    NotFound,

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("classification error: {0}")]
    Classification(String),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("validation error: {0}")]
    Validation(String),
}
