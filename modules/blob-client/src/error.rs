use thiserror::Error;

pub type Result<T> = std::result::Result<T, BlobError>;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Download error: {0}")]
    Download(String),

    #[error("Download failed (status {0})")]
    DownloadStatus(u16),

    #[error("Upload error: {0}")]
    Upload(String),
}

impl From<reqwest::Error> for BlobError {
    fn from(err: reqwest::Error) -> Self {
        BlobError::Download(err.to_string())
    }
}
