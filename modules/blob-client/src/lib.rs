pub mod error;

pub use error::{BlobError, Result};

use std::time::Duration;

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tracing::debug;

pub struct BlobClient {
    s3: aws_sdk_s3::Client,
    http: reqwest::Client,
    bucket: String,
    public_url: String,
}

impl BlobClient {
    pub fn new(
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        public_url: &str,
    ) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");
        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(endpoint)
            .region(Region::new("auto"))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            s3: aws_sdk_s3::Client::from_conf(config),
            http,
            bucket: bucket.to_string(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Store bytes under `key` and return the public URL.
    pub async fn upload(&self, key: &str, body: Bytes, content_type: &str) -> Result<String> {
        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| BlobError::Upload(e.to_string()))?;

        Ok(format!("{}/{key}", self.public_url))
    }

    /// Download an externally-hosted image and re-upload it under a
    /// content-addressed key. Returns the rehosted public URL.
    pub async fn rehost(&self, source_url: &str, key_prefix: &str) -> Result<String> {
        let resp = self.http.get(source_url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BlobError::DownloadStatus(status.as_u16()));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let data = resp.bytes().await?;
        let key = derive_key(key_prefix, &data, &content_type);

        debug!(source_url, key = key.as_str(), "Rehosting image");
        self.upload(&key, data, &content_type).await
    }
}

/// Content-addressed storage key: prefix + short sha256 + inferred extension.
fn derive_key(prefix: &str, data: &[u8], content_type: &str) -> String {
    let hash = hex::encode(Sha256::digest(data));
    format!(
        "{}/{}{}",
        prefix.trim_end_matches('/'),
        &hash[..16],
        extension_for(content_type)
    )
}

/// Map a Content-Type to a file extension. Unknown image types come back
/// as .jpg, matching what most CDNs serve untyped.
fn extension_for(content_type: &str) -> &'static str {
    if content_type.contains("png") {
        ".png"
    } else if content_type.contains("gif") {
        ".gif"
    } else if content_type.contains("webp") {
        ".webp"
    } else if content_type.contains("svg") {
        ".svg"
    } else {
        ".jpg"
    }
}
