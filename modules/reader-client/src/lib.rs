pub mod error;

pub use error::{ReaderError, Result};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How long the sidecar itself may spend rendering one page.
const SCRAPE_TIMEOUT_MS: u32 = 30_000;

#[derive(Debug, Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    timeout_ms: u32,
}

/// Normalized extraction result: readable markdown plus page metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapeResponse {
    pub markdown: String,
    #[serde(default)]
    pub metadata: ScrapeMetadata,
    #[serde(default)]
    pub duration_ms: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapeMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, rename = "siteName")]
    pub site_name: String,
    #[serde(default)]
    pub favicon: String,
    #[serde(default, rename = "ogImage")]
    pub og_image: String,
    #[serde(default)]
    pub language: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
}

pub struct ReaderClient {
    client: reqwest::Client,
    base_url: String,
}

impl ReaderClient {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch a URL and extract readable content via the reader's /scrape
    /// endpoint.
    pub async fn scrape(&self, url: &str) -> Result<ScrapeResponse> {
        let endpoint = format!("{}/scrape", self.base_url);
        let body = ScrapeRequest {
            url,
            timeout_ms: SCRAPE_TIMEOUT_MS,
        };

        let resp = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<ErrorBody>()
                .await
                .map(|b| b.error)
                .unwrap_or_default();
            return Err(ReaderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.json::<ScrapeResponse>().await?)
    }
}
