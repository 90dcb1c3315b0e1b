pub mod error;

pub use error::{AiError, Result};

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeRequest {
    pub title: String,
    pub content: String,
    pub source: String,
    pub author: String,
}

/// Classification output: category slug plus reader-facing enrichment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeResponse {
    pub category: String,
    #[serde(default)]
    pub category_name: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub language: String,
}

pub struct AiClient {
    client: reqwest::Client,
    base_url: String,
}

impl AiClient {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Classify and summarize one article via the sidecar's /api/analyze
    /// endpoint.
    pub async fn analyze(&self, req: &AnalyzeRequest) -> Result<AnalyzeResponse> {
        let endpoint = format!("{}/api/analyze", self.base_url);

        let resp = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.json::<AnalyzeResponse>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_are_retryable() {
        assert!(AiError::Network("timeout".into()).is_retryable());
    }

    #[test]
    fn rejection_is_permanent() {
        let err = AiError::Api {
            status: 400,
            message: "content too short".into(),
        };
        assert!(!err.is_retryable());
    }
}
