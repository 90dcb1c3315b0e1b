// Trait abstractions for the pipeline's dependencies.
//
// PageScraper / ContentAnalyzer / ImageHost wrap the sidecar clients;
// the store traits wrap Postgres. Every seam has an in-memory mock in
// `testing`, so the whole pipeline runs deterministically in `cargo test`:
// no network, no database, no Docker.

use async_trait::async_trait;
use uuid::Uuid;

use ai_client::{AnalyzeRequest, AnalyzeResponse};
use folio_common::{Article, CrawlTask, FolioError, SourceType, Tag, User};
use reader_client::ScrapeResponse;

// ---------------------------------------------------------------------------
// External services
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PageScraper: Send + Sync {
    /// Fetch a URL and extract normalized markdown + metadata.
    async fn scrape(&self, url: &str) -> reader_client::Result<ScrapeResponse>;
}

#[async_trait]
impl PageScraper for reader_client::ReaderClient {
    async fn scrape(&self, url: &str) -> reader_client::Result<ScrapeResponse> {
        self.scrape(url).await
    }
}

#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    /// Classify and summarize one article.
    async fn analyze(&self, req: &AnalyzeRequest) -> ai_client::Result<AnalyzeResponse>;
}

#[async_trait]
impl ContentAnalyzer for ai_client::AiClient {
    async fn analyze(&self, req: &AnalyzeRequest) -> ai_client::Result<AnalyzeResponse> {
        self.analyze(req).await
    }
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Download an external image and re-upload it under `key_prefix`.
    /// Returns the rehosted public URL.
    async fn rehost(&self, source_url: &str, key_prefix: &str) -> blob_client::Result<String>;
}

#[async_trait]
impl ImageHost for blob_client::BlobClient {
    async fn rehost(&self, source_url: &str, key_prefix: &str) -> blob_client::Result<String> {
        self.rehost(source_url, key_prefix).await
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// Ready-made content the submitting client may attach, used by the fetch
/// stage as a fallback when extraction fails.
#[derive(Debug, Clone)]
pub struct ClientContent {
    pub title: Option<String>,
    pub author: Option<String>,
    pub site_name: Option<String>,
    pub markdown: String,
}

#[derive(Debug, Clone)]
pub struct CreateArticleParams {
    pub user_id: Uuid,
    pub url: String,
    pub source_type: SourceType,
    pub content: Option<ClientContent>,
}

/// Extraction results persisted by the fetch stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlResult {
    pub title: String,
    pub author: String,
    pub site_name: String,
    pub markdown: String,
    pub cover_image: String,
    pub language: String,
    pub favicon_url: String,
}

/// Classification results persisted by the classify stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiResult {
    pub category_slug: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub confidence: f64,
    pub language: String,
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn create(&self, params: CreateArticleParams) -> Result<Article, FolioError>;

    async fn get(&self, id: Uuid) -> Result<Option<Article>, FolioError>;

    /// Persist extraction results and move the article to `processing`.
    async fn update_crawl_result(&self, id: Uuid, result: CrawlResult) -> Result<(), FolioError>;

    /// Record a fetch failure: error message, retry counter, status `failed`.
    async fn set_fetch_error(&self, id: Uuid, message: &str) -> Result<(), FolioError>;

    /// Persist classification results and move the article to `ready`.
    async fn update_ai_result(&self, id: Uuid, result: AiResult) -> Result<(), FolioError>;

    /// Rewrite the markdown body (image rehosting) and its word count.
    async fn update_markdown(&self, id: Uuid, markdown: &str) -> Result<(), FolioError>;
}

#[derive(Debug, Clone)]
pub struct CreateTaskParams {
    pub article_id: Uuid,
    pub user_id: Uuid,
    pub url: String,
    pub source_type: SourceType,
}

/// CrawlTask transitions. Implementations guard every transition so a
/// terminal row (`done`/`failed`) is never resurrected by a redelivery.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, params: CreateTaskParams) -> Result<CrawlTask, FolioError>;

    async fn get(&self, id: Uuid) -> Result<Option<CrawlTask>, FolioError>;

    async fn mark_crawl_started(&self, id: Uuid) -> Result<(), FolioError>;

    async fn mark_crawl_finished(&self, id: Uuid) -> Result<(), FolioError>;

    async fn mark_ai_started(&self, id: Uuid) -> Result<(), FolioError>;

    /// Terminal success.
    async fn mark_ai_finished(&self, id: Uuid) -> Result<(), FolioError>;

    /// Terminal failure: error message plus retry counter.
    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<(), FolioError>;
}

#[async_trait]
pub trait TagStore: Send + Sync {
    /// Upsert a tag by (user, name). `ai_generated` marks classifier tags.
    async fn create_or_get(
        &self,
        user_id: Uuid,
        name: &str,
        ai_generated: bool,
    ) -> Result<Tag, FolioError>;

    async fn attach(&self, article_id: Uuid, tag_id: Uuid) -> Result<(), FolioError>;
}

/// Outcome of one granted reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaReservation {
    pub used: i32,
    pub limit: i32,
}

/// The quota counters' only write path. `reserve` must be a single atomic
/// conditional update at the storage layer — never read-then-write — so
/// concurrent submissions from one user cannot overshoot the quota.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Atomically reset-or-increment the monthly counter. `None` means the
    /// quota is exhausted for the current month.
    async fn reserve(&self, user_id: Uuid) -> Result<Option<QuotaReservation>, FolioError>;

    /// Compensating decrement (floor at zero) for a submission that failed
    /// after its reservation.
    async fn release(&self, user_id: Uuid) -> Result<(), FolioError>;

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, FolioError>;
}
