// Test mocks for the pipeline's trait seams.
//
// One mock per boundary:
// - MockScraper / MockAnalyzer / MockImageHost — scripted sidecar behavior
// - MemoryArticleStore / MemoryTaskStore / MemoryTagStore — stateful
//   in-memory rows with the same transition guards as the SQL stores
// - MemoryQuotaStore — the atomic reserve contract under one lock
// - RecordingQueue — captures enqueued tasks for assertions
//
// Everything is deterministic: no network, no database, no Docker.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use uuid::Uuid;

use ai_client::{AiError, AnalyzeRequest, AnalyzeResponse};
use folio_common::{
    Article, ArticleStatus, CrawlTask, FolioError, Tag, TaskStatus, User,
};
use reader_client::{ReaderError, ScrapeResponse};

use crate::queue::TaskQueue;
use crate::tasks::PipelineTask;
use crate::traits::{
    AiResult, ArticleStore, ContentAnalyzer, CrawlResult, CreateArticleParams, CreateTaskParams,
    ImageHost, PageScraper, QuotaReservation, QuotaStore, TagStore, TaskStore,
};

// ---------------------------------------------------------------------------
// MockScraper
// ---------------------------------------------------------------------------

enum ScrapeBehavior {
    Succeed(ScrapeResponse),
    Fail(ReaderError),
    Hang,
}

/// Scripted extraction sidecar.
pub struct MockScraper {
    behavior: ScrapeBehavior,
    calls: Mutex<Vec<String>>,
}

impl MockScraper {
    pub fn succeeding(response: ScrapeResponse) -> Self {
        Self {
            behavior: ScrapeBehavior::Succeed(response),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ReaderError) -> Self {
        Self {
            behavior: ScrapeBehavior::Fail(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Never answers — for exercising the runner's per-task timeout.
    pub fn hanging() -> Self {
        Self {
            behavior: ScrapeBehavior::Hang,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageScraper for MockScraper {
    async fn scrape(&self, url: &str) -> reader_client::Result<ScrapeResponse> {
        self.calls.lock().unwrap().push(url.to_string());
        match &self.behavior {
            ScrapeBehavior::Succeed(response) => Ok(response.clone()),
            ScrapeBehavior::Fail(error) => Err(error.clone()),
            ScrapeBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ReaderError::Network("hung".into()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MockAnalyzer
// ---------------------------------------------------------------------------

/// Scripted classification sidecar.
pub struct MockAnalyzer {
    result: Result<AnalyzeResponse, AiError>,
    requests: Mutex<Vec<AnalyzeRequest>>,
}

impl MockAnalyzer {
    pub fn succeeding(response: AnalyzeResponse) -> Self {
        Self {
            result: Ok(response),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: AiError) -> Self {
        Self {
            result: Err(error),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<AnalyzeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentAnalyzer for MockAnalyzer {
    async fn analyze(&self, req: &AnalyzeRequest) -> ai_client::Result<AnalyzeResponse> {
        self.requests.lock().unwrap().push(req.clone());
        match &self.result {
            Ok(response) => Ok(response.clone()),
            Err(error) => Err(error.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockImageHost
// ---------------------------------------------------------------------------

/// URL→rehosted-URL map. Unregistered URLs fail, as a dead CDN would.
pub struct MockImageHost {
    hosted: HashMap<String, String>,
}

impl MockImageHost {
    pub fn new() -> Self {
        Self {
            hosted: HashMap::new(),
        }
    }

    pub fn hosting(mut self, source_url: &str, rehosted_url: &str) -> Self {
        self.hosted
            .insert(source_url.to_string(), rehosted_url.to_string());
        self
    }
}

#[async_trait]
impl ImageHost for MockImageHost {
    async fn rehost(&self, source_url: &str, _key_prefix: &str) -> blob_client::Result<String> {
        match self.hosted.get(source_url) {
            Some(url) => Ok(url.clone()),
            None => Err(blob_client::BlobError::DownloadStatus(404)),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingQueue
// ---------------------------------------------------------------------------

/// Captures every enqueued task for assertions.
pub struct RecordingQueue {
    tasks: Mutex<Vec<PipelineTask>>,
    fail: AtomicBool,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// Make every subsequent enqueue fail.
    pub fn fail_enqueues(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn tasks(&self) -> Vec<PipelineTask> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskQueue for RecordingQueue {
    async fn enqueue(&self, task: PipelineTask) -> Result<(), FolioError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(FolioError::Queue("broker unavailable".to_string()));
        }
        self.tasks.lock().unwrap().push(task);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryArticleStore
// ---------------------------------------------------------------------------

pub struct MemoryArticleStore {
    rows: Mutex<HashMap<Uuid, Article>>,
    categories: Mutex<HashMap<String, Uuid>>,
}

impl MemoryArticleStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            categories: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_sync(&self, id: Uuid) -> Option<Article> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn category_id(&self, slug: &str) -> Uuid {
        let mut categories = self.categories.lock().unwrap();
        *categories
            .entry(slug.to_string())
            .or_insert_with(Uuid::new_v4)
    }
}

fn char_count(s: &str) -> i32 {
    s.chars().count() as i32
}

#[async_trait]
impl ArticleStore for MemoryArticleStore {
    async fn create(&self, params: CreateArticleParams) -> Result<Article, FolioError> {
        let now = Utc::now();
        let content = params.content;
        let article = Article {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            url: params.url,
            title: content.as_ref().and_then(|c| c.title.clone()),
            author: content.as_ref().and_then(|c| c.author.clone()),
            site_name: content.as_ref().and_then(|c| c.site_name.clone()),
            favicon_url: None,
            cover_image_url: None,
            markdown_content: content.as_ref().map(|c| c.markdown.clone()),
            word_count: content.as_ref().map(|c| char_count(&c.markdown)).unwrap_or(0),
            language: None,
            category_id: None,
            summary: None,
            key_points: Vec::new(),
            ai_confidence: None,
            status: ArticleStatus::Pending,
            source_type: params.source_type,
            fetch_error: None,
            retry_count: 0,
            is_favorite: false,
            is_archived: false,
            read_progress: 0.0,
            last_read_at: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().insert(article.id, article.clone());
        Ok(article)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Article>, FolioError> {
        Ok(self.get_sync(id))
    }

    async fn update_crawl_result(&self, id: Uuid, result: CrawlResult) -> Result<(), FolioError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(article) = rows.get_mut(&id) {
            article.title = Some(result.title);
            article.author = Some(result.author);
            article.site_name = Some(result.site_name);
            article.cover_image_url = Some(result.cover_image);
            article.language = Some(result.language);
            article.favicon_url = Some(result.favicon_url);
            article.word_count = char_count(&result.markdown);
            article.markdown_content = Some(result.markdown);
            article.status = ArticleStatus::Processing;
            article.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_fetch_error(&self, id: Uuid, message: &str) -> Result<(), FolioError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(article) = rows.get_mut(&id) {
            article.fetch_error = Some(message.to_string());
            article.retry_count += 1;
            article.status = ArticleStatus::Failed;
            article.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_ai_result(&self, id: Uuid, result: AiResult) -> Result<(), FolioError> {
        let category_id = self.category_id(&result.category_slug);
        let mut rows = self.rows.lock().unwrap();
        if let Some(article) = rows.get_mut(&id) {
            article.category_id = Some(category_id);
            article.summary = Some(result.summary);
            article.key_points = result.key_points;
            article.ai_confidence = Some(result.confidence);
            article.language = Some(result.language);
            article.status = ArticleStatus::Ready;
            article.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_markdown(&self, id: Uuid, markdown: &str) -> Result<(), FolioError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(article) = rows.get_mut(&id) {
            article.markdown_content = Some(markdown.to_string());
            article.word_count = char_count(markdown);
            article.updated_at = Utc::now();
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryTaskStore
// ---------------------------------------------------------------------------

/// In-memory CrawlTask rows with the same transition guards as the SQL
/// store, plus a transition history for monotonicity assertions.
pub struct MemoryTaskStore {
    rows: Mutex<HashMap<Uuid, CrawlTask>>,
    history: Mutex<HashMap<Uuid, Vec<TaskStatus>>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            history: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_sync(&self, id: Uuid) -> Option<CrawlTask> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every status the task has held, in write order.
    pub fn status_history(&self, id: Uuid) -> Vec<TaskStatus> {
        self.history.lock().unwrap().get(&id).cloned().unwrap_or_default()
    }

    fn transition<F>(&self, id: Uuid, allowed: F, apply: impl FnOnce(&mut CrawlTask))
    where
        F: Fn(TaskStatus) -> bool,
    {
        let mut rows = self.rows.lock().unwrap();
        if let Some(task) = rows.get_mut(&id) {
            if allowed(task.status) {
                apply(task);
                task.updated_at = Utc::now();
                self.history
                    .lock()
                    .unwrap()
                    .entry(id)
                    .or_default()
                    .push(task.status);
            }
        }
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create(&self, params: CreateTaskParams) -> Result<CrawlTask, FolioError> {
        let now = Utc::now();
        let task = CrawlTask {
            id: Uuid::new_v4(),
            article_id: params.article_id,
            user_id: params.user_id,
            url: params.url,
            source_type: params.source_type,
            status: TaskStatus::Queued,
            crawl_started_at: None,
            crawl_finished_at: None,
            ai_started_at: None,
            ai_finished_at: None,
            error_message: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().insert(task.id, task.clone());
        self.history
            .lock()
            .unwrap()
            .entry(task.id)
            .or_default()
            .push(TaskStatus::Queued);
        Ok(task)
    }

    async fn get(&self, id: Uuid) -> Result<Option<CrawlTask>, FolioError> {
        Ok(self.get_sync(id))
    }

    async fn mark_crawl_started(&self, id: Uuid) -> Result<(), FolioError> {
        self.transition(
            id,
            |s| matches!(s, TaskStatus::Queued | TaskStatus::Crawling),
            |task| {
                task.status = TaskStatus::Crawling;
                task.crawl_started_at = Some(Utc::now());
            },
        );
        Ok(())
    }

    async fn mark_crawl_finished(&self, id: Uuid) -> Result<(), FolioError> {
        self.transition(
            id,
            |s| !s.is_terminal(),
            |task| task.crawl_finished_at = Some(Utc::now()),
        );
        Ok(())
    }

    async fn mark_ai_started(&self, id: Uuid) -> Result<(), FolioError> {
        self.transition(
            id,
            |s| !s.is_terminal(),
            |task| {
                task.status = TaskStatus::AiProcessing;
                task.ai_started_at = Some(Utc::now());
            },
        );
        Ok(())
    }

    async fn mark_ai_finished(&self, id: Uuid) -> Result<(), FolioError> {
        self.transition(
            id,
            |s| !s.is_terminal(),
            |task| {
                task.status = TaskStatus::Done;
                task.ai_finished_at = Some(Utc::now());
            },
        );
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<(), FolioError> {
        self.transition(
            id,
            |s| !s.is_terminal(),
            |task| {
                task.status = TaskStatus::Failed;
                task.error_message = Some(message.to_string());
                task.retry_count += 1;
            },
        );
        Ok(())
    }
}

/// Every TaskStore call fails with a database error, for exercising the
/// submission compensation path.
pub struct FailingTaskStore;

#[async_trait]
impl TaskStore for FailingTaskStore {
    async fn create(&self, _params: CreateTaskParams) -> Result<CrawlTask, FolioError> {
        Err(FolioError::Database(sqlx::Error::PoolClosed))
    }

    async fn get(&self, _id: Uuid) -> Result<Option<CrawlTask>, FolioError> {
        Err(FolioError::Database(sqlx::Error::PoolClosed))
    }

    async fn mark_crawl_started(&self, _id: Uuid) -> Result<(), FolioError> {
        Err(FolioError::Database(sqlx::Error::PoolClosed))
    }

    async fn mark_crawl_finished(&self, _id: Uuid) -> Result<(), FolioError> {
        Err(FolioError::Database(sqlx::Error::PoolClosed))
    }

    async fn mark_ai_started(&self, _id: Uuid) -> Result<(), FolioError> {
        Err(FolioError::Database(sqlx::Error::PoolClosed))
    }

    async fn mark_ai_finished(&self, _id: Uuid) -> Result<(), FolioError> {
        Err(FolioError::Database(sqlx::Error::PoolClosed))
    }

    async fn mark_failed(&self, _id: Uuid, _message: &str) -> Result<(), FolioError> {
        Err(FolioError::Database(sqlx::Error::PoolClosed))
    }
}

// ---------------------------------------------------------------------------
// MemoryTagStore
// ---------------------------------------------------------------------------

pub struct MemoryTagStore {
    tags: Mutex<HashMap<(Uuid, String), Tag>>,
    attachments: Mutex<HashSet<(Uuid, Uuid)>>,
    fail_attaches: AtomicBool,
}

impl MemoryTagStore {
    pub fn new() -> Self {
        Self {
            tags: Mutex::new(HashMap::new()),
            attachments: Mutex::new(HashSet::new()),
            fail_attaches: AtomicBool::new(false),
        }
    }

    /// Make every subsequent attach fail.
    pub fn fail_attaches(&self) {
        self.fail_attaches.store(true, Ordering::SeqCst);
    }

    pub fn attached_to(&self, article_id: Uuid) -> Vec<Uuid> {
        self.attachments
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| *a == article_id)
            .map(|(_, t)| *t)
            .collect()
    }

    pub fn tag_names(&self, user_id: Uuid) -> Vec<String> {
        self.tags
            .lock()
            .unwrap()
            .keys()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, name)| name.clone())
            .collect()
    }
}

#[async_trait]
impl TagStore for MemoryTagStore {
    async fn create_or_get(
        &self,
        user_id: Uuid,
        name: &str,
        ai_generated: bool,
    ) -> Result<Tag, FolioError> {
        let mut tags = self.tags.lock().unwrap();
        let tag = tags
            .entry((user_id, name.to_string()))
            .or_insert_with(|| Tag {
                id: Uuid::new_v4(),
                user_id,
                name: name.to_string(),
                is_ai_generated: ai_generated,
                article_count: 0,
                created_at: Utc::now(),
            });
        Ok(tag.clone())
    }

    async fn attach(&self, article_id: Uuid, tag_id: Uuid) -> Result<(), FolioError> {
        if self.fail_attaches.load(Ordering::SeqCst) {
            return Err(FolioError::Database(sqlx::Error::PoolClosed));
        }
        self.attachments.lock().unwrap().insert((article_id, tag_id));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryQuotaStore
// ---------------------------------------------------------------------------

/// Implements the reserve contract the SQL store provides with one
/// conditional UPDATE: the whole check-and-increment happens under a single
/// lock, so concurrent callers serialize exactly as row-level update
/// semantics would.
pub struct MemoryQuotaStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_user(&self, monthly_quota: i32) -> Uuid {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: None,
            nickname: None,
            monthly_quota,
            current_month_count: 0,
            quota_reset_at: None,
            created_at: now,
            updated_at: now,
        };
        let id = user.id;
        self.users.lock().unwrap().insert(id, user);
        id
    }

    pub fn set_counters(&self, id: Uuid, count: i32, reset_at: Option<DateTime<Utc>>) {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&id).expect("unknown test user");
        user.current_month_count = count;
        user.quota_reset_at = reset_at;
    }

    pub fn get(&self, id: Uuid) -> User {
        self.users.lock().unwrap().get(&id).expect("unknown test user").clone()
    }
}

fn month_key(t: DateTime<Utc>) -> (i32, u32) {
    (t.year(), t.month())
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn reserve(&self, user_id: Uuid) -> Result<Option<QuotaReservation>, FolioError> {
        let now = Utc::now();
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&user_id).ok_or(FolioError::NotFound)?;

        let new_month = match user.quota_reset_at {
            None => true,
            Some(reset_at) => month_key(reset_at) < month_key(now),
        };

        if new_month {
            user.current_month_count = 1;
            user.quota_reset_at = Some(now);
        } else if user.current_month_count < user.monthly_quota {
            user.current_month_count += 1;
        } else {
            return Ok(None);
        }
        user.updated_at = now;

        Ok(Some(QuotaReservation {
            used: user.current_month_count,
            limit: user.monthly_quota,
        }))
    }

    async fn release(&self, user_id: Uuid) -> Result<(), FolioError> {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.get_mut(&user_id) {
            user.current_month_count = (user.current_month_count - 1).max(0);
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, FolioError> {
        Ok(self.users.lock().unwrap().get(&user_id).cloned())
    }
}
