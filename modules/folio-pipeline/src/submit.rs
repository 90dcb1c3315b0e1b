// Submission entry point, invoked by the API layer. Gates on quota, writes
// the Article and CrawlTask records, then hands off to the queue. A fetch
// task is enqueued for every successful submission — even when the caller
// supplied ready-made markdown, the fetch stage owns the decision between
// server-fetched and client content.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use folio_common::{FolioError, SourceType};

use crate::queue::TaskQueue;
use crate::quota::{QuotaDecision, QuotaGate};
use crate::tasks::{FetchPayload, PipelineTask};
use crate::traits::{
    ArticleStore, ClientContent, CreateArticleParams, CreateTaskParams, TagStore, TaskStore,
};

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub url: String,
    pub content: Option<ClientContent>,
    pub tag_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub article_id: Uuid,
    pub task_id: Uuid,
}

#[derive(Clone)]
pub struct SubmissionService {
    quota: QuotaGate,
    articles: Arc<dyn ArticleStore>,
    tasks: Arc<dyn TaskStore>,
    tags: Arc<dyn TagStore>,
    queue: Arc<dyn TaskQueue>,
}

impl SubmissionService {
    pub fn new(
        quota: QuotaGate,
        articles: Arc<dyn ArticleStore>,
        tasks: Arc<dyn TaskStore>,
        tags: Arc<dyn TagStore>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            quota,
            articles,
            tasks,
            tags,
            queue,
        }
    }

    pub async fn submit(
        &self,
        user_id: Uuid,
        request: SubmitRequest,
    ) -> Result<SubmitReceipt, FolioError> {
        match self.quota.check_and_reserve(user_id).await? {
            QuotaDecision::Granted { .. } => {}
            QuotaDecision::Exceeded => return Err(FolioError::QuotaExceeded),
        }

        // Every write past this point compensates on failure: one policy,
        // every branch — a dead submission must not charge the user.
        match self.create_and_enqueue(user_id, request).await {
            Ok(receipt) => {
                info!(
                    %user_id,
                    article_id = %receipt.article_id,
                    task_id = %receipt.task_id,
                    "Submission accepted"
                );
                Ok(receipt)
            }
            Err(err) => {
                if let Err(release_err) = self.quota.release(user_id).await {
                    warn!(
                        %user_id,
                        error = %release_err,
                        "Failed to release quota after submission failure"
                    );
                }
                Err(err)
            }
        }
    }

    async fn create_and_enqueue(
        &self,
        user_id: Uuid,
        request: SubmitRequest,
    ) -> Result<SubmitReceipt, FolioError> {
        let source_type = SourceType::from_url(&request.url);

        let article = self
            .articles
            .create(CreateArticleParams {
                user_id,
                url: request.url.clone(),
                source_type,
                content: request.content,
            })
            .await?;

        let task = self
            .tasks
            .create(CreateTaskParams {
                article_id: article.id,
                user_id,
                url: request.url.clone(),
                source_type,
            })
            .await?;

        // Caller-picked tags are an enhancement, not a correctness
        // requirement: log and keep going.
        for tag_id in &request.tag_ids {
            if let Err(err) = self.tags.attach(article.id, *tag_id).await {
                warn!(article_id = %article.id, %tag_id, error = %err, "Skipping tag attachment");
            }
        }

        self.queue
            .enqueue(PipelineTask::Fetch(FetchPayload {
                article_id: article.id,
                task_id: task.id,
                user_id,
                url: request.url,
            }))
            .await?;

        Ok(SubmitReceipt {
            article_id: article.id,
            task_id: task.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        FailingTaskStore, MemoryArticleStore, MemoryQuotaStore, MemoryTagStore, MemoryTaskStore,
        RecordingQueue,
    };
    use folio_common::{ArticleStatus, TaskStatus};

    struct Harness {
        service: SubmissionService,
        quota_store: Arc<MemoryQuotaStore>,
        articles: Arc<MemoryArticleStore>,
        tasks: Arc<MemoryTaskStore>,
        tags: Arc<MemoryTagStore>,
        queue: Arc<RecordingQueue>,
        user_id: Uuid,
    }

    fn harness(quota: i32) -> Harness {
        let quota_store = Arc::new(MemoryQuotaStore::new());
        let user_id = quota_store.add_user(quota);
        let articles = Arc::new(MemoryArticleStore::new());
        let tasks = Arc::new(MemoryTaskStore::new());
        let tags = Arc::new(MemoryTagStore::new());
        let queue = Arc::new(RecordingQueue::new());

        let service = SubmissionService::new(
            QuotaGate::new(quota_store.clone()),
            articles.clone(),
            tasks.clone(),
            tags.clone(),
            queue.clone(),
        );

        Harness {
            service,
            quota_store,
            articles,
            tasks,
            tags,
            queue,
            user_id,
        }
    }

    fn plain_request(url: &str) -> SubmitRequest {
        SubmitRequest {
            url: url.to_string(),
            content: None,
            tag_ids: vec![],
        }
    }

    #[tokio::test]
    async fn submit_creates_records_and_enqueues_fetch() {
        let h = harness(5);

        let receipt = h
            .service
            .submit(h.user_id, plain_request("https://example.com/post"))
            .await
            .unwrap();

        let article = h.articles.get_sync(receipt.article_id).expect("article");
        assert_eq!(article.status, ArticleStatus::Pending);
        assert_eq!(article.url, "https://example.com/post");

        let task = h.tasks.get_sync(receipt.task_id).expect("task");
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.article_id, receipt.article_id);

        let enqueued = h.queue.tasks();
        assert_eq!(enqueued.len(), 1);
        match &enqueued[0] {
            PipelineTask::Fetch(p) => {
                assert_eq!(p.article_id, receipt.article_id);
                assert_eq!(p.task_id, receipt.task_id);
                assert_eq!(p.url, "https://example.com/post");
            }
            other => panic!("expected fetch task, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_is_enqueued_even_with_client_content() {
        let h = harness(5);

        let request = SubmitRequest {
            url: "https://example.com/post".to_string(),
            content: Some(ClientContent {
                title: Some("Client Title".to_string()),
                author: None,
                site_name: None,
                markdown: "# Ready-made".to_string(),
            }),
            tag_ids: vec![],
        };
        h.service.submit(h.user_id, request).await.unwrap();

        let enqueued = h.queue.tasks();
        assert_eq!(enqueued.len(), 1);
        assert!(matches!(enqueued[0], PipelineTask::Fetch(_)));
    }

    #[tokio::test]
    async fn quota_exceeded_writes_nothing() {
        let h = harness(0);

        let err = h
            .service
            .submit(h.user_id, plain_request("https://example.com/post"))
            .await
            .unwrap_err();

        assert!(matches!(err, FolioError::QuotaExceeded));
        assert_eq!(h.articles.len(), 0);
        assert_eq!(h.tasks.len(), 0);
        assert!(h.queue.tasks().is_empty());
    }

    #[tokio::test]
    async fn task_create_failure_releases_quota() {
        let quota_store = Arc::new(MemoryQuotaStore::new());
        let user_id = quota_store.add_user(5);
        let articles = Arc::new(MemoryArticleStore::new());
        let queue = Arc::new(RecordingQueue::new());

        let service = SubmissionService::new(
            QuotaGate::new(quota_store.clone()),
            articles.clone(),
            Arc::new(FailingTaskStore),
            Arc::new(MemoryTagStore::new()),
            queue.clone(),
        );

        let err = service
            .submit(user_id, plain_request("https://example.com/post"))
            .await
            .unwrap_err();

        assert!(matches!(err, FolioError::Database(_)));
        // The reserved slot was handed back.
        assert_eq!(quota_store.get(user_id).current_month_count, 0);
        assert!(queue.tasks().is_empty());
    }

    #[tokio::test]
    async fn enqueue_failure_releases_quota() {
        let h = harness(5);
        h.queue.fail_enqueues();

        let err = h
            .service
            .submit(h.user_id, plain_request("https://example.com/post"))
            .await
            .unwrap_err();

        assert!(matches!(err, FolioError::Queue(_)));
        assert_eq!(h.quota_store.get(h.user_id).current_month_count, 0);
    }

    #[tokio::test]
    async fn tag_attach_failure_is_non_fatal() {
        let h = harness(5);
        h.tags.fail_attaches();

        let receipt = h
            .service
            .submit(
                h.user_id,
                SubmitRequest {
                    url: "https://example.com/post".to_string(),
                    content: None,
                    tag_ids: vec![Uuid::new_v4(), Uuid::new_v4()],
                },
            )
            .await
            .unwrap();

        // Submission went through; quota stays charged.
        assert!(h.tasks.get_sync(receipt.task_id).is_some());
        assert_eq!(h.quota_store.get(h.user_id).current_month_count, 1);
        assert_eq!(h.queue.tasks().len(), 1);
    }

    #[tokio::test]
    async fn source_type_is_detected_from_hostname() {
        let h = harness(5);

        let receipt = h
            .service
            .submit(
                h.user_id,
                plain_request("https://www.youtube.com/watch?v=abc"),
            )
            .await
            .unwrap();

        let article = h.articles.get_sync(receipt.article_id).unwrap();
        assert_eq!(article.source_type, SourceType::Youtube);
    }
}
