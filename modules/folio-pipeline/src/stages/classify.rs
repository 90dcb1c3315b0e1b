// Classify stage: run the article through the classification sidecar and
// persist category, summary, key points and tags. Terminal on both paths —
// `done` on success, `failed` when the classifier rejects the content.

use std::sync::Arc;

use tracing::{debug, info, warn};

use ai_client::AnalyzeRequest;
use folio_common::FolioError;

use crate::tasks::ClassifyPayload;
use crate::traits::{AiResult, ArticleStore, ContentAnalyzer, TagStore, TaskStore};

pub struct ClassifyStage {
    analyzer: Arc<dyn ContentAnalyzer>,
    articles: Arc<dyn ArticleStore>,
    tasks: Arc<dyn TaskStore>,
    tags: Arc<dyn TagStore>,
}

impl ClassifyStage {
    pub fn new(
        analyzer: Arc<dyn ContentAnalyzer>,
        articles: Arc<dyn ArticleStore>,
        tasks: Arc<dyn TaskStore>,
        tags: Arc<dyn TagStore>,
    ) -> Self {
        Self {
            analyzer,
            articles,
            tasks,
            tags,
        }
    }

    pub async fn process(&self, payload: &ClassifyPayload) -> Result<(), FolioError> {
        match self.tasks.get(payload.task_id).await? {
            None => {
                warn!(task_id = %payload.task_id, "Crawl task record missing, dropping delivery");
                return Ok(());
            }
            Some(task) if task.status.is_terminal() => {
                debug!(
                    task_id = %payload.task_id,
                    status = ?task.status,
                    "Already terminal, ignoring redelivery"
                );
                return Ok(());
            }
            Some(_) => {}
        }

        self.tasks.mark_ai_started(payload.task_id).await?;

        let request = AnalyzeRequest {
            title: payload.title.clone(),
            content: payload.markdown.clone(),
            source: payload.source.clone(),
            author: payload.author.clone(),
        };
        let result = match self.analyzer.analyze(&request).await {
            Ok(result) => result,
            Err(err) if err.is_retryable() => {
                return Err(FolioError::Classification(err.to_string()));
            }
            Err(err) => {
                let message = err.to_string();
                warn!(
                    task_id = %payload.task_id,
                    error = %message,
                    "Classification rejected the article"
                );
                self.tasks.mark_failed(payload.task_id, &message).await?;
                return Ok(());
            }
        };

        self.articles
            .update_ai_result(
                payload.article_id,
                AiResult {
                    category_slug: result.category,
                    summary: result.summary,
                    key_points: result.key_points,
                    confidence: result.confidence,
                    language: result.language,
                },
            )
            .await?;

        // Classifier tags are nice-to-have: a bad tag never fails the stage.
        for name in &result.tags {
            match self.tags.create_or_get(payload.user_id, name, true).await {
                Ok(tag) => {
                    if let Err(err) = self.tags.attach(payload.article_id, tag.id).await {
                        warn!(article_id = %payload.article_id, tag = name.as_str(), error = %err, "Skipping tag attachment");
                    }
                }
                Err(err) => {
                    warn!(user_id = %payload.user_id, tag = name.as_str(), error = %err, "Skipping tag creation");
                }
            }
        }

        self.tasks.mark_ai_finished(payload.task_id).await?;

        info!(
            article_id = %payload.article_id,
            task_id = %payload.task_id,
            "Classification complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        MemoryArticleStore, MemoryTagStore, MemoryTaskStore, MockAnalyzer,
    };
    use crate::traits::{CreateArticleParams, CreateTaskParams};
    use ai_client::{AiError, AnalyzeResponse};
    use folio_common::{ArticleStatus, SourceType, TaskStatus};
    use uuid::Uuid;

    struct Harness {
        stage: ClassifyStage,
        articles: Arc<MemoryArticleStore>,
        tasks: Arc<MemoryTaskStore>,
        tags: Arc<MemoryTagStore>,
    }

    fn harness(analyzer: MockAnalyzer) -> Harness {
        let articles = Arc::new(MemoryArticleStore::new());
        let tasks = Arc::new(MemoryTaskStore::new());
        let tags = Arc::new(MemoryTagStore::new());
        let stage = ClassifyStage::new(
            Arc::new(analyzer),
            articles.clone(),
            tasks.clone(),
            tags.clone(),
        );
        Harness {
            stage,
            articles,
            tasks,
            tags,
        }
    }

    async fn seed(h: &Harness) -> ClassifyPayload {
        let user_id = Uuid::new_v4();
        let url = "https://example.com/post".to_string();
        let article = h
            .articles
            .create(CreateArticleParams {
                user_id,
                url: url.clone(),
                source_type: SourceType::Web,
                content: None,
            })
            .await
            .unwrap();
        let task = h
            .tasks
            .create(CreateTaskParams {
                article_id: article.id,
                user_id,
                url,
                source_type: SourceType::Web,
            })
            .await
            .unwrap();
        // Fetch already ran for this pair.
        h.tasks.mark_crawl_started(task.id).await.unwrap();
        h.tasks.mark_crawl_finished(task.id).await.unwrap();

        ClassifyPayload {
            article_id: article.id,
            task_id: task.id,
            user_id,
            title: "Title".to_string(),
            markdown: "# Body".to_string(),
            source: "Example".to_string(),
            author: "Author".to_string(),
        }
    }

    fn analysis() -> AnalyzeResponse {
        AnalyzeResponse {
            category: "tech".to_string(),
            category_name: "Technology".to_string(),
            confidence: 0.92,
            tags: vec!["rust".to_string(), "async".to_string()],
            summary: "A summary.".to_string(),
            key_points: vec!["point one".to_string(), "point two".to_string()],
            language: "en".to_string(),
        }
    }

    #[tokio::test]
    async fn success_persists_results_and_finishes() {
        let h = harness(MockAnalyzer::succeeding(analysis()));
        let payload = seed(&h).await;

        h.stage.process(&payload).await.unwrap();

        let article = h.articles.get_sync(payload.article_id).unwrap();
        assert_eq!(article.status, ArticleStatus::Ready);
        assert_eq!(article.summary.as_deref(), Some("A summary."));
        assert_eq!(article.key_points.len(), 2);
        assert_eq!(article.ai_confidence, Some(0.92));

        let task = h.tasks.get_sync(payload.task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Done);
        assert!(task.ai_started_at.is_some());
        assert!(task.ai_finished_at.is_some());

        // Both classifier tags were created for the user and attached.
        let attached = h.tags.attached_to(payload.article_id);
        assert_eq!(attached.len(), 2);
        assert!(h.tags.tag_names(payload.user_id).contains(&"rust".to_string()));
    }

    #[tokio::test]
    async fn permanent_failure_marks_failed() {
        let h = harness(MockAnalyzer::failing(AiError::Api {
            status: 400,
            message: "content too short".into(),
        }));
        let payload = seed(&h).await;

        h.stage.process(&payload).await.unwrap();

        let task = h.tasks.get_sync(payload.task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error_message.is_some());
        assert_eq!(task.retry_count, 1);

        // The article never reached ready.
        let article = h.articles.get_sync(payload.article_id).unwrap();
        assert_ne!(article.status, ArticleStatus::Ready);
    }

    #[tokio::test]
    async fn transient_failure_is_retryable() {
        let h = harness(MockAnalyzer::failing(AiError::Network("timeout".into())));
        let payload = seed(&h).await;

        let err = h.stage.process(&payload).await.unwrap_err();
        assert!(matches!(err, FolioError::Classification(_)));

        let task = h.tasks.get_sync(payload.task_id).unwrap();
        assert_eq!(task.status, TaskStatus::AiProcessing);
    }

    #[tokio::test]
    async fn tag_failures_are_swallowed() {
        let h = harness(MockAnalyzer::succeeding(analysis()));
        h.tags.fail_attaches();
        let payload = seed(&h).await;

        h.stage.process(&payload).await.unwrap();

        // Stage still completed.
        assert_eq!(
            h.tasks.get_sync(payload.task_id).unwrap().status,
            TaskStatus::Done
        );
        assert!(h.tags.attached_to(payload.article_id).is_empty());
    }

    #[tokio::test]
    async fn redelivery_of_failed_task_is_a_no_op() {
        let h = harness(MockAnalyzer::succeeding(analysis()));
        let payload = seed(&h).await;
        h.tasks.mark_failed(payload.task_id, "boom").await.unwrap();

        h.stage.process(&payload).await.unwrap();

        let task = h.tasks.get_sync(payload.task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        // Never reprocessed: the article was not classified.
        let article = h.articles.get_sync(payload.article_id).unwrap();
        assert!(article.summary.is_none());
    }
}
