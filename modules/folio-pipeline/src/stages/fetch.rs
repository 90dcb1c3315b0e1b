// Fetch stage: extract readable content for a submitted URL, then hand the
// article to classification. When extraction fails but the submitting
// client attached its own markdown, that content is used instead and the
// task still counts as crawled — the fallback absorbs the failure.

use std::sync::Arc;

use tracing::{debug, info, warn};

use folio_common::{FolioError, TaskStatus};
use reader_client::ScrapeResponse;

use crate::images::extract_image_urls;
use crate::queue::TaskQueue;
use crate::tasks::{ClassifyPayload, FetchPayload, MediaPayload, PipelineTask};
use crate::traits::{ArticleStore, CrawlResult, PageScraper, TaskStore};

/// Label used when neither extraction nor the client supplied a site name.
const DEFAULT_SOURCE: &str = "web";

pub struct FetchStage {
    scraper: Arc<dyn PageScraper>,
    articles: Arc<dyn ArticleStore>,
    tasks: Arc<dyn TaskStore>,
    queue: Arc<dyn TaskQueue>,
    media_enabled: bool,
}

impl FetchStage {
    pub fn new(
        scraper: Arc<dyn PageScraper>,
        articles: Arc<dyn ArticleStore>,
        tasks: Arc<dyn TaskStore>,
        queue: Arc<dyn TaskQueue>,
        media_enabled: bool,
    ) -> Self {
        Self {
            scraper,
            articles,
            tasks,
            queue,
            media_enabled,
        }
    }

    pub async fn process(&self, payload: &FetchPayload) -> Result<(), FolioError> {
        // At-least-once queues redeliver: skip work that already moved past
        // this stage instead of reprocessing it.
        match self.tasks.get(payload.task_id).await? {
            None => {
                warn!(task_id = %payload.task_id, "Crawl task record missing, dropping delivery");
                return Ok(());
            }
            Some(task)
                if !matches!(task.status, TaskStatus::Queued | TaskStatus::Crawling) =>
            {
                debug!(
                    task_id = %payload.task_id,
                    status = ?task.status,
                    "Already past fetch, ignoring redelivery"
                );
                return Ok(());
            }
            Some(_) => {}
        }

        self.tasks.mark_crawl_started(payload.task_id).await?;

        match self.scraper.scrape(&payload.url).await {
            Ok(response) => self.commit_extraction(payload, response).await,
            Err(err) => self.handle_extraction_failure(payload, err).await,
        }
    }

    async fn commit_extraction(
        &self,
        payload: &FetchPayload,
        response: ScrapeResponse,
    ) -> Result<(), FolioError> {
        self.articles
            .update_crawl_result(
                payload.article_id,
                CrawlResult {
                    title: response.metadata.title.clone(),
                    author: response.metadata.author.clone(),
                    site_name: response.metadata.site_name.clone(),
                    markdown: response.markdown.clone(),
                    cover_image: response.metadata.og_image.clone(),
                    language: response.metadata.language.clone(),
                    favicon_url: response.metadata.favicon.clone(),
                },
            )
            .await?;

        self.tasks.mark_crawl_finished(payload.task_id).await?;

        let source = if response.metadata.site_name.is_empty() {
            DEFAULT_SOURCE.to_string()
        } else {
            response.metadata.site_name.clone()
        };
        self.queue
            .enqueue(PipelineTask::Classify(ClassifyPayload {
                article_id: payload.article_id,
                task_id: payload.task_id,
                user_id: payload.user_id,
                title: response.metadata.title,
                markdown: response.markdown.clone(),
                source,
                author: response.metadata.author,
            }))
            .await?;

        // Image rehosting is best-effort and only for server-fetched
        // markdown; a failed enqueue must not fail the fetch.
        if self.media_enabled {
            let image_urls = extract_image_urls(&response.markdown);
            if !image_urls.is_empty() {
                let count = image_urls.len();
                let media = PipelineTask::Media(MediaPayload {
                    article_id: payload.article_id,
                    image_urls,
                });
                if let Err(err) = self.queue.enqueue(media).await {
                    warn!(
                        article_id = %payload.article_id,
                        error = %err,
                        "Failed to enqueue image rehosting"
                    );
                } else {
                    debug!(article_id = %payload.article_id, count, "Enqueued image rehosting");
                }
            }
        }

        info!(
            article_id = %payload.article_id,
            task_id = %payload.task_id,
            "Fetch complete"
        );
        Ok(())
    }

    async fn handle_extraction_failure(
        &self,
        payload: &FetchPayload,
        err: reader_client::ReaderError,
    ) -> Result<(), FolioError> {
        // Fallback: client-supplied markdown stands in for the fetch. A
        // failed article lookup counts as "no usable content".
        if let Ok(Some(article)) = self.articles.get(payload.article_id).await {
            if article.has_client_content() {
                info!(
                    article_id = %payload.article_id,
                    error = %err,
                    "Extraction failed, falling back to client content"
                );
                self.tasks.mark_crawl_finished(payload.task_id).await?;

                let source = article
                    .site_name
                    .clone()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_SOURCE.to_string());
                self.queue
                    .enqueue(PipelineTask::Classify(ClassifyPayload {
                        article_id: payload.article_id,
                        task_id: payload.task_id,
                        user_id: payload.user_id,
                        title: article.title.clone().unwrap_or_default(),
                        markdown: article.markdown_content.clone().unwrap_or_default(),
                        source,
                        author: article.author.clone().unwrap_or_default(),
                    }))
                    .await?;
                return Ok(());
            }
        }

        if err.is_retryable() {
            // Leave the record in `crawling`; the queue redelivers until
            // the retry budget runs out.
            return Err(FolioError::Extraction(err.to_string()));
        }

        let message = err.to_string();
        warn!(
            article_id = %payload.article_id,
            task_id = %payload.task_id,
            error = %message,
            "Extraction failed with no usable fallback"
        );
        self.tasks.mark_failed(payload.task_id, &message).await?;
        self.articles
            .set_fetch_error(payload.article_id, &message)
            .await?;
        Ok(())
    }
}
