// End-to-end pipeline runs: submission → queue → worker pool → stages,
// entirely against the in-memory queue and mock seams.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use uuid::Uuid;

use ai_client::AnalyzeResponse;
use folio_common::{ArticleStatus, TaskStatus};
use folio_pipeline::queue::MemoryQueue;
use folio_pipeline::quota::QuotaGate;
use folio_pipeline::runner::PipelineRunner;
use folio_pipeline::stages::{ClassifyStage, FetchStage, MediaStage};
use folio_pipeline::submit::{SubmissionService, SubmitRequest};
use folio_pipeline::testing::{
    MemoryArticleStore, MemoryQuotaStore, MemoryTagStore, MemoryTaskStore, MockAnalyzer,
    MockImageHost, MockScraper,
};
use folio_pipeline::traits::ClientContent;
use reader_client::{ReaderError, ScrapeMetadata, ScrapeResponse};

struct Pipeline {
    service: SubmissionService,
    runner: Arc<PipelineRunner>,
    queue: MemoryQueue,
    articles: Arc<MemoryArticleStore>,
    tasks: Arc<MemoryTaskStore>,
    scraper: Arc<MockScraper>,
    analyzer: Arc<MockAnalyzer>,
    user_id: Uuid,
}

fn pipeline(scraper: MockScraper, analyzer: MockAnalyzer, host: MockImageHost) -> Pipeline {
    let queue = MemoryQueue::with_backoff(Duration::from_millis(2));
    let articles = Arc::new(MemoryArticleStore::new());
    let tasks = Arc::new(MemoryTaskStore::new());
    let tags = Arc::new(MemoryTagStore::new());
    let quota_store = Arc::new(MemoryQuotaStore::new());
    let user_id = quota_store.add_user(10);

    let scraper = Arc::new(scraper);
    let analyzer = Arc::new(analyzer);

    let service = SubmissionService::new(
        QuotaGate::new(quota_store),
        articles.clone(),
        tasks.clone(),
        tags.clone(),
        Arc::new(queue.clone()),
    );

    let fetch = FetchStage::new(
        scraper.clone(),
        articles.clone(),
        tasks.clone(),
        Arc::new(queue.clone()),
        true,
    );
    let classify = ClassifyStage::new(analyzer.clone(), articles.clone(), tasks.clone(), tags);
    let media = MediaStage::new(Arc::new(host), articles.clone());

    let runner = Arc::new(PipelineRunner::new(
        Arc::new(queue.clone()),
        fetch,
        classify,
        Some(media),
        4,
    ));

    Pipeline {
        service,
        runner,
        queue,
        articles,
        tasks,
        scraper,
        analyzer,
        user_id,
    }
}

fn scraped(markdown: &str) -> ScrapeResponse {
    ScrapeResponse {
        markdown: markdown.to_string(),
        metadata: ScrapeMetadata {
            title: "Scraped Title".to_string(),
            author: "Scraped Author".to_string(),
            site_name: "Scraped Site".to_string(),
            og_image: "https://example.com/cover.jpg".to_string(),
            language: "en".to_string(),
            favicon: "https://example.com/favicon.ico".to_string(),
            ..Default::default()
        },
        duration_ms: 5,
    }
}

fn analysis() -> AnalyzeResponse {
    AnalyzeResponse {
        category: "tech".to_string(),
        category_name: "Technology".to_string(),
        confidence: 0.9,
        tags: vec!["rust".to_string()],
        summary: "A summary.".to_string(),
        key_points: vec!["one".to_string()],
        language: "en".to_string(),
    }
}

fn plain_request(url: &str) -> SubmitRequest {
    SubmitRequest {
        url: url.to_string(),
        content: None,
        tag_ids: vec![],
    }
}

/// Poll until `predicate` holds or the budget runs out.
async fn wait_for(mut predicate: impl FnMut() -> bool) {
    for _ in 0..500 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

fn assert_monotonic(history: &[TaskStatus]) {
    fn rank(status: TaskStatus) -> u8 {
        match status {
            TaskStatus::Queued => 0,
            TaskStatus::Crawling => 1,
            TaskStatus::AiProcessing => 2,
            TaskStatus::Done | TaskStatus::Failed => 3,
        }
    }
    for pair in history.windows(2) {
        assert!(
            rank(pair[0]) <= rank(pair[1]),
            "status went backwards: {history:?}"
        );
        assert!(
            !pair[0].is_terminal(),
            "write observed after terminal state: {history:?}"
        );
    }
}

#[tokio::test]
async fn submission_flows_through_to_done() {
    let markdown = "# Post\n\n![a](https://cdn.example.com/a.jpg)\n\n![b](https://cdn.example.com/b.png)";
    let p = pipeline(
        MockScraper::succeeding(scraped(markdown)),
        MockAnalyzer::succeeding(analysis()),
        MockImageHost::new()
            .hosting("https://cdn.example.com/a.jpg", "https://r2.folio.app/a")
            .hosting("https://cdn.example.com/b.png", "https://r2.folio.app/b"),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = tokio::spawn(p.runner.clone().run(shutdown_rx));

    let receipt = p
        .service
        .submit(p.user_id, plain_request("https://example.com/post"))
        .await
        .unwrap();

    let tasks = p.tasks.clone();
    wait_for(|| {
        tasks
            .get_sync(receipt.task_id)
            .is_some_and(|t| t.status == TaskStatus::Done)
    })
    .await;

    // Media runs behind classification; wait for the rewrite too.
    let articles = p.articles.clone();
    wait_for(|| {
        articles
            .get_sync(receipt.article_id)
            .and_then(|a| a.markdown_content)
            .is_some_and(|m| m.contains("https://r2.folio.app/a"))
    })
    .await;

    let article = p.articles.get_sync(receipt.article_id).unwrap();
    assert_eq!(article.status, ArticleStatus::Ready);
    assert_eq!(article.summary.as_deref(), Some("A summary."));
    assert!(!article.markdown_content.unwrap().contains("cdn.example.com"));

    let task = p.tasks.get_sync(receipt.task_id).unwrap();
    assert!(task.crawl_started_at.is_some());
    assert!(task.crawl_finished_at.is_some());
    assert!(task.ai_started_at.is_some());
    assert!(task.ai_finished_at.is_some());
    assert_monotonic(&p.tasks.status_history(receipt.task_id));

    shutdown_tx.send(true).unwrap();
    runner.await.unwrap();
}

#[tokio::test]
async fn fetch_failure_with_client_content_reaches_done() {
    let p = pipeline(
        MockScraper::failing(ReaderError::Network("scrape timeout".into())),
        MockAnalyzer::succeeding(analysis()),
        MockImageHost::new(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = tokio::spawn(p.runner.clone().run(shutdown_rx));

    let client_md = "# Client Content\n\nFallback body.";
    let receipt = p
        .service
        .submit(
            p.user_id,
            SubmitRequest {
                url: "https://example.com/post".to_string(),
                content: Some(ClientContent {
                    title: Some("Client Title".to_string()),
                    author: None,
                    site_name: None,
                    markdown: client_md.to_string(),
                }),
                tag_ids: vec![],
            },
        )
        .await
        .unwrap();

    let tasks = p.tasks.clone();
    wait_for(|| {
        tasks
            .get_sync(receipt.task_id)
            .is_some_and(|t| t.status == TaskStatus::Done)
    })
    .await;

    // The classifier saw the client markdown verbatim.
    let requests = p.analyzer.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].content, client_md);
    assert_eq!(requests[0].source, "web");

    let task = p.tasks.get_sync(receipt.task_id).unwrap();
    assert!(task.error_message.is_none());
    assert_monotonic(&p.tasks.status_history(receipt.task_id));

    shutdown_tx.send(true).unwrap();
    runner.await.unwrap();
}

#[tokio::test]
async fn fetch_failure_without_content_is_terminal() {
    let p = pipeline(
        MockScraper::failing(ReaderError::Api {
            status: 404,
            message: "page not found".into(),
        }),
        MockAnalyzer::succeeding(analysis()),
        MockImageHost::new(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = tokio::spawn(p.runner.clone().run(shutdown_rx));

    let receipt = p
        .service
        .submit(p.user_id, plain_request("https://example.com/missing"))
        .await
        .unwrap();

    let tasks = p.tasks.clone();
    wait_for(|| {
        tasks
            .get_sync(receipt.task_id)
            .is_some_and(|t| t.status == TaskStatus::Failed)
    })
    .await;

    let task = p.tasks.get_sync(receipt.task_id).unwrap();
    assert!(task.error_message.as_deref().is_some_and(|m| !m.is_empty()));

    // No classification was ever attempted.
    assert!(p.analyzer.requests().is_empty());
    assert_monotonic(&p.tasks.status_history(receipt.task_id));

    shutdown_tx.send(true).unwrap();
    runner.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn hung_fetch_times_out_and_exhausts_retries() {
    let p = pipeline(
        MockScraper::hanging(),
        MockAnalyzer::succeeding(analysis()),
        MockImageHost::new(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = tokio::spawn(p.runner.clone().run(shutdown_rx));

    let receipt = p
        .service
        .submit(p.user_id, plain_request("https://example.com/slow"))
        .await
        .unwrap();

    // First delivery plus the whole fetch retry budget, every one timing
    // out under virtual time.
    let scraper = p.scraper.clone();
    wait_for(|| scraper.calls().len() == 4).await;
    let queue = p.queue.clone();
    wait_for(move || queue.depth() == 0).await;

    // Budget exhausted: the record stays where the last attempt left it.
    let task = p.tasks.get_sync(receipt.task_id).unwrap();
    assert_eq!(task.status, TaskStatus::Crawling);
    assert!(p.analyzer.requests().is_empty());

    shutdown_tx.send(true).unwrap();
    runner.await.unwrap();
}

#[tokio::test]
async fn media_total_failure_never_touches_pipeline_state() {
    let markdown = "![a](https://cdn.example.com/a.jpg)";
    let p = pipeline(
        MockScraper::succeeding(scraped(markdown)),
        MockAnalyzer::succeeding(analysis()),
        MockImageHost::new(), // every download fails
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = tokio::spawn(p.runner.clone().run(shutdown_rx));

    let receipt = p
        .service
        .submit(p.user_id, plain_request("https://example.com/post"))
        .await
        .unwrap();

    let tasks = p.tasks.clone();
    wait_for(|| {
        tasks
            .get_sync(receipt.task_id)
            .is_some_and(|t| t.status == TaskStatus::Done)
    })
    .await;
    let queue = p.queue.clone();
    wait_for(move || queue.depth() == 0).await;

    let article = p.articles.get_sync(receipt.article_id).unwrap();
    assert_eq!(article.status, ArticleStatus::Ready);
    // References stay external; nothing was marked failed.
    assert_eq!(article.markdown_content.as_deref(), Some(markdown));
    assert!(article.fetch_error.is_none());
    assert_eq!(
        p.tasks.get_sync(receipt.task_id).unwrap().status,
        TaskStatus::Done
    );

    shutdown_tx.send(true).unwrap();
    runner.await.unwrap();
}
