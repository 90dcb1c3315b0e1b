use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::AiClient;
use blob_client::BlobClient;
use folio_api::{AppState, JwtService};
use folio_common::Config;
use folio_pipeline::queue::{MemoryQueue, QueueDriver, TaskQueue};
use folio_pipeline::stages::{ClassifyStage, FetchStage, MediaStage};
use folio_pipeline::store::{self, PgArticleStore, PgTagStore, PgTaskStore, PgUserStore};
use folio_pipeline::{PipelineRunner, QuotaGate, SubmissionService};
use reader_client::ReaderClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("folio=info".parse()?))
        .init();

    info!("Folio server starting...");

    let config = Config::from_env();

    // Postgres + migrations
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    store::migrate(&pool).await?;

    // Stores
    let articles = Arc::new(PgArticleStore::new(pool.clone()));
    let tasks = Arc::new(PgTaskStore::new(pool.clone()));
    let tags = Arc::new(PgTagStore::new(pool.clone()));
    let users = Arc::new(PgUserStore::new(pool.clone()));

    // Sidecar clients
    let scraper = Arc::new(ReaderClient::new(&config.reader_url));
    let analyzer = Arc::new(AiClient::new(&config.ai_service_url));

    // Image rehosting is optional: enabled only with full R2 config.
    let media = config.r2.as_ref().map(|r2| {
        MediaStage::new(
            Arc::new(BlobClient::new(
                &r2.endpoint,
                &r2.access_key,
                &r2.secret_key,
                &r2.bucket_name,
                &r2.public_url,
            )),
            articles.clone(),
        )
    });
    let media_enabled = media.is_some();
    info!(media_enabled, "Image rehosting configured");

    // Queue + worker pool. The in-process driver keeps the whole pipeline
    // in one deployment; a broker-backed QueueDriver slots in here for
    // multi-node setups.
    let queue = MemoryQueue::new();
    let fetch = FetchStage::new(
        scraper,
        articles.clone(),
        tasks.clone(),
        Arc::new(queue.clone()) as Arc<dyn TaskQueue>,
        media_enabled,
    );
    let classify = ClassifyStage::new(analyzer, articles.clone(), tasks.clone(), tags.clone());
    let runner = Arc::new(PipelineRunner::new(
        Arc::new(queue.clone()) as Arc<dyn QueueDriver>,
        fetch,
        classify,
        media,
        config.worker_concurrency,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner_handle = tokio::spawn(runner.run(shutdown_rx));

    // API
    let submissions = SubmissionService::new(
        QuotaGate::new(users.clone()),
        articles,
        tasks.clone(),
        tags,
        Arc::new(queue) as Arc<dyn TaskQueue>,
    );
    let state = Arc::new(AppState {
        submissions,
        tasks,
        users,
        jwt: JwtService::new(&config.jwt_secret, "folio".to_string()),
    });
    let app = folio_api::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!(addr = addr.as_str(), "Folio API listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    // Let in-flight pipeline work finish before exiting.
    let _ = shutdown_tx.send(true);
    runner_handle.await?;

    Ok(())
}
