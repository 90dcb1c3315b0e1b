use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use folio_common::{CrawlTask, FolioError};

use crate::traits::{CreateTaskParams, TaskStore};

const TASK_COLUMNS: &str = "id, article_id, user_id, url, source_type, status, \
     crawl_started_at, crawl_finished_at, ai_started_at, ai_finished_at, \
     error_message, retry_count, created_at, updated_at";

/// CrawlTask persistence. Every transition statement carries its own guard
/// on the current status, so forward-only movement holds even when a
/// redelivered queue message races a finished task: the terminal row
/// simply matches zero rows.
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn create(&self, params: CreateTaskParams) -> Result<CrawlTask, FolioError> {
        let task = sqlx::query_as::<_, CrawlTask>(&format!(
            r#"
            INSERT INTO crawl_tasks (article_id, user_id, url, source_type)
            VALUES ($1, $2, $3, $4)
            RETURNING {TASK_COLUMNS}
            "#,
        ))
        .bind(params.article_id)
        .bind(params.user_id)
        .bind(&params.url)
        .bind(params.source_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(task)
    }

    async fn get(&self, id: Uuid) -> Result<Option<CrawlTask>, FolioError> {
        let task = sqlx::query_as::<_, CrawlTask>(&format!(
            "SELECT {TASK_COLUMNS} FROM crawl_tasks WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(task)
    }

    async fn mark_crawl_started(&self, id: Uuid) -> Result<(), FolioError> {
        sqlx::query(
            r#"
            UPDATE crawl_tasks
            SET status = 'crawling', crawl_started_at = now(), updated_at = now()
            WHERE id = $1 AND status IN ('queued', 'crawling')
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_crawl_finished(&self, id: Uuid) -> Result<(), FolioError> {
        sqlx::query(
            r#"
            UPDATE crawl_tasks
            SET crawl_finished_at = now(), updated_at = now()
            WHERE id = $1 AND status NOT IN ('done', 'failed')
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_ai_started(&self, id: Uuid) -> Result<(), FolioError> {
        sqlx::query(
            r#"
            UPDATE crawl_tasks
            SET status = 'ai_processing', ai_started_at = now(), updated_at = now()
            WHERE id = $1 AND status NOT IN ('done', 'failed')
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_ai_finished(&self, id: Uuid) -> Result<(), FolioError> {
        sqlx::query(
            r#"
            UPDATE crawl_tasks
            SET status = 'done', ai_finished_at = now(), updated_at = now()
            WHERE id = $1 AND status NOT IN ('done', 'failed')
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<(), FolioError> {
        sqlx::query(
            r#"
            UPDATE crawl_tasks
            SET status = 'failed', error_message = $1,
                retry_count = retry_count + 1, updated_at = now()
            WHERE id = $2 AND status NOT IN ('done', 'failed')
            "#,
        )
        .bind(message)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
