use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use folio_common::{FolioError, Tag};

use crate::traits::TagStore;

pub struct PgTagStore {
    pool: PgPool,
}

impl PgTagStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TagStore for PgTagStore {
    async fn create_or_get(
        &self,
        user_id: Uuid,
        name: &str,
        ai_generated: bool,
    ) -> Result<Tag, FolioError> {
        // The no-op SET makes the upsert return the existing row instead of
        // erroring on the (user_id, name) unique constraint.
        let tag = sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (user_id, name, is_ai_generated)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, user_id, name, is_ai_generated, article_count, created_at
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(ai_generated)
        .fetch_one(&self.pool)
        .await?;

        Ok(tag)
    }

    async fn attach(&self, article_id: Uuid, tag_id: Uuid) -> Result<(), FolioError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO article_tags (article_id, tag_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(article_id)
        .bind(tag_id)
        .execute(&self.pool)
        .await?;

        // Only count first-time attachments.
        if inserted.rows_affected() > 0 {
            sqlx::query("UPDATE tags SET article_count = article_count + 1 WHERE id = $1")
                .bind(tag_id)
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }
}
