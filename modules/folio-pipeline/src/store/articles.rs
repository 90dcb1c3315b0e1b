use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use folio_common::{Article, FolioError};

use super::truncate_chars;
use crate::traits::{AiResult, ArticleStore, CrawlResult, CreateArticleParams};

const ARTICLE_COLUMNS: &str = "id, user_id, url, title, author, site_name, favicon_url, \
     cover_image_url, markdown_content, word_count, language, category_id, summary, \
     key_points, ai_confidence, status, source_type, fetch_error, retry_count, \
     is_favorite, is_archived, read_progress, last_read_at, published_at, \
     created_at, updated_at";

pub struct PgArticleStore {
    pool: PgPool,
}

impl PgArticleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Word count stored with the markdown. Character-based, so CJK text
/// counts sensibly.
fn word_count(markdown: &str) -> i32 {
    markdown.chars().count() as i32
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn create(&self, params: CreateArticleParams) -> Result<Article, FolioError> {
        let content = params.content;
        let markdown = content.as_ref().map(|c| c.markdown.clone());
        let words = markdown.as_deref().map(word_count).unwrap_or(0);

        let article = sqlx::query_as::<_, Article>(&format!(
            r#"
            INSERT INTO articles
                (user_id, url, source_type, title, author, site_name,
                 markdown_content, word_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ARTICLE_COLUMNS}
            "#,
        ))
        .bind(params.user_id)
        .bind(&params.url)
        .bind(params.source_type)
        .bind(content.as_ref().and_then(|c| c.title.as_deref()))
        .bind(content.as_ref().and_then(|c| c.author.as_deref()))
        .bind(content.as_ref().and_then(|c| c.site_name.as_deref()))
        .bind(&markdown)
        .bind(words)
        .fetch_one(&self.pool)
        .await?;

        Ok(article)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Article>, FolioError> {
        let article = sqlx::query_as::<_, Article>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(article)
    }

    async fn update_crawl_result(&self, id: Uuid, result: CrawlResult) -> Result<(), FolioError> {
        sqlx::query(
            r#"
            UPDATE articles SET
                title = $1, author = $2, site_name = $3, markdown_content = $4,
                cover_image_url = $5, language = $6, favicon_url = $7,
                word_count = $8, status = 'processing', updated_at = now()
            WHERE id = $9
            "#,
        )
        .bind(truncate_chars(&result.title, 500))
        .bind(truncate_chars(&result.author, 200))
        .bind(truncate_chars(&result.site_name, 200))
        .bind(&result.markdown)
        .bind(truncate_chars(&result.cover_image, 500))
        .bind(truncate_chars(&result.language, 10))
        .bind(truncate_chars(&result.favicon_url, 500))
        .bind(word_count(&result.markdown))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_fetch_error(&self, id: Uuid, message: &str) -> Result<(), FolioError> {
        sqlx::query(
            r#"
            UPDATE articles SET
                fetch_error = $1, retry_count = retry_count + 1,
                status = 'failed', updated_at = now()
            WHERE id = $2
            "#,
        )
        .bind(message)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_ai_result(&self, id: Uuid, result: AiResult) -> Result<(), FolioError> {
        sqlx::query(
            r#"
            UPDATE articles SET
                category_id = (SELECT id FROM categories WHERE slug = $1),
                summary = $2, key_points = $3, ai_confidence = $4,
                language = $5, status = 'ready', updated_at = now()
            WHERE id = $6
            "#,
        )
        .bind(&result.category_slug)
        .bind(&result.summary)
        .bind(Json(&result.key_points))
        .bind(result.confidence)
        .bind(truncate_chars(&result.language, 10))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_markdown(&self, id: Uuid, markdown: &str) -> Result<(), FolioError> {
        sqlx::query(
            r#"
            UPDATE articles SET
                markdown_content = $1, word_count = $2, updated_at = now()
            WHERE id = $3
            "#,
        )
        .bind(markdown)
        .bind(word_count(markdown))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_count_is_character_based() {
        assert_eq!(word_count("hello world"), 11);
        assert_eq!(word_count("日本語"), 3);
        assert_eq!(word_count(""), 0);
    }
}
