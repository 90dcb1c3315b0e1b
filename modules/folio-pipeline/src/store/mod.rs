// Postgres implementations of the store traits. Raw SQL via sqlx; every
// CrawlTask transition and the quota reservation carry their guard in the
// statement itself, so correctness never depends on application-side
// read-then-write.

pub mod articles;
pub mod crawl_tasks;
pub mod tags;
pub mod users;

pub use articles::PgArticleStore;
pub use crawl_tasks::PgTaskStore;
pub use tags::PgTagStore;
pub use users::PgUserStore;

use sqlx::PgPool;

use folio_common::FolioError;

/// Run the embedded SQL migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), FolioError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| FolioError::Database(e.into()))?;
    Ok(())
}

/// Truncate to at most `max` characters (not bytes), preserving UTF-8.
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
