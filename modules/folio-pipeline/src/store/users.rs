use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use folio_common::{FolioError, User};

use crate::traits::{QuotaReservation, QuotaStore};

const USER_COLUMNS: &str = "id, email, nickname, monthly_quota, current_month_count, \
     quota_reset_at, created_at, updated_at";

/// Quota counters live on the users row and are only ever written here.
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuotaStore for PgUserStore {
    /// One conditional UPDATE does the whole reservation:
    /// - a row whose quota_reset_at is null or in an earlier month resets
    ///   to count 1 (a new month always grants);
    /// - otherwise the counter only increments while strictly below the
    ///   quota;
    /// - a full counter matches zero rows, which reports as exhausted.
    ///
    /// Row-level locking on the UPDATE serializes concurrent callers, so
    /// the count can never overshoot — there is no read-then-write window.
    async fn reserve(&self, user_id: Uuid) -> Result<Option<QuotaReservation>, FolioError> {
        let row = sqlx::query_as::<_, (i32, i32)>(
            r#"
            UPDATE users SET
                current_month_count = CASE
                    WHEN quota_reset_at IS NULL
                         OR date_trunc('month', quota_reset_at) < date_trunc('month', now())
                    THEN 1
                    ELSE current_month_count + 1
                END,
                quota_reset_at = CASE
                    WHEN quota_reset_at IS NULL
                         OR date_trunc('month', quota_reset_at) < date_trunc('month', now())
                    THEN now()
                    ELSE quota_reset_at
                END,
                updated_at = now()
            WHERE id = $1
              AND (quota_reset_at IS NULL
                   OR date_trunc('month', quota_reset_at) < date_trunc('month', now())
                   OR current_month_count < monthly_quota)
            RETURNING current_month_count, monthly_quota
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((used, limit)) => Ok(Some(QuotaReservation { used, limit })),
            None => {
                // Zero rows: exhausted quota, or no such user.
                let exists = sqlx::query_scalar::<_, i32>("SELECT 1 FROM users WHERE id = $1")
                    .bind(user_id)
                    .fetch_optional(&self.pool)
                    .await?;
                if exists.is_none() {
                    return Err(FolioError::NotFound);
                }
                Ok(None)
            }
        }
    }

    async fn release(&self, user_id: Uuid) -> Result<(), FolioError> {
        sqlx::query(
            r#"
            UPDATE users SET
                current_month_count = GREATEST(current_month_count - 1, 0),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, FolioError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1",
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
