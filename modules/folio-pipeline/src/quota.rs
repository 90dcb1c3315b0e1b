// Per-user monthly submission quota. The gate itself is thin: the race
// safety lives in QuotaStore::reserve, which is one conditional UPDATE at
// the storage layer. Lazy month rollover: the counter resets on the first
// reservation attempt of a new calendar month, never on a schedule.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use folio_common::FolioError;

use crate::traits::QuotaStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Granted { used: i32, limit: i32 },
    Exceeded,
}

#[derive(Clone)]
pub struct QuotaGate {
    store: Arc<dyn QuotaStore>,
}

impl QuotaGate {
    pub fn new(store: Arc<dyn QuotaStore>) -> Self {
        Self { store }
    }

    /// Reserve one submission slot. Safe under arbitrary concurrent callers
    /// for the same user; after a grant the stored count never exceeds the
    /// user's monthly quota.
    pub async fn check_and_reserve(&self, user_id: Uuid) -> Result<QuotaDecision, FolioError> {
        match self.store.reserve(user_id).await? {
            Some(r) => {
                debug!(%user_id, used = r.used, limit = r.limit, "Quota reserved");
                Ok(QuotaDecision::Granted {
                    used: r.used,
                    limit: r.limit,
                })
            }
            None => Ok(QuotaDecision::Exceeded),
        }
    }

    /// Hand back a reserved slot after a submission failed before the
    /// pipeline could start, so the user isn't charged for nothing.
    pub async fn release(&self, user_id: Uuid) -> Result<(), FolioError> {
        self.store.release(user_id).await
    }
}
