use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of an article's content: created → pipeline running → readable
/// (or failed). Stored as a Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "article_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

/// Execution state of one submission's crawl task. Transitions only move
/// forward: queued → crawling → ai_processing → done, with failed reachable
/// from any non-terminal state. Done and failed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Crawling,
    AiProcessing,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }
}

/// Where a submitted URL came from, by hostname. Display/priority metadata
/// only — the pipeline never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "source_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Web,
    Wechat,
    Twitter,
    Weibo,
    Zhihu,
    Newsletter,
    Youtube,
}

impl SourceType {
    /// Classify a URL by hostname. Pure, no I/O; unparseable URLs are Web.
    pub fn from_url(raw: &str) -> Self {
        let host = match url::Url::parse(raw) {
            Ok(u) => match u.host_str() {
                Some(h) => h.to_lowercase(),
                None => return SourceType::Web,
            },
            Err(_) => return SourceType::Web,
        };

        if host.contains("mp.weixin.qq.com") {
            SourceType::Wechat
        } else if host.contains("twitter.com") || host.contains("x.com") {
            SourceType::Twitter
        } else if host.contains("weibo.com") || host.contains("weibo.cn") {
            SourceType::Weibo
        } else if host.contains("zhihu.com") {
            SourceType::Zhihu
        } else if host.contains("youtube.com") || host.contains("youtu.be") {
            SourceType::Youtube
        } else if host.contains("substack.com") || host.contains("mailchi.mp") {
            SourceType::Newsletter
        } else {
            SourceType::Web
        }
    }
}

/// The content record. Extraction and classification results land here as
/// the pipeline advances; optional metadata stays `None` until a stage
/// writes it. `markdown_content` distinguishes absent (never provided) from
/// empty string (provided but blank) — the fetch fallback depends on it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Article {
    pub id: Uuid,
    pub user_id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub site_name: Option<String>,
    pub favicon_url: Option<String>,
    pub cover_image_url: Option<String>,
    pub markdown_content: Option<String>,
    pub word_count: i32,
    pub language: Option<String>,
    pub category_id: Option<Uuid>,
    pub summary: Option<String>,
    #[sqlx(json)]
    pub key_points: Vec<String>,
    pub ai_confidence: Option<f64>,
    pub status: ArticleStatus,
    pub source_type: SourceType,
    pub fetch_error: Option<String>,
    pub retry_count: i32,
    pub is_favorite: bool,
    pub is_archived: bool,
    pub read_progress: f64,
    pub last_read_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// True when the submitter provided ready-made markdown the fetch stage
    /// can fall back to. Empty string does not count.
    pub fn has_client_content(&self) -> bool {
        self.markdown_content
            .as_deref()
            .is_some_and(|m| !m.is_empty())
    }
}

/// Durable record of one submission's progress through the pipeline,
/// distinct from the transient queue message. The row is the source of
/// truth; queue messages are only dispatch triggers.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CrawlTask {
    pub id: Uuid,
    pub article_id: Uuid,
    pub user_id: Uuid,
    pub url: String,
    pub source_type: SourceType,
    pub status: TaskStatus,
    pub crawl_started_at: Option<DateTime<Utc>>,
    pub crawl_finished_at: Option<DateTime<Utc>>,
    pub ai_started_at: Option<DateTime<Utc>>,
    pub ai_finished_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Account row, reduced to what the pipeline and API read. The quota
/// counters are only ever written through the quota gate's atomic update.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub monthly_quota: i32,
    pub current_month_count: i32,
    pub quota_reset_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's tag. `is_ai_generated` marks tags the classifier created, as
/// opposed to ones the user made by hand.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub is_ai_generated: bool,
    pub article_count: i32,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_wechat() {
        assert_eq!(
            SourceType::from_url("https://mp.weixin.qq.com/s/abc123"),
            SourceType::Wechat
        );
    }

    #[test]
    fn detect_twitter_and_x() {
        assert_eq!(
            SourceType::from_url("https://twitter.com/user/status/1"),
            SourceType::Twitter
        );
        assert_eq!(
            SourceType::from_url("https://x.com/user/status/1"),
            SourceType::Twitter
        );
    }

    #[test]
    fn detect_youtube() {
        assert_eq!(
            SourceType::from_url("https://www.youtube.com/watch?v=abc"),
            SourceType::Youtube
        );
        assert_eq!(SourceType::from_url("https://youtu.be/abc"), SourceType::Youtube);
    }

    #[test]
    fn detect_newsletter() {
        assert_eq!(
            SourceType::from_url("https://writer.substack.com/p/post"),
            SourceType::Newsletter
        );
    }

    #[test]
    fn unknown_host_is_web() {
        assert_eq!(
            SourceType::from_url("https://example.com/article"),
            SourceType::Web
        );
    }

    #[test]
    fn unparseable_url_is_web() {
        assert_eq!(SourceType::from_url("not a url"), SourceType::Web);
    }

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::Crawling.is_terminal());
        assert!(!TaskStatus::AiProcessing.is_terminal());
    }
}
