// Queue task envelopes. One enum, one variant per stage, each with its own
// strongly-typed payload — dispatch is an exhaustive match in the runner,
// never a string lookup.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Priority lanes, highest first. Submission parameters per task kind are
/// fixed configuration: they encode the pipeline's failure-tolerance policy
/// and must stay distinct per stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Critical,
    Default,
    Low,
}

impl Lane {
    pub const ALL: [Lane; 3] = [Lane::Critical, Lane::Default, Lane::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Lane::Critical => "critical",
            Lane::Default => "default",
            Lane::Low => "low",
        }
    }
}

/// An immutable dispatch trigger. The CrawlTask row is the source of truth;
/// an envelope may be redelivered and handlers must tolerate that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineTask {
    Fetch(FetchPayload),
    Classify(ClassifyPayload),
    Media(MediaPayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchPayload {
    pub article_id: Uuid,
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyPayload {
    pub article_id: Uuid,
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub markdown: String,
    pub source: String,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaPayload {
    pub article_id: Uuid,
    pub image_urls: Vec<String>,
}

impl PipelineTask {
    /// Stable name for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineTask::Fetch(_) => "fetch",
            PipelineTask::Classify(_) => "classify",
            PipelineTask::Media(_) => "media",
        }
    }

    pub fn lane(&self) -> Lane {
        match self {
            PipelineTask::Fetch(_) => Lane::Critical,
            PipelineTask::Classify(_) => Lane::Default,
            PipelineTask::Media(_) => Lane::Low,
        }
    }

    /// Redelivery budget after the first attempt fails.
    pub fn max_retries(&self) -> u32 {
        match self {
            PipelineTask::Fetch(_) => 3,
            PipelineTask::Classify(_) => 3,
            // Media failure is non-fatal, so it gets the smallest budget.
            PipelineTask::Media(_) => 2,
        }
    }

    /// Per-delivery processing deadline, tuned to the stage's workload:
    /// network fetch, inference latency, bulk image downloads.
    pub fn timeout(&self) -> Duration {
        match self {
            PipelineTask::Fetch(_) => Duration::from_secs(90),
            PipelineTask::Classify(_) => Duration::from_secs(60),
            PipelineTask::Media(_) => Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch_task() -> PipelineTask {
        PipelineTask::Fetch(FetchPayload {
            article_id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            url: "https://example.com/post".to_string(),
        })
    }

    #[test]
    fn lanes_by_kind() {
        let classify = PipelineTask::Classify(ClassifyPayload {
            article_id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: String::new(),
            markdown: String::new(),
            source: String::new(),
            author: String::new(),
        });
        let media = PipelineTask::Media(MediaPayload {
            article_id: Uuid::new_v4(),
            image_urls: vec![],
        });

        assert_eq!(fetch_task().lane(), Lane::Critical);
        assert_eq!(classify.lane(), Lane::Default);
        assert_eq!(media.lane(), Lane::Low);
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let task = fetch_task();
        let json = serde_json::to_string(&task).unwrap();
        let back: PipelineTask = serde_json::from_str(&json).unwrap();
        assert_eq!(task, back);
    }

    #[test]
    fn envelope_json_is_tagged_by_kind() {
        let json = serde_json::to_value(fetch_task()).unwrap();
        assert_eq!(json["type"], "fetch");
        assert!(json["url"].is_string());
    }
}
