//! 领域事件
//!
//! 帖子状态转换提交后发布的事件，供通知/Socket网关转发给客户端；
//! 以及外部生成服务推送的任务事件。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{Platform, PostStatus};

/// 领域事件基础trait
pub trait DomainEvent: Send + Sync {
    fn event_id(&self) -> Uuid;
    fn event_type(&self) -> &str;
    fn occurred_at(&self) -> DateTime<Utc>;
    fn aggregate_id(&self) -> String;
}

/// 帖子生命周期事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PostEvent {
    Scheduled {
        id: Uuid,
        post_id: String,
        platform: Platform,
        scheduled_at: DateTime<Utc>,
        occurred_at: DateTime<Utc>,
    },
    Dispatched {
        id: Uuid,
        post_id: String,
        platform: Platform,
        occurred_at: DateTime<Utc>,
    },
    Published {
        id: Uuid,
        post_id: String,
        published_ref: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    Failed {
        id: Uuid,
        post_id: String,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
    Cancelled {
        id: Uuid,
        post_id: String,
        reason: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    Rescheduled {
        id: Uuid,
        post_id: String,
        previous_status: PostStatus,
        scheduled_at: DateTime<Utc>,
        occurred_at: DateTime<Utc>,
    },
    ContentReady {
        id: Uuid,
        post_id: String,
        job_id: String,
        occurred_at: DateTime<Utc>,
    },
}

impl DomainEvent for PostEvent {
    fn event_id(&self) -> Uuid {
        match self {
            PostEvent::Scheduled { id, .. } => *id,
            PostEvent::Dispatched { id, .. } => *id,
            PostEvent::Published { id, .. } => *id,
            PostEvent::Failed { id, .. } => *id,
            PostEvent::Cancelled { id, .. } => *id,
            PostEvent::Rescheduled { id, .. } => *id,
            PostEvent::ContentReady { id, .. } => *id,
        }
    }

    fn event_type(&self) -> &str {
        match self {
            PostEvent::Scheduled { .. } => "PostScheduled",
            PostEvent::Dispatched { .. } => "PostDispatched",
            PostEvent::Published { .. } => "PostPublished",
            PostEvent::Failed { .. } => "PostFailed",
            PostEvent::Cancelled { .. } => "PostCancelled",
            PostEvent::Rescheduled { .. } => "PostRescheduled",
            PostEvent::ContentReady { .. } => "PostContentReady",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PostEvent::Scheduled { occurred_at, .. } => *occurred_at,
            PostEvent::Dispatched { occurred_at, .. } => *occurred_at,
            PostEvent::Published { occurred_at, .. } => *occurred_at,
            PostEvent::Failed { occurred_at, .. } => *occurred_at,
            PostEvent::Cancelled { occurred_at, .. } => *occurred_at,
            PostEvent::Rescheduled { occurred_at, .. } => *occurred_at,
            PostEvent::ContentReady { occurred_at, .. } => *occurred_at,
        }
    }

    fn aggregate_id(&self) -> String {
        match self {
            PostEvent::Scheduled { post_id, .. } => post_id.clone(),
            PostEvent::Dispatched { post_id, .. } => post_id.clone(),
            PostEvent::Published { post_id, .. } => post_id.clone(),
            PostEvent::Failed { post_id, .. } => post_id.clone(),
            PostEvent::Cancelled { post_id, .. } => post_id.clone(),
            PostEvent::Rescheduled { post_id, .. } => post_id.clone(),
            PostEvent::ContentReady { post_id, .. } => post_id.clone(),
        }
    }
}

/// 生成服务推送的任务事件，按 `job_id` 关联，而不是帖子ID
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GenerationEvent {
    Started {
        job_id: String,
        prompt: String,
    },
    Progress {
        job_id: String,
        percent: u8,
        step: String,
    },
    Completed {
        job_id: String,
        result_ref: String,
        cost: Option<f64>,
        duration_ms: Option<u64>,
    },
    Failed {
        job_id: String,
        error: String,
    },
}

impl GenerationEvent {
    pub fn job_id(&self) -> &str {
        match self {
            GenerationEvent::Started { job_id, .. } => job_id,
            GenerationEvent::Progress { job_id, .. } => job_id,
            GenerationEvent::Completed { job_id, .. } => job_id,
            GenerationEvent::Failed { job_id, .. } => job_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            GenerationEvent::Started { .. } => "started",
            GenerationEvent::Progress { .. } => "progress",
            GenerationEvent::Completed { .. } => "completed",
            GenerationEvent::Failed { .. } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_event_wire_format() {
        let json = r#"{"event":"completed","job_id":"job-42","result_ref":"s3://bucket/img.png","cost":0.02,"duration_ms":5300}"#;
        let event: GenerationEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.job_id(), "job-42");
        assert_eq!(event.event_type(), "completed");

        let json = r#"{"event":"progress","job_id":"job-7","percent":40,"step":"rendering"}"#;
        let event: GenerationEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            GenerationEvent::Progress {
                job_id: "job-7".to_string(),
                percent: 40,
                step: "rendering".to_string()
            }
        );
    }

    #[test]
    fn test_post_event_metadata() {
        let now = Utc::now();
        let event = PostEvent::Cancelled {
            id: Uuid::new_v4(),
            post_id: "post-1".to_string(),
            reason: None,
            occurred_at: now,
        };
        assert_eq!(event.event_type(), "PostCancelled");
        assert_eq!(event.aggregate_id(), "post-1");
        assert_eq!(event.occurred_at(), now);
    }
}
