//! 排期帖子状态机
//!
//! 合法转换：
//!
//! ```text
//! scheduled ──begin_dispatch──▶ processing ──▶ published | failed
//! scheduled ──cancel──▶ cancelled
//! cancelled | failed ──reschedule──▶ scheduled
//! ```
//!
//! 这里只有纯状态转换逻辑，不做任何I/O；持久化与按记录串行化由调用方负责。

use chrono::{DateTime, Utc};

use crate::entities::{ContentType, Platform, PostStatus, ScheduledPost};
use publisher_core::{SchedulerError, SchedulerResult};

/// 创建帖子的请求
#[derive(Debug, Clone)]
pub struct NewPost {
    pub content_id: String,
    pub platform: Platform,
    pub content_type: ContentType,
    pub scheduled_at: DateTime<Utc>,
    pub post_body: String,
    /// 未指定时使用内容类型的默认优先级
    pub priority: Option<i32>,
    /// 忽略 `scheduled_at`，按当前时间发布
    pub force_immediate: bool,
    pub job_id: Option<String>,
}

/// 终止状态转换的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// 状态已变更
    Applied,
    /// 已处于相同的终止状态，重复上报被吸收
    Unchanged,
    /// 已记录了不同的终止结果，本次上报被忽略
    Conflict {
        recorded: PostStatus,
        requested: PostStatus,
    },
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied)
    }
}

/// 生成任务在派发前失败时写入 `failure_reason` 的前缀
pub const GENERATION_FAILED_PREFIX: &str = "generation failed: ";

pub struct PostStateMachine;

impl PostStateMachine {
    pub fn create(request: NewPost, now: DateTime<Utc>) -> SchedulerResult<ScheduledPost> {
        let scheduled_at = if request.force_immediate {
            now
        } else {
            ensure_not_in_past(request.scheduled_at, now)?;
            request.scheduled_at
        };

        let priority = request
            .priority
            .unwrap_or_else(|| request.content_type.default_priority());

        let mut post = ScheduledPost::new(
            request.content_id,
            request.platform,
            request.content_type,
            scheduled_at,
            request.post_body,
            priority,
            now,
        );
        post.job_id = request.job_id;
        Ok(post)
    }

    /// scheduled → processing
    pub fn begin_dispatch(post: &mut ScheduledPost, now: DateTime<Utc>) -> SchedulerResult<()> {
        match post.status {
            PostStatus::Scheduled => {
                post.status = PostStatus::Processing;
                post.dispatched_at = Some(now);
                post.updated_at = now;
                Ok(())
            }
            PostStatus::Processing
            | PostStatus::Published
            | PostStatus::Failed
            | PostStatus::Cancelled => Err(invalid_transition(post, "begin_dispatch")),
        }
    }

    /// processing → published
    pub fn mark_published(
        post: &mut ScheduledPost,
        published_ref: Option<String>,
        now: DateTime<Utc>,
    ) -> SchedulerResult<TransitionOutcome> {
        match post.status {
            PostStatus::Processing => {
                post.status = PostStatus::Published;
                post.published_ref = published_ref;
                post.job_id = None;
                post.completed_at = Some(now);
                post.updated_at = now;
                Ok(TransitionOutcome::Applied)
            }
            PostStatus::Published => Ok(TransitionOutcome::Unchanged),
            PostStatus::Failed | PostStatus::Cancelled => Ok(TransitionOutcome::Conflict {
                recorded: post.status,
                requested: PostStatus::Published,
            }),
            PostStatus::Scheduled => Err(invalid_transition(post, "mark_published")),
        }
    }

    /// processing → failed
    pub fn mark_failed(
        post: &mut ScheduledPost,
        reason: &str,
        now: DateTime<Utc>,
    ) -> SchedulerResult<TransitionOutcome> {
        match post.status {
            PostStatus::Processing => {
                post.status = PostStatus::Failed;
                post.failure_reason = Some(reason.to_string());
                post.job_id = None;
                post.completed_at = Some(now);
                post.updated_at = now;
                Ok(TransitionOutcome::Applied)
            }
            PostStatus::Failed => Ok(TransitionOutcome::Unchanged),
            PostStatus::Published | PostStatus::Cancelled => Ok(TransitionOutcome::Conflict {
                recorded: post.status,
                requested: PostStatus::Failed,
            }),
            PostStatus::Scheduled => Err(invalid_transition(post, "mark_failed")),
        }
    }

    /// scheduled → cancelled
    pub fn cancel(
        post: &mut ScheduledPost,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> SchedulerResult<()> {
        match post.status {
            PostStatus::Scheduled => {
                post.status = PostStatus::Cancelled;
                post.cancel_reason = reason;
                post.job_id = None;
                post.completed_at = Some(now);
                post.updated_at = now;
                Ok(())
            }
            PostStatus::Processing => Err(SchedulerError::CannotCancelInProgress {
                post_id: post.id.clone(),
            }),
            PostStatus::Published | PostStatus::Failed | PostStatus::Cancelled => {
                Err(SchedulerError::CannotCancelTerminal {
                    post_id: post.id.clone(),
                    status: post.status.to_string(),
                })
            }
        }
    }

    /// cancelled | failed → scheduled
    ///
    /// 未指定新时间时调用 `next_window` 计算下一个平台发布窗口。
    /// 返回转换前的状态。
    pub fn reschedule<F>(
        post: &mut ScheduledPost,
        new_scheduled_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        next_window: F,
    ) -> SchedulerResult<PostStatus>
    where
        F: FnOnce(&ScheduledPost, DateTime<Utc>) -> SchedulerResult<DateTime<Utc>>,
    {
        let previous = post.status;
        match previous {
            PostStatus::Cancelled | PostStatus::Failed => {}
            PostStatus::Scheduled | PostStatus::Processing | PostStatus::Published => {
                return Err(invalid_transition(post, "reschedule"));
            }
        }

        let scheduled_at = match new_scheduled_at {
            Some(at) => {
                ensure_not_in_past(at, now)?;
                at
            }
            None => next_window(post, now)?,
        };

        post.status = PostStatus::Scheduled;
        post.scheduled_at = scheduled_at;
        post.cancel_reason = None;
        post.failure_reason = None;
        post.published_ref = None;
        post.dispatched_at = None;
        post.completed_at = None;
        post.job_id = None;
        post.attempt += 1;
        post.updated_at = now;
        Ok(previous)
    }

    /// 将帖子关联到（重试后的）生成任务，清除之前记录的生成失败
    pub fn attach_job(
        post: &mut ScheduledPost,
        job_id: String,
        now: DateTime<Utc>,
    ) -> SchedulerResult<()> {
        match post.status {
            PostStatus::Scheduled | PostStatus::Processing => {
                post.job_id = Some(job_id);
                post.failure_reason = None;
                post.updated_at = now;
                Ok(())
            }
            PostStatus::Published | PostStatus::Failed | PostStatus::Cancelled => {
                Err(invalid_transition(post, "attach_job"))
            }
        }
    }

    /// 生成任务完成后写入正文并解除任务关联，不改变状态
    pub fn populate_content(
        post: &mut ScheduledPost,
        post_body: String,
        now: DateTime<Utc>,
    ) -> SchedulerResult<()> {
        match post.status {
            PostStatus::Scheduled | PostStatus::Processing => {
                post.post_body = post_body;
                post.job_id = None;
                post.updated_at = now;
                Ok(())
            }
            PostStatus::Published | PostStatus::Failed | PostStatus::Cancelled => {
                Err(invalid_transition(post, "populate_content"))
            }
        }
    }

    /// 帖子仍在排期中时生成任务失败：解除任务关联并记下原因，状态不变。
    /// 到期派发时这类帖子直接标记失败，除非之前已关联了新任务。
    pub fn record_generation_failure(
        post: &mut ScheduledPost,
        error: &str,
        now: DateTime<Utc>,
    ) -> SchedulerResult<()> {
        match post.status {
            PostStatus::Scheduled => {
                post.job_id = None;
                post.failure_reason = Some(format!("{GENERATION_FAILED_PREFIX}{error}"));
                post.updated_at = now;
                Ok(())
            }
            PostStatus::Processing
            | PostStatus::Published
            | PostStatus::Failed
            | PostStatus::Cancelled => Err(invalid_transition(post, "record_generation_failure")),
        }
    }
}

fn ensure_not_in_past(scheduled_at: DateTime<Utc>, now: DateTime<Utc>) -> SchedulerResult<()> {
    if scheduled_at < now {
        return Err(SchedulerError::InvalidScheduleTime {
            scheduled_at: scheduled_at.to_rfc3339(),
            now: now.to_rfc3339(),
        });
    }
    Ok(())
}

fn invalid_transition(post: &ScheduledPost, action: &str) -> SchedulerError {
    SchedulerError::InvalidTransition {
        post_id: post.id.clone(),
        from: post.status.to_string(),
        action: action.to_string(),
    }
}
