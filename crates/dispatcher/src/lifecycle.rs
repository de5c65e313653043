//! 帖子生命周期服务
//!
//! 状态机本身是纯函数；这里负责按帖子ID加锁、读取、执行转换、持久化，
//! 并在提交后发布领域事件。请求线程与任务事件线程都经过这里，
//! 同一帖子上的修改因此严格串行。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use publisher_core::{Clock, SchedulerError, SchedulerResult};
use publisher_domain::{
    DispatchOutcome, NewPost, PlatformDispatchAdapter, PostEvent, PostStateMachine, PostStatus,
    ScheduledPost, ScheduledPostRepository, TransitionOutcome,
};
use publisher_infrastructure::{MetricsCollector, StructuredLogger};

use crate::locks::KeyedLocks;
use crate::time_window::TimeWindowPolicy;

/// 到期帖子既没有正文也没有失败原因时使用的原因
pub const MISSING_CONTENT_REASON: &str = "no content to publish";

/// 一次加锁修改的结果
#[derive(Debug, Clone)]
pub struct Mutation<T> {
    pub previous: PostStatus,
    pub post: ScheduledPost,
    pub value: T,
}

pub struct PostLifecycle {
    repo: Arc<dyn ScheduledPostRepository>,
    locks: KeyedLocks,
    clock: Arc<dyn Clock>,
    windows: Arc<TimeWindowPolicy>,
    events: broadcast::Sender<PostEvent>,
    metrics: MetricsCollector,
}

impl PostLifecycle {
    pub fn new(
        repo: Arc<dyn ScheduledPostRepository>,
        clock: Arc<dyn Clock>,
        windows: Arc<TimeWindowPolicy>,
        event_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            repo,
            locks: KeyedLocks::new(),
            clock,
            windows,
            events,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PostEvent> {
        self.events.subscribe()
    }

    pub fn repository(&self) -> &Arc<dyn ScheduledPostRepository> {
        &self.repo
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn windows(&self) -> &Arc<TimeWindowPolicy> {
        &self.windows
    }

    pub async fn get(&self, post_id: &str) -> SchedulerResult<ScheduledPost> {
        self.repo
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| SchedulerError::post_not_found(post_id))
    }

    pub async fn create(&self, request: NewPost) -> SchedulerResult<ScheduledPost> {
        let post = PostStateMachine::create(request, self.clock.now())?;
        self.repo.insert(&post).await?;
        self.announce_scheduled(&post);
        Ok(post)
    }

    /// 暂存一批帖子：要么全部写入，要么一条都不写入。
    /// 调用方确认后必须调用 [`Self::commit_batch`] 或 [`Self::rollback_batch`]。
    pub async fn stage_batch(&self, requests: Vec<NewPost>) -> SchedulerResult<Vec<ScheduledPost>> {
        let now = self.clock.now();
        let posts = requests
            .into_iter()
            .map(|request| PostStateMachine::create(request, now))
            .collect::<SchedulerResult<Vec<_>>>()?;
        self.repo.insert_batch(&posts).await?;
        debug!("暂存 {} 条帖子", posts.len());
        Ok(posts)
    }

    pub fn commit_batch(&self, posts: &[ScheduledPost]) {
        for post in posts {
            self.announce_scheduled(post);
        }
    }

    pub async fn rollback_batch(&self, posts: &[ScheduledPost]) -> SchedulerResult<()> {
        let ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();
        warn!("回滚 {} 条暂存帖子", ids.len());
        self.repo.remove_uncommitted(&ids).await
    }

    /// 加锁读取帖子并执行 `action`；帖子有变化时写回。
    /// `action` 返回错误时帖子保持原状。
    pub async fn mutate<T, F>(&self, post_id: &str, action: F) -> SchedulerResult<Mutation<T>>
    where
        F: FnOnce(&mut ScheduledPost, DateTime<Utc>) -> SchedulerResult<T>,
    {
        let _guard = self.locks.lock(post_id).await;
        let original = self.get(post_id).await?;
        let previous = original.status;

        let mut post = original.clone();
        let value = action(&mut post, self.clock.now())?;
        if post != original {
            self.repo.update(&post).await?;
        }

        Ok(Mutation {
            previous,
            post,
            value,
        })
    }

    /// scheduled → processing。帖子还在等待新的生成任务时保持原状并返回 `None`。
    pub async fn begin_dispatch(&self, post_id: &str) -> SchedulerResult<Option<ScheduledPost>> {
        let mutation = self
            .mutate(post_id, |post, now| {
                if post.awaits_content() {
                    return Ok(false);
                }
                PostStateMachine::begin_dispatch(post, now).map(|_| true)
            })
            .await?;
        let post = mutation.post;
        if !mutation.value {
            debug!("帖子 {} 没有正文也没有生成任务，暂不派发", post.id);
            return Ok(None);
        }

        StructuredLogger::log_post_dispatched(&post.id, post.platform, post.awaits_generation());
        self.log_transition(&post, mutation.previous, "begin_dispatch");
        self.emit(PostEvent::Dispatched {
            id: Uuid::new_v4(),
            post_id: post.id.clone(),
            platform: post.platform,
            occurred_at: post.updated_at,
        });
        Ok(Some(post))
    }

    /// 把处理中帖子的正文交给平台适配器，按结果标记发布或失败。
    /// 正文为空时不调用适配器，直接以记录的原因标记失败。
    pub async fn publish_with(
        &self,
        adapter: &dyn PlatformDispatchAdapter,
        post: &ScheduledPost,
    ) -> SchedulerResult<(ScheduledPost, TransitionOutcome)> {
        if post.post_body.trim().is_empty() {
            let reason = post
                .failure_reason
                .clone()
                .unwrap_or_else(|| MISSING_CONTENT_REASON.to_string());
            return self.mark_failed(&post.id, &reason).await;
        }

        let failure = match adapter.publish(post.platform, &post.post_body).await {
            Ok(DispatchOutcome::Success { published_ref }) => {
                return self.mark_published(&post.id, Some(published_ref)).await;
            }
            Ok(DispatchOutcome::Failure { reason }) => SchedulerError::DispatchFailed {
                platform: post.platform.to_string(),
                reason,
            },
            Err(e @ SchedulerError::DispatchFailed { .. }) => e,
            Err(other) => SchedulerError::DispatchFailed {
                platform: post.platform.to_string(),
                reason: other.to_string(),
            },
        };
        self.mark_failed(&post.id, &failure.to_string()).await
    }

    pub async fn mark_published(
        &self,
        post_id: &str,
        published_ref: Option<String>,
    ) -> SchedulerResult<(ScheduledPost, TransitionOutcome)> {
        let mutation = self
            .mutate(post_id, |post, now| {
                PostStateMachine::mark_published(post, published_ref, now)
            })
            .await?;
        self.after_terminal(&mutation, "mark_published");
        Ok((mutation.post, mutation.value))
    }

    pub async fn mark_failed(
        &self,
        post_id: &str,
        reason: &str,
    ) -> SchedulerResult<(ScheduledPost, TransitionOutcome)> {
        let mutation = self
            .mutate(post_id, |post, now| {
                PostStateMachine::mark_failed(post, reason, now)
            })
            .await?;
        self.after_terminal(&mutation, "mark_failed");
        Ok((mutation.post, mutation.value))
    }

    pub async fn cancel(
        &self,
        post_id: &str,
        reason: Option<String>,
    ) -> SchedulerResult<ScheduledPost> {
        let mutation = self
            .mutate(post_id, |post, now| PostStateMachine::cancel(post, reason, now))
            .await?;
        let post = mutation.post;

        self.log_transition(&post, mutation.previous, "cancel");
        self.metrics.record_post_cancelled(post.platform);
        self.emit(PostEvent::Cancelled {
            id: Uuid::new_v4(),
            post_id: post.id.clone(),
            reason: post.cancel_reason.clone(),
            occurred_at: post.updated_at,
        });
        Ok(post)
    }

    pub async fn reschedule(
        &self,
        post_id: &str,
        new_scheduled_at: Option<DateTime<Utc>>,
    ) -> SchedulerResult<ScheduledPost> {
        let windows = self.windows.clone();
        let mutation = self
            .mutate(post_id, |post, now| {
                PostStateMachine::reschedule(post, new_scheduled_at, now, |p, now| {
                    windows.next_window_for(p, now)
                })
            })
            .await?;
        let post = mutation.post;

        self.log_transition(&post, mutation.previous, "reschedule");
        self.metrics.record_post_rescheduled(post.platform);
        self.emit(PostEvent::Rescheduled {
            id: Uuid::new_v4(),
            post_id: post.id.clone(),
            previous_status: mutation.value,
            scheduled_at: post.scheduled_at,
            occurred_at: post.updated_at,
        });
        Ok(post)
    }

    pub async fn attach_job(&self, post_id: &str, job_id: String) -> SchedulerResult<ScheduledPost> {
        let mutation = self
            .mutate(post_id, |post, now| PostStateMachine::attach_job(post, job_id, now))
            .await?;
        debug!(
            "帖子 {} 关联生成任务 {}",
            mutation.post.id,
            mutation.post.job_id.as_deref().unwrap_or_default()
        );
        Ok(mutation.post)
    }

    /// 清理空闲的帖子锁
    pub fn prune_locks(&self) -> usize {
        let before = self.locks.len();
        self.locks.prune();
        before.saturating_sub(self.locks.len())
    }

    pub(crate) fn content_ready(&self, post: &ScheduledPost, job_id: &str) {
        self.emit(PostEvent::ContentReady {
            id: Uuid::new_v4(),
            post_id: post.id.clone(),
            job_id: job_id.to_string(),
            occurred_at: post.updated_at,
        });
    }

    /// 终止转换提交后的日志、指标与事件
    pub(crate) fn after_terminal(&self, mutation: &Mutation<TransitionOutcome>, action: &str) {
        let post = &mutation.post;
        match mutation.value {
            TransitionOutcome::Applied => {
                self.log_transition(post, mutation.previous, action);
                match post.status {
                    PostStatus::Published => {
                        let latency = match (post.dispatched_at, post.completed_at) {
                            (Some(start), Some(end)) => (end - start).num_milliseconds() as f64 / 1000.0,
                            _ => 0.0,
                        };
                        self.metrics.record_post_published(post.platform, latency);
                        self.emit(PostEvent::Published {
                            id: Uuid::new_v4(),
                            post_id: post.id.clone(),
                            published_ref: post.published_ref.clone(),
                            occurred_at: post.updated_at,
                        });
                    }
                    PostStatus::Failed => {
                        let reason = post.failure_reason.clone().unwrap_or_default();
                        StructuredLogger::log_dispatch_failed(&post.id, post.platform, &reason);
                        self.metrics.record_post_failed(post.platform);
                        self.emit(PostEvent::Failed {
                            id: Uuid::new_v4(),
                            post_id: post.id.clone(),
                            reason,
                            occurred_at: post.updated_at,
                        });
                    }
                    PostStatus::Scheduled | PostStatus::Processing | PostStatus::Cancelled => {}
                }
            }
            TransitionOutcome::Unchanged => {
                debug!("帖子 {} 重复的终止上报已吸收 ({})", post.id, action);
            }
            TransitionOutcome::Conflict {
                recorded,
                requested,
            } => {
                StructuredLogger::log_transition_conflict(&post.id, recorded, requested);
                self.metrics.record_transition_conflict();
            }
        }
    }

    fn announce_scheduled(&self, post: &ScheduledPost) {
        StructuredLogger::log_post_scheduled(post);
        self.metrics
            .record_post_scheduled(post.platform, post.content_type);
        self.emit(PostEvent::Scheduled {
            id: Uuid::new_v4(),
            post_id: post.id.clone(),
            platform: post.platform,
            scheduled_at: post.scheduled_at,
            occurred_at: post.created_at,
        });
    }

    fn log_transition(&self, post: &ScheduledPost, previous: PostStatus, action: &str) {
        StructuredLogger::log_post_transition(&post.id, previous, post.status, action);
    }

    fn emit(&self, event: PostEvent) {
        // 没有订阅者时发送失败，属于正常情况
        let _ = self.events.send(event);
    }
}
