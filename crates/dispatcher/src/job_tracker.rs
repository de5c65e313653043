//! 生成任务事件关联
//!
//! 事件按 `job_id` 关联到帖子，从不使用帖子ID：同一帖子重试时会换一个新的任务。
//! 所有状态修改都通过 [`PostLifecycle`] 的按帖子加锁路径完成。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use publisher_core::{SchedulerError, SchedulerResult};
use publisher_domain::{
    GenerationEvent, JobProgress, PlatformDispatchAdapter, PostStateMachine, PostStatus,
    TransitionOutcome,
};
use publisher_infrastructure::{MetricsCollector, StructuredLogger};

use crate::lifecycle::{Mutation, PostLifecycle};

/// 单个任务事件的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventOutcome {
    /// 事件改变了帖子或进度
    Applied,
    /// 重复的终止事件，没有副作用
    Absorbed,
    /// 事件有效但不产生变化（未知任务的开始或进度事件、过期进度、冲突上报）
    Ignored,
    /// 终止事件找不到对应帖子
    CorrelationMiss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Completed,
    Failed,
}

impl Settlement {
    fn event_type(&self) -> &'static str {
        match self {
            Settlement::Completed => "completed",
            Settlement::Failed => "failed",
        }
    }
}

/// 已结束任务的归属记录
#[derive(Debug, Clone)]
struct SettledJob {
    post_id: String,
    attempt: u32,
    settlement: Settlement,
    settled_at: DateTime<Utc>,
}

enum CurrentStep {
    ContentReady,
    /// 帖子已在处理中，正文就绪后交给平台适配器
    Publish,
    Terminal(TransitionOutcome),
    FailedBeforeDispatch,
}

/// 一次清理移除的条目数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrunedJobs {
    pub progress: usize,
    pub settled: usize,
}

enum DuplicateStep {
    Stale,
    Terminal(TransitionOutcome),
    AlreadySettled { same: bool },
}

pub struct JobCorrelationTracker {
    lifecycle: Arc<PostLifecycle>,
    adapter: Arc<dyn PlatformDispatchAdapter>,
    progress: DashMap<String, JobProgress>,
    settled: DashMap<String, SettledJob>,
    metrics: MetricsCollector,
}

impl JobCorrelationTracker {
    pub fn new(lifecycle: Arc<PostLifecycle>, adapter: Arc<dyn PlatformDispatchAdapter>) -> Self {
        Self {
            lifecycle,
            adapter,
            progress: DashMap::new(),
            settled: DashMap::new(),
            metrics: MetricsCollector::new(),
        }
    }

    /// 按到达顺序消费事件，直到通道关闭或收到停止信号
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<GenerationEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> SchedulerResult<()> {
        info!("启动生成任务事件监听");
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("收到停止信号，退出生成任务事件监听");
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        info!("生成任务事件通道已关闭");
                        break;
                    };
                    if let Err(e) = self.handle(&event).await {
                        error!(
                            "处理任务 {} 的 {} 事件时出错: {}",
                            event.job_id(),
                            event.event_type(),
                            e
                        );
                    }
                }
            }
        }
        Ok(())
    }

    pub async fn handle(&self, event: &GenerationEvent) -> SchedulerResult<JobEventOutcome> {
        match event {
            GenerationEvent::Started { job_id, prompt } => self.on_job_started(job_id, prompt).await,
            GenerationEvent::Progress {
                job_id,
                percent,
                step,
            } => self.on_job_progress(job_id, *percent, step).await,
            GenerationEvent::Completed {
                job_id,
                result_ref,
                cost,
                duration_ms,
            } => {
                debug!(
                    "任务 {} 完成, 成本 {:?}, 耗时 {:?}ms",
                    job_id, cost, duration_ms
                );
                self.on_job_completed(job_id, result_ref).await
            }
            GenerationEvent::Failed { job_id, error } => self.on_job_failed(job_id, error).await,
        }
    }

    pub async fn on_job_started(&self, job_id: &str, prompt: &str) -> SchedulerResult<JobEventOutcome> {
        match self.lifecycle.repository().find_by_job_id(job_id).await? {
            Some(post) => {
                info!("生成任务 {} 已开始，关联帖子 {}", job_id, post.id);
                debug!("任务 {} 提示词长度: {}", job_id, prompt.chars().count());
                self.progress
                    .entry(job_id.to_string())
                    .or_insert_with(|| JobProgress {
                        job_id: job_id.to_string(),
                        percent: 0,
                        step: "started".to_string(),
                        updated_at: self.lifecycle.clock().now(),
                    });
                Ok(JobEventOutcome::Applied)
            }
            None => {
                debug!("忽略未关联任何帖子的任务开始事件: {}", job_id);
                Ok(JobEventOutcome::Ignored)
            }
        }
    }

    /// 进度只用于展示：乱序到达的较低进度直接丢弃，未关联帖子的任务不记录
    pub async fn on_job_progress(
        &self,
        job_id: &str,
        percent: u8,
        step: &str,
    ) -> SchedulerResult<JobEventOutcome> {
        if self.settled.contains_key(job_id) {
            return Ok(JobEventOutcome::Ignored);
        }
        if !self.progress.contains_key(job_id)
            && self.lifecycle.repository().find_by_job_id(job_id).await?.is_none()
        {
            debug!("忽略未关联任何帖子的任务进度: {}", job_id);
            return Ok(JobEventOutcome::Ignored);
        }

        let percent = percent.min(100);
        let now = self.lifecycle.clock().now();
        let outcome = match self.progress.entry(job_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if percent < entry.get().percent {
                    return Ok(JobEventOutcome::Ignored);
                }
                let current = entry.get_mut();
                current.percent = percent;
                current.step = step.to_string();
                current.updated_at = now;
                JobEventOutcome::Applied
            }
            Entry::Vacant(entry) => {
                entry.insert(JobProgress {
                    job_id: job_id.to_string(),
                    percent,
                    step: step.to_string(),
                    updated_at: now,
                });
                JobEventOutcome::Applied
            }
        };
        StructuredLogger::log_job_progress(job_id, percent, step);
        Ok(outcome)
    }

    pub async fn on_job_completed(
        &self,
        job_id: &str,
        result_ref: &str,
    ) -> SchedulerResult<JobEventOutcome> {
        self.settle(job_id, Settlement::Completed, result_ref).await
    }

    pub async fn on_job_failed(&self, job_id: &str, error: &str) -> SchedulerResult<JobEventOutcome> {
        self.settle(job_id, Settlement::Failed, error).await
    }

    pub fn job_progress(&self, job_id: &str) -> Option<JobProgress> {
        self.progress.get(job_id).map(|p| p.value().clone())
    }

    /// 移除 `cutoff` 之前结束的任务记录和之后再无更新的进度。
    /// 被移除任务的迟到事件按关联失败处理。
    pub fn prune(&self, cutoff: DateTime<Utc>) -> PrunedJobs {
        let progress_before = self.progress.len();
        self.progress.retain(|_, p| p.updated_at >= cutoff);
        let settled_before = self.settled.len();
        self.settled.retain(|_, job| job.settled_at >= cutoff);

        PrunedJobs {
            progress: progress_before.saturating_sub(self.progress.len()),
            settled: settled_before.saturating_sub(self.settled.len()),
        }
    }

    async fn settle(
        &self,
        job_id: &str,
        settlement: Settlement,
        payload: &str,
    ) -> SchedulerResult<JobEventOutcome> {
        if let Some(post) = self.lifecycle.repository().find_by_job_id(job_id).await? {
            if let Some(outcome) = self
                .settle_current(&post.id, job_id, settlement, payload)
                .await?
            {
                return Ok(outcome);
            }
            // 加锁前任务已与帖子解除关联，按重复事件处理
        }
        self.settle_duplicate(job_id, settlement, payload).await
    }

    async fn settle_current(
        &self,
        post_id: &str,
        job_id: &str,
        settlement: Settlement,
        payload: &str,
    ) -> SchedulerResult<Option<JobEventOutcome>> {
        let mutation = self
            .lifecycle
            .mutate(post_id, |post, now| -> SchedulerResult<Option<CurrentStep>> {
                if post.job_id.as_deref() != Some(job_id) {
                    return Ok(None);
                }
                let step = match (settlement, post.status) {
                    (Settlement::Completed, PostStatus::Scheduled) => {
                        PostStateMachine::populate_content(post, payload.to_string(), now)?;
                        CurrentStep::ContentReady
                    }
                    (Settlement::Completed, PostStatus::Processing) => {
                        PostStateMachine::populate_content(post, payload.to_string(), now)?;
                        CurrentStep::Publish
                    }
                    (Settlement::Failed, PostStatus::Processing) => {
                        CurrentStep::Terminal(PostStateMachine::mark_failed(post, payload, now)?)
                    }
                    (Settlement::Failed, PostStatus::Scheduled) => {
                        PostStateMachine::record_generation_failure(post, payload, now)?;
                        CurrentStep::FailedBeforeDispatch
                    }
                    (_, PostStatus::Published | PostStatus::Failed | PostStatus::Cancelled) => {
                        return Ok(None)
                    }
                };
                Ok(Some(step))
            })
            .await?;

        let Some(step) = mutation.value else {
            return Ok(None);
        };
        let post = &mutation.post;

        let outcome = match step {
            CurrentStep::ContentReady => {
                info!("帖子 {} 的生成内容已就绪，等待发布窗口", post.id);
                self.lifecycle.content_ready(post, job_id);
                self.remember(job_id, post.id.clone(), post.attempt, settlement);
                JobEventOutcome::Applied
            }
            CurrentStep::Publish => {
                self.lifecycle.content_ready(post, job_id);
                self.remember(job_id, post.id.clone(), post.attempt, settlement);
                let (published, _) = self
                    .lifecycle
                    .publish_with(self.adapter.as_ref(), post)
                    .await?;
                info!(
                    "帖子 {} 的生成内容已就绪并提交发布，结果: {}",
                    published.id, published.status
                );
                JobEventOutcome::Applied
            }
            CurrentStep::Terminal(outcome) => {
                self.lifecycle.after_terminal(
                    &Mutation {
                        previous: mutation.previous,
                        post: post.clone(),
                        value: outcome,
                    },
                    settlement.event_type(),
                );
                self.remember(job_id, post.id.clone(), post.attempt, settlement);
                JobEventOutcome::Applied
            }
            CurrentStep::FailedBeforeDispatch => {
                warn!(
                    "生成任务 {} 失败，帖子 {} 尚未派发，可关联新任务或取消: {}",
                    job_id, post.id, payload
                );
                self.remember(job_id, post.id.clone(), post.attempt, settlement);
                JobEventOutcome::Applied
            }
        };
        Ok(Some(outcome))
    }

    async fn settle_duplicate(
        &self,
        job_id: &str,
        settlement: Settlement,
        payload: &str,
    ) -> SchedulerResult<JobEventOutcome> {
        let Some(record) = self.settled.get(job_id).map(|r| r.value().clone()) else {
            return Ok(self.correlation_miss(job_id, settlement));
        };

        let result = self
            .lifecycle
            .mutate(&record.post_id, |post, now| -> SchedulerResult<DuplicateStep> {
                if post.attempt != record.attempt {
                    return Ok(DuplicateStep::Stale);
                }
                let step = match post.status {
                    PostStatus::Published | PostStatus::Failed => {
                        let outcome = match settlement {
                            Settlement::Completed => {
                                let published_ref = post.published_ref.clone();
                                PostStateMachine::mark_published(post, published_ref, now)?
                            }
                            Settlement::Failed => PostStateMachine::mark_failed(post, payload, now)?,
                        };
                        DuplicateStep::Terminal(outcome)
                    }
                    PostStatus::Scheduled | PostStatus::Processing | PostStatus::Cancelled => {
                        DuplicateStep::AlreadySettled {
                            same: record.settlement == settlement,
                        }
                    }
                };
                Ok(step)
            })
            .await;

        let mutation = match result {
            Ok(mutation) => mutation,
            Err(SchedulerError::PostNotFound { .. }) => {
                return Ok(self.correlation_miss(job_id, settlement))
            }
            Err(e) => return Err(e),
        };

        let outcome = match mutation.value {
            DuplicateStep::Stale => self.correlation_miss(job_id, settlement),
            DuplicateStep::Terminal(outcome) => {
                self.lifecycle.after_terminal(
                    &Mutation {
                        previous: mutation.previous,
                        post: mutation.post,
                        value: outcome,
                    },
                    settlement.event_type(),
                );
                match outcome {
                    TransitionOutcome::Unchanged => JobEventOutcome::Absorbed,
                    TransitionOutcome::Conflict { .. } => JobEventOutcome::Ignored,
                    TransitionOutcome::Applied => JobEventOutcome::Applied,
                }
            }
            DuplicateStep::AlreadySettled { same: true } => {
                debug!("任务 {} 的重复 {} 事件已吸收", job_id, settlement.event_type());
                JobEventOutcome::Absorbed
            }
            DuplicateStep::AlreadySettled { same: false } => {
                warn!(
                    "任务 {} 已结束，忽略与之矛盾的 {} 事件",
                    job_id,
                    settlement.event_type()
                );
                JobEventOutcome::Ignored
            }
        };
        Ok(outcome)
    }

    fn remember(&self, job_id: &str, post_id: String, attempt: u32, settlement: Settlement) {
        self.progress.remove(job_id);
        self.settled.insert(
            job_id.to_string(),
            SettledJob {
                post_id,
                attempt,
                settlement,
                settled_at: self.lifecycle.clock().now(),
            },
        );
    }

    fn correlation_miss(&self, job_id: &str, settlement: Settlement) -> JobEventOutcome {
        let miss = SchedulerError::CorrelationMiss {
            job_id: job_id.to_string(),
        };
        debug!("{}", miss);
        StructuredLogger::log_correlation_miss(job_id, settlement.event_type());
        self.metrics.record_correlation_miss(settlement.event_type());
        JobEventOutcome::CorrelationMiss
    }
}
