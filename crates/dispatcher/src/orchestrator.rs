//! 排期编排门面
//!
//! 对外暴露排期、回收、取消、重新排期、查询与统计操作，
//! 并负责到期派发与处理超时帖子的清理。计时器由调用方持有。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, instrument, warn};

use publisher_core::{AppConfig, Clock, SchedulerError, SchedulerResult};
use publisher_domain::{
    ContentStore, ContentType, EligibilityScorer, EligibleContent,
    GenerationEvent, JobProgress, NewPost, PerformanceStrategy, Platform,
    PlatformDispatchAdapter, PostEvent, PostFilter, PostStats, PostStatus,
    RecyclingScheduleRepository, ScheduledPost, ScheduledPostRepository, SchedulerStats,
};
use publisher_infrastructure::{MetricsCollector, StructuredLogger};

use crate::job_tracker::{JobCorrelationTracker, PrunedJobs};
use crate::lifecycle::PostLifecycle;
use crate::recycling::RecyclingScheduleManager;
use crate::time_window::TimeWindowPolicy;

/// 处理超时的帖子被标记失败时使用的原因
pub const PROCESSING_TIMEOUT_REASON: &str = "processing timeout";

/// 一次清理的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub jobs: PrunedJobs,
    pub post_locks: usize,
    pub content_locks: usize,
}

/// 外部协作方
#[derive(Clone)]
pub struct SchedulerDependencies {
    pub posts: Arc<dyn ScheduledPostRepository>,
    pub schedules: Arc<dyn RecyclingScheduleRepository>,
    pub content: Arc<dyn ContentStore>,
    pub adapter: Arc<dyn PlatformDispatchAdapter>,
    pub clock: Arc<dyn Clock>,
}

/// 排期选项
#[derive(Debug, Clone, Default)]
pub struct ScheduleOptions {
    pub force_immediate: bool,
    pub custom_scheduled_time: Option<DateTime<Utc>>,
    /// 未指定时使用配置中的默认内容类型
    pub content_type: Option<ContentType>,
    pub priority: Option<i32>,
}

impl ScheduleOptions {
    pub fn immediate() -> Self {
        Self {
            force_immediate: true,
            ..Default::default()
        }
    }

    pub fn at(scheduled_at: DateTime<Utc>) -> Self {
        Self {
            custom_scheduled_time: Some(scheduled_at),
            ..Default::default()
        }
    }
}

/// 一轮到期派发的结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub examined: usize,
    pub published: usize,
    pub failed: usize,
    /// 生成任务尚未完成，已进入处理中，等待任务事件
    pub awaiting_generation: usize,
    /// 没有正文也没有生成任务，等待关联新任务
    pub awaiting_content: usize,
    /// 加锁时状态已变化（例如刚被取消）
    pub skipped: usize,
    pub errors: usize,
}

pub struct Orchestrator {
    lifecycle: Arc<PostLifecycle>,
    recycling: Arc<RecyclingScheduleManager>,
    tracker: Arc<JobCorrelationTracker>,
    adapter: Arc<dyn PlatformDispatchAdapter>,
    windows: Arc<TimeWindowPolicy>,
    clock: Arc<dyn Clock>,
    default_content_type: ContentType,
    metrics: MetricsCollector,
}

impl Orchestrator {
    pub fn new(config: &AppConfig, deps: SchedulerDependencies) -> SchedulerResult<Self> {
        let scorer = EligibilityScorer::new(config.eligibility.clone());
        Self::build(config, deps, scorer)
    }

    pub fn with_strategy(
        config: &AppConfig,
        deps: SchedulerDependencies,
        strategy: Arc<dyn PerformanceStrategy>,
    ) -> SchedulerResult<Self> {
        let scorer = EligibilityScorer::with_strategy(config.eligibility.clone(), strategy);
        Self::build(config, deps, scorer)
    }

    fn build(
        config: &AppConfig,
        deps: SchedulerDependencies,
        scorer: EligibilityScorer,
    ) -> SchedulerResult<Self> {
        let windows = Arc::new(TimeWindowPolicy::from_config(&config.platforms)?);
        let default_content_type: ContentType = config.scheduler.default_content_type.parse()?;

        let lifecycle = Arc::new(PostLifecycle::new(
            deps.posts,
            deps.clock.clone(),
            windows.clone(),
            config.scheduler.event_channel_capacity,
        ));
        let recycling = Arc::new(RecyclingScheduleManager::new(
            scorer,
            config.recycling.clone(),
            deps.content,
            deps.schedules,
            deps.adapter.clone(),
            lifecycle.clone(),
        ));
        let tracker = Arc::new(JobCorrelationTracker::new(
            lifecycle.clone(),
            deps.adapter.clone(),
        ));

        info!("排期编排器初始化完成，默认内容类型: {}", default_content_type);
        Ok(Self {
            lifecycle,
            recycling,
            tracker,
            adapter: deps.adapter,
            windows,
            clock: deps.clock,
            default_content_type,
            metrics: MetricsCollector::new(),
        })
    }

    pub fn tracker(&self) -> Arc<JobCorrelationTracker> {
        self.tracker.clone()
    }

    pub fn recycling(&self) -> Arc<RecyclingScheduleManager> {
        self.recycling.clone()
    }

    pub fn windows(&self) -> &TimeWindowPolicy {
        &self.windows
    }

    /// 订阅帖子生命周期事件
    pub fn subscribe(&self) -> broadcast::Receiver<PostEvent> {
        self.lifecycle.subscribe()
    }

    /// 在后台消费生成任务事件
    pub async fn listen_for_jobs(
        &self,
        events: mpsc::Receiver<GenerationEvent>,
        shutdown: broadcast::Receiver<()>,
    ) -> SchedulerResult<()> {
        self.tracker.run(events, shutdown).await
    }

    #[instrument(skip(self, post_body, options))]
    pub async fn schedule_content(
        &self,
        content_id: &str,
        platform: Platform,
        post_body: &str,
        options: ScheduleOptions,
    ) -> SchedulerResult<ScheduledPost> {
        if post_body.trim().is_empty() {
            return Err(SchedulerError::validation_error("帖子正文不能为空"));
        }
        let request = self.build_request(content_id, platform, post_body.to_string(), None, options)?;
        self.lifecycle.create(request).await
    }

    /// 为尚在生成中的内容排期：正文为空，等待任务完成后填充
    #[instrument(skip(self, options))]
    pub async fn schedule_generated(
        &self,
        content_id: &str,
        platform: Platform,
        content_type: ContentType,
        job_id: &str,
        options: ScheduleOptions,
    ) -> SchedulerResult<ScheduledPost> {
        if job_id.trim().is_empty() {
            return Err(SchedulerError::validation_error("生成任务ID不能为空"));
        }
        let options = ScheduleOptions {
            content_type: Some(content_type),
            ..options
        };
        let request = self.build_request(
            content_id,
            platform,
            String::new(),
            Some(job_id.to_string()),
            options,
        )?;
        self.lifecycle.create(request).await
    }

    pub async fn schedule_recycled(
        &self,
        content_id: &str,
        platforms: &[Platform],
    ) -> SchedulerResult<Vec<ScheduledPost>> {
        self.recycling.schedule_recycle(content_id, platforms).await
    }

    pub async fn cancel(
        &self,
        post_id: &str,
        reason: Option<String>,
    ) -> SchedulerResult<ScheduledPost> {
        self.lifecycle.cancel(post_id, reason).await
    }

    pub async fn reschedule(
        &self,
        post_id: &str,
        new_scheduled_at: Option<DateTime<Utc>>,
    ) -> SchedulerResult<ScheduledPost> {
        self.lifecycle.reschedule(post_id, new_scheduled_at).await
    }

    pub async fn attach_job(&self, post_id: &str, job_id: &str) -> SchedulerResult<ScheduledPost> {
        if job_id.trim().is_empty() {
            return Err(SchedulerError::validation_error("生成任务ID不能为空"));
        }
        self.lifecycle.attach_job(post_id, job_id.to_string()).await
    }

    pub async fn get_post(&self, post_id: &str) -> SchedulerResult<ScheduledPost> {
        self.lifecycle.get(post_id).await
    }

    pub async fn list_scheduled(&self, filter: &PostFilter) -> SchedulerResult<Vec<ScheduledPost>> {
        self.lifecycle.repository().list(filter).await
    }

    pub async fn check_eligibility(&self, content_id: &str) -> SchedulerResult<EligibleContent> {
        self.recycling.check_eligibility(content_id).await
    }

    pub async fn list_eligible_for_recycle(
        &self,
        limit: usize,
    ) -> SchedulerResult<Vec<EligibleContent>> {
        self.recycling.list_eligible(limit).await
    }

    pub async fn due_for_reconsideration(&self) -> SchedulerResult<Vec<String>> {
        self.recycling
            .due_for_reconsideration(self.clock.now())
            .await
    }

    pub fn job_progress(&self, job_id: &str) -> Option<JobProgress> {
        self.tracker.job_progress(job_id)
    }

    pub async fn get_stats(&self) -> SchedulerResult<SchedulerStats> {
        let posts = self.lifecycle.repository().list(&PostFilter::default()).await?;
        let mut scheduled_posts = PostStats {
            total: posts.len(),
            ..Default::default()
        };
        for post in &posts {
            *scheduled_posts.by_platform.entry(post.platform).or_default() += 1;
            *scheduled_posts.by_status.entry(post.status).or_default() += 1;
            *scheduled_posts
                .by_content_type
                .entry(post.content_type)
                .or_default() += 1;
        }

        Ok(SchedulerStats {
            scheduled_posts,
            recycling: self.recycling.stats().await?,
        })
    }

    /// 派发所有到期帖子。平台适配器的错误不会向外传播，只记录到帖子上。
    pub async fn dispatch_due(&self) -> SchedulerResult<DispatchReport> {
        let now = self.clock.now();
        let due = self.lifecycle.repository().find_due(now).await?;
        self.metrics.record_due_posts(due.len());

        let mut report = DispatchReport {
            examined: due.len(),
            ..Default::default()
        };
        if due.is_empty() {
            return Ok(report);
        }
        debug!("发现 {} 条到期帖子", due.len());

        for post in due {
            let post = match self.lifecycle.begin_dispatch(&post.id).await {
                Ok(Some(post)) => post,
                Ok(None) => {
                    report.awaiting_content += 1;
                    continue;
                }
                Err(SchedulerError::InvalidTransition { .. }) => {
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    StructuredLogger::log_system_error("orchestrator", "begin_dispatch", &e);
                    report.errors += 1;
                    continue;
                }
            };

            if post.awaits_generation() {
                report.awaiting_generation += 1;
                continue;
            }

            let settled = self.lifecycle.publish_with(self.adapter.as_ref(), &post).await;
            match settled {
                Ok((post, _)) => match post.status {
                    PostStatus::Published => report.published += 1,
                    PostStatus::Failed => report.failed += 1,
                    PostStatus::Scheduled | PostStatus::Processing | PostStatus::Cancelled => {}
                },
                Err(e) => {
                    StructuredLogger::log_system_error("orchestrator", "settle_dispatch", &e);
                    report.errors += 1;
                }
            }
        }

        info!(
            "到期派发完成: 共 {} 条, 发布 {} 条, 失败 {} 条, 等待生成 {} 条, 等待关联任务 {} 条",
            report.examined,
            report.published,
            report.failed,
            report.awaiting_generation,
            report.awaiting_content
        );
        Ok(report)
    }

    /// 处理中超过 `max_age` 仍未收到终止结果的帖子
    pub async fn find_stuck_processing(
        &self,
        max_age: Duration,
    ) -> SchedulerResult<Vec<ScheduledPost>> {
        let cutoff = self.clock.now() - max_age;
        let filter = PostFilter {
            status: Some(PostStatus::Processing),
            ..Default::default()
        };
        let posts = self.lifecycle.repository().list(&filter).await?;
        Ok(posts
            .into_iter()
            .filter(|post| post.dispatched_at.is_some_and(|at| at < cutoff))
            .collect())
    }

    /// 将处理超时的帖子标记为失败，返回本次实际被标记的帖子
    pub async fn expire_stuck(&self, max_age: Duration) -> SchedulerResult<Vec<ScheduledPost>> {
        let mut expired = Vec::new();
        for post in self.find_stuck_processing(max_age).await? {
            if let Some(dispatched_at) = post.dispatched_at {
                StructuredLogger::log_stuck_post(&post.id, dispatched_at);
            }
            match self
                .lifecycle
                .mark_failed(&post.id, PROCESSING_TIMEOUT_REASON)
                .await
            {
                Ok((post, outcome)) if outcome.is_applied() => expired.push(post),
                Ok(_) => {}
                Err(e) => StructuredLogger::log_system_error("orchestrator", "expire_stuck", &e),
            }
        }
        if !expired.is_empty() {
            warn!("{} 条帖子处理超时，已标记失败", expired.len());
        }
        Ok(expired)
    }

    /// 清理超过 `retention` 的任务记录与空闲锁
    pub fn prune(&self, retention: Duration) -> PruneReport {
        let report = PruneReport {
            jobs: self.tracker.prune(self.clock.now() - retention),
            post_locks: self.lifecycle.prune_locks(),
            content_locks: self.recycling.prune_locks(),
        };
        if report != PruneReport::default() {
            debug!("清理完成: {:?}", report);
        }
        report
    }

    fn build_request(
        &self,
        content_id: &str,
        platform: Platform,
        post_body: String,
        job_id: Option<String>,
        options: ScheduleOptions,
    ) -> SchedulerResult<NewPost> {
        if content_id.trim().is_empty() {
            return Err(SchedulerError::validation_error("内容ID不能为空"));
        }

        let content_type = options.content_type.unwrap_or(self.default_content_type);
        let now = self.clock.now();

        let (scheduled_at, force_immediate) = if options.force_immediate {
            (now, true)
        } else if let Some(at) = options.custom_scheduled_time {
            (at, false)
        } else if content_type.publishes_immediately() {
            (now, true)
        } else {
            (self.windows.next_window(platform, now)?, false)
        };

        Ok(NewPost {
            content_id: content_id.to_string(),
            platform,
            content_type,
            scheduled_at,
            post_body,
            priority: options.priority,
            force_immediate,
            job_id,
        })
    }
}
