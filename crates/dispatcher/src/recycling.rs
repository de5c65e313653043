//! 常青内容回收排期管理
//!
//! 每次回收事件在内容ID锁内完成：重新评估资格、检查上限、
//! 准备全部平台、整批暂存帖子、再提交计数。任一步失败都不会留下部分状态。

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use tracing::{debug, info, instrument, warn};

use publisher_core::{Clock, RecycleLimits, RecyclingConfig, SchedulerError, SchedulerResult};
use publisher_domain::{
    ContentStore, ContentType, EligibilityScorer, EligibleContent, NewPost, Platform,
    PlatformDispatchAdapter, RecycleType, RecyclingSchedule, RecyclingScheduleRepository,
    RecyclingStats, ScheduledPost,
};
use publisher_infrastructure::{MetricsCollector, StructuredLogger};

use crate::lifecycle::PostLifecycle;
use crate::locks::KeyedLocks;

pub struct RecyclingScheduleManager {
    scorer: EligibilityScorer,
    limits: RecyclingConfig,
    content: Arc<dyn ContentStore>,
    schedules: Arc<dyn RecyclingScheduleRepository>,
    adapter: Arc<dyn PlatformDispatchAdapter>,
    lifecycle: Arc<PostLifecycle>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
    metrics: MetricsCollector,
}

impl RecyclingScheduleManager {
    pub fn new(
        scorer: EligibilityScorer,
        limits: RecyclingConfig,
        content: Arc<dyn ContentStore>,
        schedules: Arc<dyn RecyclingScheduleRepository>,
        adapter: Arc<dyn PlatformDispatchAdapter>,
        lifecycle: Arc<PostLifecycle>,
    ) -> Self {
        let clock = lifecycle.clock().clone();
        Self {
            scorer,
            limits,
            content,
            schedules,
            adapter,
            lifecycle,
            clock,
            locks: KeyedLocks::new(),
            metrics: MetricsCollector::new(),
        }
    }

    pub fn scorer(&self) -> &EligibilityScorer {
        &self.scorer
    }

    pub async fn check_eligibility(&self, content_id: &str) -> SchedulerResult<EligibleContent> {
        let metrics = self
            .content
            .get_content_metrics(content_id)
            .await?
            .ok_or_else(|| SchedulerError::content_not_found(content_id))?;
        let result = self.scorer.classify(&metrics, self.clock.now());
        debug!(
            "内容 {} 回收评估: {} (分数 {:.1}, 月龄 {})",
            content_id, result.recycle_type, result.performance_score, result.age_in_months
        );
        Ok(result)
    }

    /// 为一次回收事件在多个平台上创建帖子，总回收次数加一
    #[instrument(skip(self, platforms))]
    pub async fn schedule_recycle(
        &self,
        content_id: &str,
        platforms: &[Platform],
    ) -> SchedulerResult<Vec<ScheduledPost>> {
        let platforms = dedup_platforms(platforms);
        if platforms.is_empty() {
            return Err(SchedulerError::validation_error("回收至少需要指定一个平台"));
        }

        let _guard = self.locks.lock(content_id).await;

        let eligible = self.check_eligibility(content_id).await?;
        let Some(limits) = limits_for(&self.limits, eligible.recycle_type) else {
            StructuredLogger::log_recycle_rejected(content_id, "not_recyclable");
            return Err(SchedulerError::NotEligible {
                content_id: content_id.to_string(),
            });
        };

        let now = self.clock.now();
        let mut schedule = match self.schedules.find_by_content_id(content_id).await? {
            Some(mut existing) => {
                // 上限在创建时确定，之后只跟随最新分类
                existing.recycle_type = eligible.recycle_type;
                existing
            }
            None => RecyclingSchedule::new(
                content_id.to_string(),
                eligible.recycle_type,
                limits.frequency_days,
                limits.max_recycles,
                now,
            ),
        };

        if schedule.is_exhausted() {
            StructuredLogger::log_recycle_rejected(content_id, "cap_exceeded");
            return Err(SchedulerError::RecycleCapExceeded {
                content_id: content_id.to_string(),
                total: schedule.total_recycles,
                max: schedule.max_recycles_allowed,
            });
        }

        try_join_all(platforms.iter().map(|p| self.adapter.prepare(*p))).await?;

        let post_body = self
            .content
            .get_post_body(content_id)
            .await?
            .ok_or_else(|| SchedulerError::content_not_found(content_id))?;

        let windows = self.lifecycle.windows();
        let requests = platforms
            .iter()
            .map(|platform| -> SchedulerResult<NewPost> {
                Ok(NewPost {
                    content_id: content_id.to_string(),
                    platform: *platform,
                    content_type: ContentType::Recycled,
                    scheduled_at: windows.next_window(*platform, now)?,
                    post_body: post_body.clone(),
                    priority: None,
                    force_immediate: false,
                    job_id: None,
                })
            })
            .collect::<SchedulerResult<Vec<_>>>()?;

        let posts = self.lifecycle.stage_batch(requests).await?;

        if let Err(e) = self.commit_schedule(&mut schedule, now).await {
            warn!("内容 {} 回收计数提交失败，回滚暂存帖子: {}", content_id, e);
            if let Err(rollback) = self.lifecycle.rollback_batch(&posts).await {
                StructuredLogger::log_system_error("recycling", "rollback_batch", &rollback);
            }
            return Err(e);
        }

        self.lifecycle.commit_batch(&posts);
        StructuredLogger::log_recycle_scheduled(
            content_id,
            &platforms,
            schedule.total_recycles,
            schedule.max_recycles_allowed,
        );
        self.metrics.record_recycle(posts.len());
        Ok(posts)
    }

    async fn commit_schedule(
        &self,
        schedule: &mut RecyclingSchedule,
        now: DateTime<Utc>,
    ) -> SchedulerResult<()> {
        let mut updated = schedule.clone();
        updated.record_recycle(now)?;
        self.schedules.save(&updated).await?;
        *schedule = updated;
        Ok(())
    }

    /// 清理空闲的内容锁
    pub fn prune_locks(&self) -> usize {
        let before = self.locks.len();
        self.locks.prune();
        before.saturating_sub(self.locks.len())
    }

    pub async fn get_schedule(&self, content_id: &str) -> SchedulerResult<Option<RecyclingSchedule>> {
        self.schedules.find_by_content_id(content_id).await
    }

    /// 频率窗口已过、尚未达到上限、可以再次评估的内容
    pub async fn due_for_reconsideration(&self, now: DateTime<Utc>) -> SchedulerResult<Vec<String>> {
        let schedules = self.schedules.find_all().await?;
        Ok(schedules
            .into_iter()
            .filter(|s| !s.is_exhausted() && s.next_reconsideration_at() <= now)
            .map(|s| s.content_id)
            .collect())
    }

    /// 可回收内容，按表现分降序
    pub async fn list_eligible(&self, limit: usize) -> SchedulerResult<Vec<EligibleContent>> {
        let mut eligible = Vec::new();
        for content_id in self.content.list_content_ids().await? {
            let result = match self.check_eligibility(&content_id).await {
                Ok(result) => result,
                Err(SchedulerError::ContentNotFound { .. }) => continue,
                Err(e) => return Err(e),
            };
            if !result.recycle_type.is_recyclable() {
                continue;
            }
            if let Some(schedule) = self.schedules.find_by_content_id(&content_id).await? {
                if schedule.is_exhausted() {
                    continue;
                }
            }
            eligible.push(result);
        }

        eligible.sort_by(|a, b| {
            b.performance_score
                .partial_cmp(&a.performance_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.content_id.cmp(&b.content_id))
        });
        eligible.truncate(limit);
        Ok(eligible)
    }

    pub async fn stats(&self) -> SchedulerResult<RecyclingStats> {
        let schedules = self.schedules.find_all().await?;
        let eligible = self.list_eligible(usize::MAX).await?;

        let average_performance = if eligible.is_empty() {
            0.0
        } else {
            eligible.iter().map(|e| e.performance_score).sum::<f64>() / eligible.len() as f64
        };

        let stats = RecyclingStats {
            total_recycled: schedules.iter().map(|s| u64::from(s.total_recycles)).sum(),
            total_eligible: eligible.len(),
            average_performance,
            schedules: schedules.len(),
        };
        info!(
            "回收统计: 已回收 {} 次, 可回收 {} 条",
            stats.total_recycled, stats.total_eligible
        );
        Ok(stats)
    }
}

fn limits_for(config: &RecyclingConfig, recycle_type: RecycleType) -> Option<&RecycleLimits> {
    match recycle_type {
        RecycleType::PureEvergreen => Some(&config.pure_evergreen),
        RecycleType::SeasonalEvergreen => Some(&config.seasonal_evergreen),
        RecycleType::Durable => Some(&config.durable),
        RecycleType::NotRecyclable => None,
    }
}

/// 去重并保持首次出现的顺序
fn dedup_platforms(platforms: &[Platform]) -> Vec<Platform> {
    let mut unique = Vec::with_capacity(platforms.len());
    for platform in platforms {
        if !unique.contains(platform) {
            unique.push(*platform);
        }
    }
    unique
}
