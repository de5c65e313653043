//! 领域仓储抽象
//!
//! 定义数据访问的抽象接口，遵循依赖倒置原则

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{PostFilter, RecyclingSchedule, ScheduledPost};
use publisher_core::SchedulerResult;

/// 排期帖子仓储抽象
///
/// 帖子一经提交永不删除；`remove_uncommitted` 只用于回滚同一批次中
/// 尚未对外可见的暂存记录。
#[async_trait]
pub trait ScheduledPostRepository: Send + Sync {
    async fn insert(&self, post: &ScheduledPost) -> SchedulerResult<()>;
    /// 批量插入，全部成功或全部不写入
    async fn insert_batch(&self, posts: &[ScheduledPost]) -> SchedulerResult<()>;
    async fn update(&self, post: &ScheduledPost) -> SchedulerResult<()>;
    async fn find_by_id(&self, id: &str) -> SchedulerResult<Option<ScheduledPost>>;
    async fn find_by_job_id(&self, job_id: &str) -> SchedulerResult<Option<ScheduledPost>>;
    async fn list(&self, filter: &PostFilter) -> SchedulerResult<Vec<ScheduledPost>>;
    async fn find_due(&self, now: DateTime<Utc>) -> SchedulerResult<Vec<ScheduledPost>>;
    async fn remove_uncommitted(&self, ids: &[String]) -> SchedulerResult<()>;
}

/// 回收排期仓储抽象
#[async_trait]
pub trait RecyclingScheduleRepository: Send + Sync {
    async fn find_by_content_id(
        &self,
        content_id: &str,
    ) -> SchedulerResult<Option<RecyclingSchedule>>;
    async fn save(&self, schedule: &RecyclingSchedule) -> SchedulerResult<()>;
    async fn find_all(&self) -> SchedulerResult<Vec<RecyclingSchedule>>;
}
