use async_trait::async_trait;

use crate::entities::ContentMetrics;
use publisher_core::SchedulerResult;

/// 内容库
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_content_metrics(&self, content_id: &str)
        -> SchedulerResult<Option<ContentMetrics>>;

    /// 回收时重新发布使用的正文
    async fn get_post_body(&self, content_id: &str) -> SchedulerResult<Option<String>>;

    /// 可参与回收评估的全部内容ID
    async fn list_content_ids(&self) -> SchedulerResult<Vec<String>>;
}
