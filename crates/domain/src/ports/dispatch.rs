use async_trait::async_trait;

use crate::entities::Platform;
use publisher_core::SchedulerResult;

/// 平台发布结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Success { published_ref: String },
    Failure { reason: String },
}

/// 平台发布适配器
///
/// 跨平台格式、限流等语义由适配器自身负责。
#[async_trait]
pub trait PlatformDispatchAdapter: Send + Sync {
    /// 发布前的准备（账号授权、目标可用性）；失败时整批回收排期放弃
    async fn prepare(&self, platform: Platform) -> SchedulerResult<()>;

    /// 发布内容；`Err` 表示调用本身失败，与平台返回的 `Failure` 同样视为发布失败
    async fn publish(&self, platform: Platform, post_body: &str)
        -> SchedulerResult<DispatchOutcome>;
}
