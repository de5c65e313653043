use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use publisher_core::{SchedulerError, SchedulerResult};
use publisher_domain::{DispatchOutcome, Platform, PlatformDispatchAdapter};

/// 只记录日志的发布适配器
///
/// 嵌入式部署时没有真实的平台API，发布请求写入日志并返回一个本地生成的引用。
#[derive(Debug, Clone, Default)]
pub struct LoggingDispatchAdapter;

impl LoggingDispatchAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PlatformDispatchAdapter for LoggingDispatchAdapter {
    async fn prepare(&self, platform: Platform) -> SchedulerResult<()> {
        info!("平台 {} 发布通道就绪", platform);
        Ok(())
    }

    async fn publish(&self, platform: Platform, post_body: &str) -> SchedulerResult<DispatchOutcome> {
        if post_body.trim().is_empty() {
            return Err(SchedulerError::DispatchFailed {
                platform: platform.to_string(),
                reason: "帖子正文为空".to_string(),
            });
        }

        let published_ref = format!("{}-{}", platform.as_str(), Uuid::new_v4());
        info!(
            "发布到 {}: {} 字符, 引用 {}",
            platform,
            post_body.chars().count(),
            published_ref
        );
        Ok(DispatchOutcome::Success { published_ref })
    }
}
