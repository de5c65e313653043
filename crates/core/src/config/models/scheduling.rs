use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 处理超时上限：7天
pub const MAX_PROCESSING_TIMEOUT_SECONDS: u64 = 7 * 24 * 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 到期帖子扫描间隔（秒）
    pub dispatch_interval_seconds: u64,
    /// 处理中帖子的最长停留时间，超过后由看门狗标记失败（秒）
    pub processing_timeout_seconds: u64,
    /// 生成任务事件通道容量
    pub event_channel_capacity: usize,
    /// 未指定内容类型时使用的默认类型
    pub default_content_type: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            dispatch_interval_seconds: 10,
            processing_timeout_seconds: 1800,
            event_channel_capacity: 1024,
            default_content_type: "normal_news".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.dispatch_interval_seconds == 0 {
            return Err(anyhow::anyhow!("调度扫描间隔必须大于0"));
        }

        if self.processing_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("处理超时时间必须大于0"));
        }

        if self.processing_timeout_seconds > MAX_PROCESSING_TIMEOUT_SECONDS {
            return Err(anyhow::anyhow!(
                "处理超时时间不能超过 {} 秒",
                MAX_PROCESSING_TIMEOUT_SECONDS
            ));
        }

        if self.event_channel_capacity == 0 {
            return Err(anyhow::anyhow!("事件通道容量必须大于0"));
        }

        let valid_types = ["breaking_news", "normal_news", "blog", "evergreen", "recycled"];
        if !valid_types.contains(&self.default_content_type.as_str()) {
            return Err(anyhow::anyhow!(
                "无效的默认内容类型: {}，支持的类型: {:?}",
                self.default_content_type,
                valid_types
            ));
        }

        Ok(())
    }
}

/// 各平台的发布时间窗口（6段CRON表达式，含秒）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformWindowConfig {
    pub facebook: String,
    pub twitter: String,
    pub instagram: String,
}

impl Default for PlatformWindowConfig {
    fn default() -> Self {
        Self {
            facebook: "0 0 9,13,17 * * *".to_string(),
            twitter: "0 0 8,12,18,21 * * *".to_string(),
            instagram: "0 0 11,19 * * *".to_string(),
        }
    }
}

impl PlatformWindowConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (platform, expr) in [
            ("facebook", &self.facebook),
            ("twitter", &self.twitter),
            ("instagram", &self.instagram),
        ] {
            cron::Schedule::from_str(expr).map_err(|e| {
                anyhow::anyhow!("平台 {} 的时间窗口表达式无效: {} - {}", platform, expr, e)
            })?;
        }
        Ok(())
    }
}
