use thiserror::Error;

/// 发布调度错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("无效的发布时间: {scheduled_at} 早于当前时间 {now}")]
    InvalidScheduleTime { scheduled_at: String, now: String },

    #[error("非法的状态转换: 帖子 {post_id} 无法从 {from} 执行 {action}")]
    InvalidTransition {
        post_id: String,
        from: String,
        action: String,
    },

    #[error("帖子 {post_id} 正在处理中，无法取消")]
    CannotCancelInProgress { post_id: String },

    #[error("帖子 {post_id} 已处于终止状态 {status}，无法取消")]
    CannotCancelTerminal { post_id: String, status: String },

    #[error("内容 {content_id} 不符合回收条件")]
    NotEligible { content_id: String },

    #[error("内容 {content_id} 已达到回收上限: {total}/{max}")]
    RecycleCapExceeded {
        content_id: String,
        total: u32,
        max: u32,
    },

    #[error("平台发布失败: {platform} - {reason}")]
    DispatchFailed { platform: String, reason: String },

    #[error("任务事件无法关联: job_id={job_id}")]
    CorrelationMiss { job_id: String },

    #[error("帖子未找到: {id}")]
    PostNotFound { id: String },

    #[error("内容未找到: {id}")]
    ContentNotFound { id: String },

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("存储操作错误: {0}")]
    Storage(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

impl SchedulerError {
    pub fn post_not_found<S: Into<String>>(id: S) -> Self {
        Self::PostNotFound { id: id.into() }
    }

    pub fn content_not_found<S: Into<String>>(id: S) -> Self {
        Self::ContentNotFound { id: id.into() }
    }

    pub fn storage_error<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// 仅存储层的瞬时故障可以重试；状态冲突和校验错误代表前置条件不满足
    pub fn is_retryable(&self) -> bool {
        matches!(self, SchedulerError::Storage(_))
    }

    /// 需要同步返回给调用方的校验/状态冲突错误
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            SchedulerError::InvalidScheduleTime { .. }
                | SchedulerError::InvalidTransition { .. }
                | SchedulerError::CannotCancelInProgress { .. }
                | SchedulerError::CannotCancelTerminal { .. }
                | SchedulerError::NotEligible { .. }
                | SchedulerError::RecycleCapExceeded { .. }
                | SchedulerError::PostNotFound { .. }
                | SchedulerError::ContentNotFound { .. }
                | SchedulerError::ValidationError(_)
        )
    }

    pub fn user_message(&self) -> &str {
        match self {
            SchedulerError::InvalidScheduleTime { .. } => "发布时间不能早于当前时间",
            SchedulerError::InvalidTransition { .. } => "当前状态不允许该操作",
            SchedulerError::CannotCancelInProgress { .. } => "帖子正在发布中，无法取消",
            SchedulerError::CannotCancelTerminal { .. } => "帖子已结束，无法取消",
            SchedulerError::NotEligible { .. } => "该内容暂不符合回收条件",
            SchedulerError::RecycleCapExceeded { .. } => "该内容已达到最大回收次数",
            SchedulerError::DispatchFailed { .. } => "平台发布失败，请稍后重新安排",
            SchedulerError::PostNotFound { .. } => "请求的帖子不存在",
            SchedulerError::ContentNotFound { .. } => "请求的内容不存在",
            SchedulerError::ValidationError(_) => "输入数据验证失败",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for SchedulerError {
    fn from(err: anyhow::Error) -> Self {
        SchedulerError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for SchedulerError {
    fn from(err: config::ConfigError) -> Self {
        SchedulerError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SchedulerError::RecycleCapExceeded {
            content_id: "article-1".to_string(),
            total: 4,
            max: 4,
        };
        assert_eq!(err.to_string(), "内容 article-1 已达到回收上限: 4/4");

        let err = SchedulerError::CorrelationMiss {
            job_id: "job-42".to_string(),
        };
        assert_eq!(err.to_string(), "任务事件无法关联: job_id=job-42");

        let err = SchedulerError::post_not_found("post-1");
        assert_eq!(err.to_string(), "帖子未找到: post-1");
    }

    #[test]
    fn test_error_classification() {
        assert!(SchedulerError::storage_error("lock poisoned").is_retryable());
        assert!(!SchedulerError::NotEligible {
            content_id: "a".to_string()
        }
        .is_retryable());

        assert!(SchedulerError::CannotCancelInProgress {
            post_id: "p".to_string()
        }
        .is_user_facing());
        assert!(!SchedulerError::CorrelationMiss {
            job_id: "j".to_string()
        }
        .is_user_facing());
        assert!(!SchedulerError::DispatchFailed {
            platform: "twitter".to_string(),
            reason: "rate limited".to_string()
        }
        .is_user_facing());
    }

    #[test]
    fn test_user_message() {
        let err = SchedulerError::InvalidScheduleTime {
            scheduled_at: "2024-01-01".to_string(),
            now: "2024-02-01".to_string(),
        };
        assert_eq!(err.user_message(), "发布时间不能早于当前时间");
        assert_eq!(
            SchedulerError::Internal("x".to_string()).user_message(),
            "系统繁忙，请稍后重试"
        );
    }

    #[test]
    fn test_from_serde_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
        let err: SchedulerError = json_err.into();
        assert!(matches!(err, SchedulerError::Serialization(_)));
    }
}
