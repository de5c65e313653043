use chrono::{DateTime, Utc};

/// 时间来源抽象
///
/// 所有与时间相关的判断（过去时间校验、内容月龄、时间窗口、卡住的帖子）
/// 都通过注入的时钟读取当前时间。
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
