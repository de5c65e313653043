use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tracing::debug;

use publisher_core::{PlatformWindowConfig, SchedulerError, SchedulerResult};
use publisher_domain::{Platform, ScheduledPost};

/// 平台发布时间窗口
///
/// 每个平台一个6段CRON表达式（秒 分 时 日 月 周），窗口为表达式命中的时间点。
#[derive(Debug, Clone)]
pub struct TimeWindowPolicy {
    schedules: HashMap<Platform, Schedule>,
}

impl TimeWindowPolicy {
    pub fn from_config(config: &PlatformWindowConfig) -> SchedulerResult<Self> {
        let mut schedules = HashMap::new();
        for platform in Platform::ALL {
            let expr = match platform {
                Platform::Facebook => &config.facebook,
                Platform::Twitter => &config.twitter,
                Platform::Instagram => &config.instagram,
            };
            schedules.insert(platform, parse(expr)?);
        }
        Ok(Self { schedules })
    }

    /// `after` 之后（不含）的下一个发布窗口
    pub fn next_window(
        &self,
        platform: Platform,
        after: DateTime<Utc>,
    ) -> SchedulerResult<DateTime<Utc>> {
        let next = self
            .schedule(platform)?
            .after(&after)
            .next()
            .ok_or_else(|| {
                SchedulerError::Internal(format!("平台 {} 没有后续发布窗口", platform))
            })?;
        debug!(
            "平台 {} 下一个发布窗口: {}",
            platform,
            next.format("%Y-%m-%d %H:%M:%S UTC")
        );
        Ok(next)
    }

    pub fn upcoming_windows(
        &self,
        platform: Platform,
        after: DateTime<Utc>,
        count: usize,
    ) -> SchedulerResult<Vec<DateTime<Utc>>> {
        Ok(self.schedule(platform)?.after(&after).take(count).collect())
    }

    /// 重新排期时使用的默认时间
    pub fn next_window_for(
        &self,
        post: &ScheduledPost,
        now: DateTime<Utc>,
    ) -> SchedulerResult<DateTime<Utc>> {
        self.next_window(post.platform, now)
    }

    pub fn validate_cron_expression(expr: &str) -> SchedulerResult<()> {
        parse(expr).map(|_| ())
    }

    fn schedule(&self, platform: Platform) -> SchedulerResult<&Schedule> {
        self.schedules
            .get(&platform)
            .ok_or_else(|| SchedulerError::config_error(format!("平台 {} 未配置发布窗口", platform)))
    }
}

fn parse(expr: &str) -> SchedulerResult<Schedule> {
    Schedule::from_str(expr).map_err(|e| SchedulerError::InvalidCron {
        expr: expr.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn policy() -> TimeWindowPolicy {
        TimeWindowPolicy::from_config(&PlatformWindowConfig::default()).unwrap()
    }

    #[test]
    fn test_next_window_per_platform() {
        let policy = policy();
        let at = Utc.with_ymd_and_hms(2024, 5, 10, 10, 30, 0).unwrap();

        assert_eq!(
            policy.next_window(Platform::Facebook, at).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 10, 13, 0, 0).unwrap()
        );
        assert_eq!(
            policy.next_window(Platform::Twitter, at).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
        );
        assert_eq!(
            policy.next_window(Platform::Instagram, at).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 10, 11, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_window_is_strictly_after() {
        let policy = policy();
        let at = Utc.with_ymd_and_hms(2024, 5, 10, 19, 0, 0).unwrap();
        assert_eq!(
            policy.next_window(Platform::Instagram, at).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 11, 11, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_upcoming_windows() {
        let policy = policy();
        let at = Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap();
        let windows = policy.upcoming_windows(Platform::Facebook, at, 4).unwrap();
        assert_eq!(windows.len(), 4);
        assert_eq!(windows[0], Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap());
        assert_eq!(windows[3], Utc.with_ymd_and_hms(2024, 5, 11, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_invalid_expression_rejected() {
        let config = PlatformWindowConfig {
            twitter: "not a cron".to_string(),
            ..Default::default()
        };
        let err = TimeWindowPolicy::from_config(&config).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidCron { .. }));
        assert!(TimeWindowPolicy::validate_cron_expression("0 0 9 * * *").is_ok());
    }
}
