use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use publisher_core::{SchedulerError, SchedulerResult};

/// 发布目标平台
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Facebook,
    Twitter,
    Instagram,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Facebook, Platform::Twitter, Platform::Instagram];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Twitter => "twitter",
            Platform::Instagram => "instagram",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "facebook" => Ok(Platform::Facebook),
            "twitter" => Ok(Platform::Twitter),
            "instagram" => Ok(Platform::Instagram),
            _ => Err(SchedulerError::validation_error(format!(
                "不支持的平台: {s}"
            ))),
        }
    }
}

/// 内容类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    BreakingNews,
    NormalNews,
    Blog,
    Evergreen,
    Recycled,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::BreakingNews => "breaking_news",
            ContentType::NormalNews => "normal_news",
            ContentType::Blog => "blog",
            ContentType::Evergreen => "evergreen",
            ContentType::Recycled => "recycled",
        }
    }

    /// 默认优先级，数值越小越先发布
    pub fn default_priority(&self) -> i32 {
        match self {
            ContentType::BreakingNews => 1,
            ContentType::NormalNews => 3,
            ContentType::Blog => 5,
            ContentType::Evergreen => 6,
            ContentType::Recycled => 8,
        }
    }

    /// 未指定发布时间时是否立即发布
    pub fn publishes_immediately(&self) -> bool {
        matches!(self, ContentType::BreakingNews)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breaking_news" => Ok(ContentType::BreakingNews),
            "normal_news" => Ok(ContentType::NormalNews),
            "blog" => Ok(ContentType::Blog),
            "evergreen" => Ok(ContentType::Evergreen),
            "recycled" => Ok(ContentType::Recycled),
            _ => Err(SchedulerError::validation_error(format!(
                "不支持的内容类型: {s}"
            ))),
        }
    }
}

/// 帖子状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Scheduled,
    Processing,
    Published,
    Failed,
    Cancelled,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Scheduled => "scheduled",
            PostStatus::Processing => "processing",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
            PostStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            PostStatus::Published | PostStatus::Failed | PostStatus::Cancelled => true,
            PostStatus::Scheduled | PostStatus::Processing => false,
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 回收分类
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RecycleType {
    PureEvergreen,
    SeasonalEvergreen,
    Durable,
    NotRecyclable,
}

impl RecycleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecycleType::PureEvergreen => "pure_evergreen",
            RecycleType::SeasonalEvergreen => "seasonal_evergreen",
            RecycleType::Durable => "durable",
            RecycleType::NotRecyclable => "not_recyclable",
        }
    }

    pub fn is_recyclable(&self) -> bool {
        !matches!(self, RecycleType::NotRecyclable)
    }
}

impl fmt::Display for RecycleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一条排期发布记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledPost {
    pub id: String,
    pub content_id: String,
    pub platform: Platform,
    pub content_type: ContentType,
    pub status: PostStatus,
    pub scheduled_at: DateTime<Utc>,
    pub priority: i32,
    pub post_body: String,
    /// 仅在依赖尚未完成的生成任务时存在
    pub job_id: Option<String>,
    pub cancel_reason: Option<String>,
    pub failure_reason: Option<String>,
    pub published_ref: Option<String>,
    /// 每次重新排期加一，用于区分迟到的旧任务事件
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScheduledPost {
    pub fn new(
        content_id: String,
        platform: Platform,
        content_type: ContentType,
        scheduled_at: DateTime<Utc>,
        post_body: String,
        priority: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content_id,
            platform,
            content_type,
            status: PostStatus::Scheduled,
            scheduled_at,
            priority,
            post_body,
            job_id: None,
            cancel_reason: None,
            failure_reason: None,
            published_ref: None,
            attempt: 1,
            created_at: now,
            updated_at: now,
            dispatched_at: None,
            completed_at: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == PostStatus::Scheduled && self.scheduled_at <= now
    }

    pub fn awaits_generation(&self) -> bool {
        self.job_id.is_some()
    }

    /// 没有正文、没有生成任务，也没有记录生成失败：需要先关联新任务才能派发
    pub fn awaits_content(&self) -> bool {
        self.job_id.is_none() && self.post_body.trim().is_empty() && self.failure_reason.is_none()
    }

    pub fn entity_description(&self) -> String {
        format!(
            "帖子 {} (内容: {}, 平台: {}, 状态: {})",
            self.id, self.content_id, self.platform, self.status
        )
    }
}

/// 列表查询过滤条件
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub platform: Option<Platform>,
    pub content_type: Option<ContentType>,
    pub status: Option<PostStatus>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl PostFilter {
    pub fn matches(&self, post: &ScheduledPost) -> bool {
        self.platform.is_none_or(|p| post.platform == p)
            && self.content_type.is_none_or(|t| post.content_type == t)
            && self.status.is_none_or(|s| post.status == s)
            && self.date_from.is_none_or(|from| post.scheduled_at >= from)
            && self.date_to.is_none_or(|to| post.scheduled_at <= to)
    }
}

/// 内容的回收排期状态
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecyclingSchedule {
    pub content_id: String,
    pub recycle_type: RecycleType,
    pub frequency_days: u32,
    pub max_recycles_allowed: u32,
    pub total_recycles: u32,
    pub created_at: DateTime<Utc>,
    pub last_recycled_at: Option<DateTime<Utc>>,
}

impl RecyclingSchedule {
    pub fn new(
        content_id: String,
        recycle_type: RecycleType,
        frequency_days: u32,
        max_recycles_allowed: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            content_id,
            recycle_type,
            frequency_days,
            max_recycles_allowed,
            total_recycles: 0,
            created_at: now,
            last_recycled_at: None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.total_recycles >= self.max_recycles_allowed
    }

    pub fn remaining(&self) -> u32 {
        self.max_recycles_allowed.saturating_sub(self.total_recycles)
    }

    /// 外部扫描任务再次评估该内容的最早时间
    pub fn next_reconsideration_at(&self) -> DateTime<Utc> {
        let base = self.last_recycled_at.unwrap_or(self.created_at);
        base + Duration::days(i64::from(self.frequency_days))
    }

    /// 记录一次成功的回收
    pub fn record_recycle(&mut self, now: DateTime<Utc>) -> SchedulerResult<()> {
        if self.is_exhausted() {
            return Err(SchedulerError::RecycleCapExceeded {
                content_id: self.content_id.clone(),
                total: self.total_recycles,
                max: self.max_recycles_allowed,
            });
        }
        self.total_recycles += 1;
        self.last_recycled_at = Some(now);
        Ok(())
    }
}

/// 回收资格评估结果（只读视图，不持久化）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EligibleContent {
    pub content_id: String,
    pub recycle_type: RecycleType,
    pub performance_score: f64,
    pub age_in_months: u32,
    pub eligibility_reasons: Vec<String>,
}

/// 互动数据
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EngagementMetrics {
    pub impressions: u64,
    pub likes: u64,
    pub shares: u64,
    pub comments: u64,
    pub clicks: u64,
}

/// 上游对内容的标记
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentTag {
    Evergreen,
    NonEvergreen,
    /// 内容包含时效性引用（日期、事件、"今年"等）
    TimeBound,
    /// 周期性日历主题，如节日
    Seasonal { theme: String, period_months: u32 },
    Topic { name: String },
}

/// 内容库返回的内容元数据
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentMetrics {
    pub content_id: String,
    pub published_at: DateTime<Utc>,
    pub engagement: EngagementMetrics,
    pub tags: Vec<ContentTag>,
}

impl ContentMetrics {
    pub fn is_marked_non_evergreen(&self) -> bool {
        self.tags.contains(&ContentTag::NonEvergreen)
    }

    pub fn has_time_bound_references(&self) -> bool {
        self.tags.contains(&ContentTag::TimeBound)
    }

    pub fn seasonal_themes(&self) -> impl Iterator<Item = (&str, u32)> {
        self.tags.iter().filter_map(|tag| match tag {
            ContentTag::Seasonal {
                theme,
                period_months,
            } => Some((theme.as_str(), *period_months)),
            _ => None,
        })
    }
}

/// 生成任务进度（仅用于展示，不影响状态）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobProgress {
    pub job_id: String,
    pub percent: u8,
    pub step: String,
    pub updated_at: DateTime<Utc>,
}

/// 帖子统计
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PostStats {
    pub total: usize,
    pub by_platform: HashMap<Platform, usize>,
    pub by_status: HashMap<PostStatus, usize>,
    pub by_content_type: HashMap<ContentType, usize>,
}

/// 回收统计
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecyclingStats {
    pub total_recycled: u64,
    pub total_eligible: usize,
    pub average_performance: f64,
    pub schedules: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SchedulerStats {
    pub scheduled_posts: PostStats,
    pub recycling: RecyclingStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_enum_string_forms() {
        assert_eq!(Platform::from_str("twitter").unwrap(), Platform::Twitter);
        assert!(Platform::from_str("myspace").is_err());
        assert_eq!(
            ContentType::from_str("breaking_news").unwrap(),
            ContentType::BreakingNews
        );
        assert_eq!(RecycleType::SeasonalEvergreen.to_string(), "seasonal_evergreen");
        assert_eq!(
            serde_json::to_string(&PostStatus::Processing).unwrap(),
            "\"processing\""
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(PostStatus::Published.is_terminal());
        assert!(PostStatus::Failed.is_terminal());
        assert!(PostStatus::Cancelled.is_terminal());
        assert!(!PostStatus::Scheduled.is_terminal());
        assert!(!PostStatus::Processing.is_terminal());
    }

    #[test]
    fn test_default_priority_orders_breaking_news_first() {
        assert!(
            ContentType::BreakingNews.default_priority() < ContentType::Blog.default_priority()
        );
        assert!(
            ContentType::Blog.default_priority() < ContentType::Recycled.default_priority()
        );
    }

    #[test]
    fn test_new_post_is_scheduled() {
        let post = ScheduledPost::new(
            "article-1".to_string(),
            Platform::Facebook,
            ContentType::Blog,
            now(),
            "body".to_string(),
            5,
            now(),
        );
        assert_eq!(post.status, PostStatus::Scheduled);
        assert_eq!(post.attempt, 1);
        assert!(post.job_id.is_none());
        assert!(post.is_due(now()));
        assert!(!post.is_due(now() - Duration::seconds(1)));
    }

    #[test]
    fn test_post_filter() {
        let post = ScheduledPost::new(
            "article-1".to_string(),
            Platform::Twitter,
            ContentType::Recycled,
            now(),
            "body".to_string(),
            8,
            now(),
        );

        assert!(PostFilter::default().matches(&post));
        assert!(PostFilter {
            platform: Some(Platform::Twitter),
            status: Some(PostStatus::Scheduled),
            ..Default::default()
        }
        .matches(&post));
        assert!(!PostFilter {
            content_type: Some(ContentType::Blog),
            ..Default::default()
        }
        .matches(&post));
        assert!(!PostFilter {
            date_from: Some(now() + Duration::hours(1)),
            ..Default::default()
        }
        .matches(&post));
    }

    #[test]
    fn test_recycling_schedule_cap() {
        let mut schedule =
            RecyclingSchedule::new("article-1".to_string(), RecycleType::Durable, 60, 2, now());
        assert_eq!(schedule.next_reconsideration_at(), now() + Duration::days(60));

        schedule.record_recycle(now()).unwrap();
        schedule.record_recycle(now()).unwrap();
        assert!(schedule.is_exhausted());
        assert_eq!(schedule.remaining(), 0);

        let err = schedule.record_recycle(now()).unwrap_err();
        assert!(matches!(err, SchedulerError::RecycleCapExceeded { total: 2, max: 2, .. }));
        assert_eq!(schedule.total_recycles, 2);
    }

    #[test]
    fn test_content_tags() {
        let metrics = ContentMetrics {
            content_id: "a".to_string(),
            published_at: now(),
            engagement: EngagementMetrics::default(),
            tags: vec![
                ContentTag::TimeBound,
                ContentTag::Seasonal {
                    theme: "christmas".to_string(),
                    period_months: 12,
                },
            ],
        };
        assert!(metrics.has_time_bound_references());
        assert!(!metrics.is_marked_non_evergreen());
        assert_eq!(metrics.seasonal_themes().collect::<Vec<_>>(), vec![("christmas", 12)]);
    }
}
