//! Test data builders

use chrono::{DateTime, Months, Utc};

use publisher_domain::{
    ContentMetrics, ContentTag, ContentType, EngagementMetrics, Platform, PostStatus,
    ScheduledPost,
};

/// Builder for `ContentMetrics`
#[derive(Debug, Clone)]
pub struct ContentMetricsBuilder {
    metrics: ContentMetrics,
}

impl ContentMetricsBuilder {
    pub fn new(content_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            metrics: ContentMetrics {
                content_id: content_id.to_string(),
                published_at: now,
                engagement: EngagementMetrics::default(),
                tags: Vec::new(),
            },
        }
    }

    pub fn published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.metrics.published_at = published_at;
        self
    }

    /// Publish date `months` whole months before `now`
    pub fn aged_months(mut self, now: DateTime<Utc>, months: u32) -> Self {
        self.metrics.published_at = now
            .checked_sub_months(Months::new(months))
            .unwrap_or(now);
        self
    }

    pub fn engagement(mut self, engagement: EngagementMetrics) -> Self {
        self.metrics.engagement = engagement;
        self
    }

    /// Engagement the default strategy scores well above the high threshold
    pub fn high_engagement(self) -> Self {
        self.engagement(EngagementMetrics {
            impressions: 1000,
            likes: 150,
            shares: 20,
            comments: 10,
            clicks: 30,
        })
    }

    /// Engagement the default strategy scores below the low threshold
    pub fn low_engagement(self) -> Self {
        self.engagement(EngagementMetrics {
            impressions: 1000,
            likes: 10,
            shares: 0,
            comments: 0,
            clicks: 5,
        })
    }

    pub fn tag(mut self, tag: ContentTag) -> Self {
        self.metrics.tags.push(tag);
        self
    }

    pub fn build(self) -> ContentMetrics {
        self.metrics
    }
}

/// Builder for `ScheduledPost`
#[derive(Debug, Clone)]
pub struct ScheduledPostBuilder {
    post: ScheduledPost,
}

impl ScheduledPostBuilder {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            post: ScheduledPost::new(
                "content-1".to_string(),
                Platform::Facebook,
                ContentType::NormalNews,
                now,
                "post body".to_string(),
                ContentType::NormalNews.default_priority(),
                now,
            ),
        }
    }

    pub fn with_content_id(mut self, content_id: &str) -> Self {
        self.post.content_id = content_id.to_string();
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.post.platform = platform;
        self
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.post.content_type = content_type;
        self.post.priority = content_type.default_priority();
        self
    }

    pub fn with_status(mut self, status: PostStatus) -> Self {
        self.post.status = status;
        self
    }

    pub fn with_scheduled_at(mut self, scheduled_at: DateTime<Utc>) -> Self {
        self.post.scheduled_at = scheduled_at;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.post.priority = priority;
        self
    }

    pub fn with_body(mut self, post_body: &str) -> Self {
        self.post.post_body = post_body.to_string();
        self
    }

    pub fn with_job_id(mut self, job_id: &str) -> Self {
        self.post.job_id = Some(job_id.to_string());
        self
    }

    pub fn processing_since(mut self, dispatched_at: DateTime<Utc>) -> Self {
        self.post.status = PostStatus::Processing;
        self.post.dispatched_at = Some(dispatched_at);
        self
    }

    pub fn build(self) -> ScheduledPost {
        self.post
    }
}
