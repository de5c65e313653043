#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};

use publisher_core::{AppConfig, Clock};
use publisher_dispatcher::{Orchestrator, SchedulerDependencies};
use publisher_domain::ContentMetrics;
use publisher_infrastructure::{InMemoryContentStore, InMemoryPostRepository};
use publisher_testing_utils::{
    ContentMetricsBuilder, FlakyPostRepository, FlakyRecyclingRepository, ManualClock,
    MockDispatchAdapter,
};

/// 接入内存存储、可编排适配器和手动时钟的编排器
pub struct Harness {
    pub clock: ManualClock,
    pub posts: InMemoryPostRepository,
    /// 与 `posts` 共享数据，可对指定帖子注入写入失败
    pub flaky_posts: FlakyPostRepository,
    pub schedules: FlakyRecyclingRepository,
    pub content: InMemoryContentStore,
    pub adapter: MockDispatchAdapter,
    pub orchestrator: Arc<Orchestrator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let clock = ManualClock::at_default();
        let posts = InMemoryPostRepository::new();
        let flaky_posts = FlakyPostRepository::wrap(posts.clone());
        let schedules = FlakyRecyclingRepository::new();
        let content = InMemoryContentStore::new();
        let adapter = MockDispatchAdapter::new();

        let deps = SchedulerDependencies {
            posts: Arc::new(flaky_posts.clone()),
            schedules: Arc::new(schedules.clone()),
            content: Arc::new(content.clone()),
            adapter: Arc::new(adapter.clone()),
            clock: Arc::new(clock.clone()),
        };
        let orchestrator = Arc::new(Orchestrator::new(&config, deps).unwrap());

        Self {
            clock,
            posts,
            flaky_posts,
            schedules,
            content,
            adapter,
            orchestrator,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// 七个月前发布、互动量高、无标签的内容
    pub async fn add_evergreen(&self, content_id: &str) {
        let metrics = ContentMetricsBuilder::new(content_id, self.now())
            .aged_months(self.now(), 7)
            .high_engagement()
            .build();
        self.add_content(metrics).await;
    }

    pub async fn add_content(&self, metrics: ContentMetrics) {
        let body = format!("Worth another read: {}", metrics.content_id);
        self.content.upsert(metrics, body).await;
    }
}
