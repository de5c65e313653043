//! Mock implementations of collaborator ports and failure-injecting repositories

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use publisher_core::{SchedulerError, SchedulerResult};
use publisher_domain::{
    DispatchOutcome, Platform, PlatformDispatchAdapter, PostFilter, RecyclingSchedule,
    RecyclingScheduleRepository, ScheduledPost, ScheduledPostRepository,
};
use publisher_infrastructure::{InMemoryPostRepository, InMemoryRecyclingRepository};

/// A recorded adapter call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterCall {
    Prepare(Platform),
    Publish { platform: Platform, post_body: String },
}

/// Scriptable platform adapter
///
/// Publishes succeed by default with `"<platform>-<n>"` refs. Individual
/// platforms can be made to fail `prepare`, report a platform failure, or
/// return a transport error.
#[derive(Debug, Clone, Default)]
pub struct MockDispatchAdapter {
    calls: Arc<Mutex<Vec<AdapterCall>>>,
    prepare_failures: Arc<Mutex<HashSet<Platform>>>,
    publish_failures: Arc<Mutex<HashSet<Platform>>>,
    publish_errors: Arc<Mutex<HashSet<Platform>>>,
}

impl MockDispatchAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_prepare(&self, platform: Platform) {
        self.prepare_failures.lock().unwrap().insert(platform);
    }

    pub fn fail_publish(&self, platform: Platform) {
        self.publish_failures.lock().unwrap().insert(platform);
    }

    pub fn error_on_publish(&self, platform: Platform) {
        self.publish_errors.lock().unwrap().insert(platform);
    }

    pub fn reset_failures(&self) {
        self.prepare_failures.lock().unwrap().clear();
        self.publish_failures.lock().unwrap().clear();
        self.publish_errors.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<AdapterCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn publish_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, AdapterCall::Publish { .. }))
            .count()
    }
}

#[async_trait]
impl PlatformDispatchAdapter for MockDispatchAdapter {
    async fn prepare(&self, platform: Platform) -> SchedulerResult<()> {
        self.calls.lock().unwrap().push(AdapterCall::Prepare(platform));
        if self.prepare_failures.lock().unwrap().contains(&platform) {
            return Err(SchedulerError::DispatchFailed {
                platform: platform.to_string(),
                reason: "account not authorised".to_string(),
            });
        }
        Ok(())
    }

    async fn publish(&self, platform: Platform, post_body: &str) -> SchedulerResult<DispatchOutcome> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(AdapterCall::Publish {
                platform,
                post_body: post_body.to_string(),
            });
            calls.len()
        };

        if self.publish_errors.lock().unwrap().contains(&platform) {
            return Err(SchedulerError::Internal("connection reset".to_string()));
        }
        if self.publish_failures.lock().unwrap().contains(&platform) {
            return Ok(DispatchOutcome::Failure {
                reason: "rate limited".to_string(),
            });
        }
        Ok(DispatchOutcome::Success {
            published_ref: format!("{}-{}", platform.as_str(), n),
        })
    }
}

/// Recycling repository whose `save` can be switched to fail
#[derive(Debug, Clone, Default)]
pub struct FlakyRecyclingRepository {
    inner: InMemoryRecyclingRepository,
    fail_saves: Arc<Mutex<bool>>,
}

impl FlakyRecyclingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap() = fail;
    }
}

#[async_trait]
impl RecyclingScheduleRepository for FlakyRecyclingRepository {
    async fn find_by_content_id(
        &self,
        content_id: &str,
    ) -> SchedulerResult<Option<RecyclingSchedule>> {
        self.inner.find_by_content_id(content_id).await
    }

    async fn save(&self, schedule: &RecyclingSchedule) -> SchedulerResult<()> {
        if *self.fail_saves.lock().unwrap() {
            return Err(SchedulerError::storage_error("simulated write failure"));
        }
        self.inner.save(schedule).await
    }

    async fn find_all(&self) -> SchedulerResult<Vec<RecyclingSchedule>> {
        self.inner.find_all().await
    }
}

/// Post repository whose `update` fails for selected post ids
#[derive(Debug, Clone, Default)]
pub struct FlakyPostRepository {
    inner: InMemoryPostRepository,
    failing_updates: Arc<Mutex<HashSet<String>>>,
}

impl FlakyPostRepository {
    /// Wraps `inner`; both handles see the same posts
    pub fn wrap(inner: InMemoryPostRepository) -> Self {
        Self {
            inner,
            failing_updates: Arc::default(),
        }
    }

    pub fn fail_updates_for(&self, post_id: &str) {
        self.failing_updates
            .lock()
            .unwrap()
            .insert(post_id.to_string());
    }
}

#[async_trait]
impl ScheduledPostRepository for FlakyPostRepository {
    async fn insert(&self, post: &ScheduledPost) -> SchedulerResult<()> {
        self.inner.insert(post).await
    }

    async fn insert_batch(&self, posts: &[ScheduledPost]) -> SchedulerResult<()> {
        self.inner.insert_batch(posts).await
    }

    async fn update(&self, post: &ScheduledPost) -> SchedulerResult<()> {
        if self.failing_updates.lock().unwrap().contains(&post.id) {
            return Err(SchedulerError::storage_error("simulated write failure"));
        }
        self.inner.update(post).await
    }

    async fn find_by_id(&self, id: &str) -> SchedulerResult<Option<ScheduledPost>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_job_id(&self, job_id: &str) -> SchedulerResult<Option<ScheduledPost>> {
        self.inner.find_by_job_id(job_id).await
    }

    async fn list(&self, filter: &PostFilter) -> SchedulerResult<Vec<ScheduledPost>> {
        self.inner.list(filter).await
    }

    async fn find_due(&self, now: DateTime<Utc>) -> SchedulerResult<Vec<ScheduledPost>> {
        self.inner.find_due(now).await
    }

    async fn remove_uncommitted(&self, ids: &[String]) -> SchedulerResult<()> {
        self.inner.remove_uncommitted(ids).await
    }
}
