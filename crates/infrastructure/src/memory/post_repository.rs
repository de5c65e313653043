use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use publisher_domain::{PostFilter, ScheduledPost, ScheduledPostRepository};
use publisher_core::{SchedulerError, SchedulerResult};

/// 内存帖子仓储
///
/// 所有写操作都在同一把写锁内完成，`insert_batch` 因此天然原子。
#[derive(Debug, Clone, Default)]
pub struct InMemoryPostRepository {
    posts: Arc<RwLock<HashMap<String, ScheduledPost>>>,
}

impl InMemoryPostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.posts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.posts.read().await.is_empty()
    }
}

fn duplicate(id: &str) -> SchedulerError {
    SchedulerError::storage_error(format!("帖子ID已存在: {id}"))
}

#[async_trait]
impl ScheduledPostRepository for InMemoryPostRepository {
    #[instrument(skip(self, post), fields(post_id = %post.id))]
    async fn insert(&self, post: &ScheduledPost) -> SchedulerResult<()> {
        let mut posts = self.posts.write().await;
        if posts.contains_key(&post.id) {
            return Err(duplicate(&post.id));
        }
        posts.insert(post.id.clone(), post.clone());
        debug!("插入帖子: {}", post.id);
        Ok(())
    }

    async fn insert_batch(&self, batch: &[ScheduledPost]) -> SchedulerResult<()> {
        let mut posts = self.posts.write().await;

        // 先整体校验，再写入
        let mut seen = std::collections::HashSet::new();
        for post in batch {
            if posts.contains_key(&post.id) || !seen.insert(post.id.as_str()) {
                return Err(duplicate(&post.id));
            }
        }
        for post in batch {
            posts.insert(post.id.clone(), post.clone());
        }
        debug!("批量插入 {} 条帖子", batch.len());
        Ok(())
    }

    async fn update(&self, post: &ScheduledPost) -> SchedulerResult<()> {
        let mut posts = self.posts.write().await;
        match posts.get_mut(&post.id) {
            Some(existing) => {
                *existing = post.clone();
                Ok(())
            }
            None => Err(SchedulerError::post_not_found(&post.id)),
        }
    }

    async fn find_by_id(&self, id: &str) -> SchedulerResult<Option<ScheduledPost>> {
        Ok(self.posts.read().await.get(id).cloned())
    }

    async fn find_by_job_id(&self, job_id: &str) -> SchedulerResult<Option<ScheduledPost>> {
        let posts = self.posts.read().await;
        Ok(posts
            .values()
            .find(|post| post.job_id.as_deref() == Some(job_id))
            .cloned())
    }

    async fn list(&self, filter: &PostFilter) -> SchedulerResult<Vec<ScheduledPost>> {
        let posts = self.posts.read().await;
        let mut result: Vec<ScheduledPost> = posts
            .values()
            .filter(|post| filter.matches(post))
            .cloned()
            .collect();
        result.sort_by(|a, b| {
            a.scheduled_at
                .cmp(&b.scheduled_at)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(result)
    }

    async fn find_due(&self, now: DateTime<Utc>) -> SchedulerResult<Vec<ScheduledPost>> {
        let posts = self.posts.read().await;
        let mut due: Vec<ScheduledPost> =
            posts.values().filter(|post| post.is_due(now)).cloned().collect();
        due.sort_by(|a, b| {
            a.scheduled_at
                .cmp(&b.scheduled_at)
                .then_with(|| a.priority.cmp(&b.priority))
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(due)
    }

    async fn remove_uncommitted(&self, ids: &[String]) -> SchedulerResult<()> {
        let mut posts = self.posts.write().await;
        for id in ids {
            posts.remove(id);
        }
        debug!("回滚 {} 条暂存帖子", ids.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use publisher_domain::{ContentType, Platform, PostStatus};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn post(content_id: &str, platform: Platform, at: DateTime<Utc>, priority: i32) -> ScheduledPost {
        ScheduledPost::new(
            content_id.to_string(),
            platform,
            ContentType::NormalNews,
            at,
            "body".to_string(),
            priority,
            now(),
        )
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let repo = InMemoryPostRepository::new();
        let p = post("a", Platform::Facebook, now(), 5);
        repo.insert(&p).await.unwrap();
        assert!(repo.insert(&p).await.is_err());
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_insert_batch_is_all_or_nothing() {
        let repo = InMemoryPostRepository::new();
        let existing = post("a", Platform::Facebook, now(), 5);
        repo.insert(&existing).await.unwrap();

        let fresh = post("b", Platform::Twitter, now(), 5);
        let err = repo.insert_batch(&[fresh.clone(), existing.clone()]).await;
        assert!(err.is_err());
        assert!(repo.find_by_id(&fresh.id).await.unwrap().is_none());

        repo.insert_batch(&[fresh.clone()]).await.unwrap();
        assert_eq!(repo.len().await, 2);
    }

    #[tokio::test]
    async fn test_find_due_orders_by_time_then_priority() {
        let repo = InMemoryPostRepository::new();
        let late = post("late", Platform::Facebook, now() - Duration::minutes(1), 1);
        let low = post("low", Platform::Facebook, now() - Duration::minutes(5), 8);
        let high = post("high", Platform::Twitter, now() - Duration::minutes(5), 1);
        let future = post("future", Platform::Instagram, now() + Duration::hours(1), 1);
        for p in [&late, &low, &high, &future] {
            repo.insert(p).await.unwrap();
        }

        let due = repo.find_due(now()).await.unwrap();
        let ids: Vec<&str> = due.iter().map(|p| p.content_id.as_str()).collect();
        assert_eq!(ids, vec!["high", "low", "late"]);
    }

    #[tokio::test]
    async fn test_find_by_job_id_and_update() {
        let repo = InMemoryPostRepository::new();
        let mut p = post("a", Platform::Facebook, now(), 5);
        p.job_id = Some("job-1".to_string());
        repo.insert(&p).await.unwrap();

        let found = repo.find_by_job_id("job-1").await.unwrap().unwrap();
        assert_eq!(found.id, p.id);

        p.status = PostStatus::Processing;
        p.job_id = None;
        repo.update(&p).await.unwrap();
        assert!(repo.find_by_job_id("job-1").await.unwrap().is_none());

        let missing = post("b", Platform::Twitter, now(), 5);
        assert!(matches!(
            repo.update(&missing).await,
            Err(SchedulerError::PostNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_applies_filter() {
        let repo = InMemoryPostRepository::new();
        repo.insert(&post("a", Platform::Facebook, now(), 5)).await.unwrap();
        repo.insert(&post("b", Platform::Twitter, now() + Duration::days(2), 5))
            .await
            .unwrap();

        let filter = PostFilter {
            platform: Some(Platform::Twitter),
            ..Default::default()
        };
        let result = repo.list(&filter).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].content_id, "b");

        let filter = PostFilter {
            date_to: Some(now() + Duration::days(1)),
            ..Default::default()
        };
        assert_eq!(repo.list(&filter).await.unwrap().len(), 1);
    }
}
