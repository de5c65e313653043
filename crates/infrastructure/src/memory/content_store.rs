use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use publisher_core::SchedulerResult;
use publisher_domain::{ContentMetrics, ContentStore};

#[derive(Debug, Clone)]
struct StoredContent {
    metrics: ContentMetrics,
    post_body: String,
}

/// 内存内容仓库：保存文章的历史指标与默认帖子正文
#[derive(Debug, Clone, Default)]
pub struct InMemoryContentStore {
    contents: Arc<RwLock<HashMap<String, StoredContent>>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, metrics: ContentMetrics, post_body: impl Into<String>) {
        let content_id = metrics.content_id.clone();
        self.contents.write().await.insert(
            content_id,
            StoredContent {
                metrics,
                post_body: post_body.into(),
            },
        );
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn get_content_metrics(&self, content_id: &str) -> SchedulerResult<Option<ContentMetrics>> {
        Ok(self
            .contents
            .read()
            .await
            .get(content_id)
            .map(|c| c.metrics.clone()))
    }

    async fn get_post_body(&self, content_id: &str) -> SchedulerResult<Option<String>> {
        Ok(self
            .contents
            .read()
            .await
            .get(content_id)
            .map(|c| c.post_body.clone()))
    }

    async fn list_content_ids(&self) -> SchedulerResult<Vec<String>> {
        let mut ids: Vec<String> = self.contents.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
