use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use publisher_core::SchedulerResult;
use publisher_domain::{RecyclingSchedule, RecyclingScheduleRepository};

/// 内存回收排期仓储，按内容ID存储
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecyclingRepository {
    schedules: Arc<RwLock<HashMap<String, RecyclingSchedule>>>,
}

impl InMemoryRecyclingRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecyclingScheduleRepository for InMemoryRecyclingRepository {
    async fn find_by_content_id(
        &self,
        content_id: &str,
    ) -> SchedulerResult<Option<RecyclingSchedule>> {
        Ok(self.schedules.read().await.get(content_id).cloned())
    }

    async fn save(&self, schedule: &RecyclingSchedule) -> SchedulerResult<()> {
        self.schedules
            .write()
            .await
            .insert(schedule.content_id.clone(), schedule.clone());
        Ok(())
    }

    async fn find_all(&self) -> SchedulerResult<Vec<RecyclingSchedule>> {
        let mut all: Vec<RecyclingSchedule> =
            self.schedules.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.content_id.cmp(&b.content_id));
        Ok(all)
    }
}
