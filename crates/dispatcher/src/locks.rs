use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 按键串行化的锁表
///
/// 同一个键（帖子ID或内容ID）上的修改排队执行，不同键之间互不阻塞。
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_default()
            .value()
            .clone();
        mutex.lock_owned().await
    }

    /// 清理当前没有持有者的锁，防止锁表无限增长
    pub fn prune(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
