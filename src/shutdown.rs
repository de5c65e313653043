use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

/// 后台循环共用的停止信号
///
/// 发送端在第一次 `shutdown` 时被取走；之后的订阅者拿到一个已触发的接收端。
#[derive(Clone)]
pub struct ShutdownManager {
    sender: Arc<RwLock<Option<broadcast::Sender<()>>>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            sender: Arc::new(RwLock::new(Some(sender))),
        }
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<()> {
        match self.sender.read().await.as_ref() {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = broadcast::channel(1);
                let _ = sender.send(());
                receiver
            }
        }
    }

    /// 通知所有订阅者停止，只有第一次调用生效
    pub async fn shutdown(&self) {
        let Some(sender) = self.sender.write().await.take() else {
            debug!("停止信号已经发出过");
            return;
        };

        let receivers = sender.receiver_count();
        let _ = sender.send(());
        info!("停止信号已发送给 {} 个订阅者", receivers);
    }

    pub async fn is_shutdown(&self) -> bool {
        self.sender.read().await.is_none()
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}
