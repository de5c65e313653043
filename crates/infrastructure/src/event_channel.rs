use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use publisher_core::{SchedulerError, SchedulerResult};
use publisher_domain::GenerationEvent;

/// 生成任务事件通道
///
/// 外部生成服务（或其适配层）通过 [`GenerationEventSender`] 推送事件，
/// 任务关联器持有唯一的接收端按到达顺序消费。通道有界，满时发送方等待。
#[derive(Debug)]
pub struct GenerationEventChannel {
    sender: mpsc::Sender<GenerationEvent>,
    receiver: Arc<Mutex<Option<mpsc::Receiver<GenerationEvent>>>>,
    capacity: usize,
}

impl GenerationEventChannel {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        info!("创建生成任务事件通道，容量: {}", capacity);
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Arc::new(Mutex::new(Some(receiver))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn sender(&self) -> GenerationEventSender {
        GenerationEventSender {
            inner: self.sender.clone(),
        }
    }

    /// 取出接收端，只能取一次
    pub async fn take_receiver(&self) -> SchedulerResult<mpsc::Receiver<GenerationEvent>> {
        self.receiver
            .lock()
            .await
            .take()
            .ok_or_else(|| SchedulerError::Internal("生成任务事件接收端已被占用".to_string()))
    }
}

/// 事件发送端，可任意克隆
#[derive(Debug, Clone)]
pub struct GenerationEventSender {
    inner: mpsc::Sender<GenerationEvent>,
}

impl GenerationEventSender {
    pub async fn send(&self, event: GenerationEvent) -> SchedulerResult<()> {
        let job_id = event.job_id().to_string();
        let event_type = event.event_type();
        self.inner.send(event).await.map_err(|_| {
            warn!("事件通道已关闭，丢弃事件: {} ({})", job_id, event_type);
            SchedulerError::Internal("生成任务事件通道已关闭".to_string())
        })?;
        debug!("投递生成任务事件: {} ({})", job_id, event_type);
        Ok(())
    }

    /// 解析外部推送的JSON事件后投递
    pub async fn send_json(&self, payload: &str) -> SchedulerResult<()> {
        let event: GenerationEvent = serde_json::from_str(payload)?;
        self.send(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let channel = GenerationEventChannel::new(8);
        let sender = channel.sender();
        let mut receiver = channel.take_receiver().await.unwrap();

        sender
            .send(GenerationEvent::Started {
                job_id: "job-1".to_string(),
                prompt: "cat photo".to_string(),
            })
            .await
            .unwrap();
        sender
            .send_json(r#"{"event":"failed","job_id":"job-1","error":"quota"}"#)
            .await
            .unwrap();

        assert_eq!(receiver.recv().await.unwrap().event_type(), "started");
        assert_eq!(receiver.recv().await.unwrap().event_type(), "failed");
    }

    #[tokio::test]
    async fn test_receiver_can_only_be_taken_once() {
        let channel = GenerationEventChannel::new(1);
        assert!(channel.take_receiver().await.is_ok());
        assert!(channel.take_receiver().await.is_err());
    }

    #[tokio::test]
    async fn test_send_json_rejects_malformed_payload() {
        let channel = GenerationEventChannel::new(1);
        let err = channel.sender().send_json("{not json").await.unwrap_err();
        assert!(matches!(err, SchedulerError::Serialization(_)));
    }
}
