use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use publisher_core::{AppConfig, SystemClock};
use publisher_dispatcher::{Orchestrator, SchedulerDependencies};
use publisher_infrastructure::{
    GenerationEventChannel, GenerationEventSender, InMemoryContentStore, InMemoryPostRepository,
    InMemoryRecyclingRepository, LoggingDispatchAdapter, StructuredLogger,
};

/// 主应用程序
pub struct Application {
    config: AppConfig,
    orchestrator: Arc<Orchestrator>,
    events: GenerationEventChannel,
}

impl Application {
    /// 使用内存存储、日志发布适配器和系统时钟创建应用
    pub fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序（内存存储）");

        let deps = SchedulerDependencies {
            posts: Arc::new(InMemoryPostRepository::new()),
            schedules: Arc::new(InMemoryRecyclingRepository::new()),
            content: Arc::new(InMemoryContentStore::new()),
            adapter: Arc::new(LoggingDispatchAdapter::new()),
            clock: Arc::new(SystemClock),
        };
        Self::with_dependencies(config, deps)
    }

    pub fn with_dependencies(config: AppConfig, deps: SchedulerDependencies) -> Result<Self> {
        let orchestrator = Orchestrator::new(&config, deps).context("创建排期编排器失败")?;
        let events = GenerationEventChannel::new(config.scheduler.event_channel_capacity);

        Ok(Self {
            config,
            orchestrator: Arc::new(orchestrator),
            events,
        })
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        Arc::clone(&self.orchestrator)
    }

    /// 外部生成服务推送任务事件的入口
    pub fn generation_events(&self) -> GenerationEventSender {
        self.events.sender()
    }

    /// 运行后台循环直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let receiver = self
            .events
            .take_receiver()
            .await
            .context("获取生成任务事件接收端失败")?;

        let scheduler = &self.config.scheduler;
        let dispatch_interval = Duration::from_secs(scheduler.dispatch_interval_seconds.max(1));
        let processing_timeout = chrono::Duration::seconds(
            i64::try_from(scheduler.processing_timeout_seconds).context("处理超时时间超出范围")?,
        );
        info!(
            "启动后台循环: 派发间隔 {:?}, 处理超时 {} 秒",
            dispatch_interval, scheduler.processing_timeout_seconds
        );

        let listener_handle = {
            let orchestrator = Arc::clone(&self.orchestrator);
            let shutdown_rx = shutdown_rx.resubscribe();

            tokio::spawn(async move {
                if let Err(e) = orchestrator.listen_for_jobs(receiver, shutdown_rx).await {
                    error!("生成任务事件监听失败: {}", e);
                }
            })
        };

        let dispatch_handle = {
            let orchestrator = Arc::clone(&self.orchestrator);
            let shutdown_rx = shutdown_rx.resubscribe();

            tokio::spawn(async move {
                run_dispatch_loop(orchestrator, dispatch_interval, shutdown_rx).await;
            })
        };

        let watchdog_handle = {
            let orchestrator = Arc::clone(&self.orchestrator);
            let shutdown_rx = shutdown_rx.resubscribe();

            tokio::spawn(async move {
                run_watchdog_loop(
                    orchestrator,
                    dispatch_interval,
                    processing_timeout,
                    shutdown_rx,
                )
                .await;
            })
        };

        let _ = shutdown_rx.recv().await;
        info!("应用收到关闭信号");

        let _ = tokio::join!(listener_handle, dispatch_handle, watchdog_handle);

        info!("后台循环已全部停止");
        Ok(())
    }
}

/// 到期派发循环
async fn run_dispatch_loop(
    orchestrator: Arc<Orchestrator>,
    every: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match orchestrator.dispatch_due().await {
                    Ok(report) if report.examined > 0 => debug!("派发结果: {:?}", report),
                    Ok(_) => {}
                    Err(e) => StructuredLogger::log_system_error("app", "dispatch_due", &e),
                }
            }
            _ = shutdown_rx.recv() => {
                info!("派发循环收到关闭信号");
                break;
            }
        }
    }
}

/// 处理超时看门狗，顺带清理过期的任务记录与空闲锁
async fn run_watchdog_loop(
    orchestrator: Arc<Orchestrator>,
    every: Duration,
    max_age: chrono::Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = orchestrator.expire_stuck(max_age).await {
                    StructuredLogger::log_system_error("app", "expire_stuck", &e);
                }
                orchestrator.prune(max_age);
            }
            _ = shutdown_rx.recv() => {
                info!("看门狗循环收到关闭信号");
                break;
            }
        }
    }
}
