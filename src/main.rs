use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use content_publisher::{Application, ShutdownManager};
use publisher_core::AppConfig;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

/// 多平台内容发布调度与常青内容回收
#[derive(Debug, Parser)]
#[command(name = "publisher", version, about)]
struct Cli {
    /// 配置文件路径，未指定时依次查找默认路径
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long, value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// 日志格式，覆盖配置文件
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// 到期帖子扫描间隔（秒）
    #[arg(long, value_name = "SECONDS")]
    dispatch_interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).with_context(|| {
        format!(
            "加载配置失败: {}",
            cli.config.as_deref().unwrap_or("<默认路径>")
        )
    })?;
    if let Some(seconds) = cli.dispatch_interval {
        config.scheduler.dispatch_interval_seconds = seconds;
        config.validate()?;
    }

    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.observability.log_level.clone());
    let log_format = match cli.log_format {
        Some(format) => format,
        None => parse_log_format(&config.observability.log_format)?,
    };
    init_logging(&log_level, log_format)?;

    info!("启动内容发布调度系统");
    if let Some(path) = &cli.config {
        info!("配置文件: {path}");
    }

    if config.observability.metrics_enabled {
        init_metrics(&config.observability.metrics_bind_address)?;
    }

    let app = Arc::new(Application::new(config)?);
    let shutdown_manager = ShutdownManager::new();

    let app_handle = {
        let app = Arc::clone(&app);
        let shutdown_rx = shutdown_manager.subscribe().await;

        tokio::spawn(async move {
            if let Err(e) = app.run(shutdown_rx).await {
                error!("应用运行失败: {e:#}");
            }
        })
    };

    wait_for_shutdown_signal().await?;

    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown().await;

    match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
        Ok(Ok(())) => info!("应用已优雅关闭"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    info!("内容发布调度系统已退出");
    Ok(())
}

fn parse_log_format(value: &str) -> Result<LogFormat> {
    LogFormat::from_str(value, true).map_err(|_| anyhow::anyhow!("不支持的日志格式: {value}"))
}

/// 初始化日志系统
fn init_logging(log_level: &str, log_format: LogFormat) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("初始化JSON日志格式失败")?,
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("初始化Pretty日志格式失败")?,
    }

    Ok(())
}

/// 安装Prometheus指标导出器
fn init_metrics(bind_address: &str) -> Result<()> {
    let addr: SocketAddr = bind_address
        .parse()
        .with_context(|| format!("无效的指标监听地址: {bind_address}"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("安装Prometheus指标导出器失败")?;

    info!("Prometheus指标导出器已启动: {addr}");
    Ok(())
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("安装SIGTERM信号处理器失败")?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("监听Ctrl+C信号失败")?;
                info!("收到Ctrl+C信号");
            }
            _ = terminate.recv() => {
                info!("收到SIGTERM信号");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.context("监听Ctrl+C信号失败")?;
        info!("收到Ctrl+C信号");
    }

    Ok(())
}
