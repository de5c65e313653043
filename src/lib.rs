//! `publisher` 可执行程序的装配层
//!
//! 把内存仓储、日志适配器和系统时钟接到排期编排器上，
//! 并托管事件监听、到期派发与处理超时清理三个后台循环。

pub mod app;
pub mod shutdown;

pub use app::Application;
pub use shutdown::ShutdownManager;
