//! Observability module
//!
//! Structured log events and metrics for the publisher.

pub mod metrics_collector;
pub mod structured_logger;

pub use metrics_collector::MetricsCollector;
pub use structured_logger::StructuredLogger;
