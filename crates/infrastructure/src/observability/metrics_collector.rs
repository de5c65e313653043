//! Metrics collector for the content publisher
//!
//! Thin wrapper over the `metrics` facade; the binary decides which
//! recorder (if any) is installed.

use metrics::{counter, gauge, histogram};

use publisher_domain::{ContentType, Platform};

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    pub fn record_post_scheduled(&self, platform: Platform, content_type: ContentType) {
        counter!(
            "publisher_posts_scheduled_total",
            "platform" => platform.as_str(),
            "content_type" => content_type.as_str()
        )
        .increment(1);
    }

    pub fn record_post_published(&self, platform: Platform, dispatch_latency_seconds: f64) {
        counter!("publisher_posts_published_total", "platform" => platform.as_str()).increment(1);
        histogram!("publisher_dispatch_latency_seconds", "platform" => platform.as_str())
            .record(dispatch_latency_seconds);
    }

    pub fn record_post_failed(&self, platform: Platform) {
        counter!("publisher_posts_failed_total", "platform" => platform.as_str()).increment(1);
    }

    pub fn record_post_cancelled(&self, platform: Platform) {
        counter!("publisher_posts_cancelled_total", "platform" => platform.as_str()).increment(1);
    }

    pub fn record_post_rescheduled(&self, platform: Platform) {
        counter!("publisher_posts_rescheduled_total", "platform" => platform.as_str())
            .increment(1);
    }

    pub fn record_recycle(&self, platform_count: usize) {
        counter!("publisher_recycle_events_total").increment(1);
        counter!("publisher_recycled_posts_total").increment(platform_count as u64);
    }

    pub fn record_transition_conflict(&self) {
        counter!("publisher_transition_conflicts_total").increment(1);
    }

    pub fn record_correlation_miss(&self, event_type: &'static str) {
        counter!("publisher_correlation_misses_total", "event" => event_type).increment(1);
    }

    pub fn record_due_posts(&self, count: usize) {
        gauge!("publisher_due_posts").set(count as f64);
    }
}
