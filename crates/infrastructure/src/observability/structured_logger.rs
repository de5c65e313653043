//! Structured logging utilities
//!
//! Field-structured log events for the post lifecycle, recycling and
//! generation-job correlation.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use publisher_domain::{Platform, PostStatus, ScheduledPost};

/// Structured logging utilities
pub struct StructuredLogger;

impl StructuredLogger {
    /// Log a newly scheduled post
    pub fn log_post_scheduled(post: &ScheduledPost) {
        info!(
            event = "post_scheduled",
            post.id = %post.id,
            post.content_id = %post.content_id,
            post.platform = post.platform.as_str(),
            post.content_type = post.content_type.as_str(),
            post.priority = post.priority,
            post.scheduled_at = %post.scheduled_at,
            post.job_id = post.job_id.as_deref(),
            "Post scheduled"
        );
    }

    /// Log a post handed to the platform adapter
    pub fn log_post_dispatched(post_id: &str, platform: Platform, awaits_generation: bool) {
        info!(
            event = "post_dispatched",
            post.id = post_id,
            post.platform = platform.as_str(),
            post.awaits_generation = awaits_generation,
            "Post dispatch started"
        );
    }

    /// Log a committed status transition
    pub fn log_post_transition(post_id: &str, from: PostStatus, to: PostStatus, action: &str) {
        info!(
            event = "post_transition",
            post.id = post_id,
            post.from = from.as_str(),
            post.to = to.as_str(),
            post.action = action,
            "Post status changed"
        );
    }

    /// Log a terminal report that disagrees with the recorded outcome
    pub fn log_transition_conflict(post_id: &str, recorded: PostStatus, requested: PostStatus) {
        warn!(
            event = "transition_conflict",
            post.id = post_id,
            post.recorded = recorded.as_str(),
            post.requested = requested.as_str(),
            "Conflicting terminal report ignored"
        );
    }

    /// Log a dispatch failure reported by the adapter
    pub fn log_dispatch_failed(post_id: &str, platform: Platform, reason: &str) {
        error!(
            event = "dispatch_failed",
            post.id = post_id,
            post.platform = platform.as_str(),
            dispatch.reason = reason,
            "Platform dispatch failed"
        );
    }

    /// Log a committed recycle event
    pub fn log_recycle_scheduled(
        content_id: &str,
        platforms: &[Platform],
        total_recycles: u32,
        max_recycles: u32,
    ) {
        info!(
            event = "recycle_scheduled",
            content.id = content_id,
            recycle.platforms = ?platforms,
            recycle.total = total_recycles,
            recycle.max = max_recycles,
            "Content recycle scheduled"
        );
    }

    /// Log a rejected recycle request
    pub fn log_recycle_rejected(content_id: &str, reason: &str) {
        warn!(
            event = "recycle_rejected",
            content.id = content_id,
            recycle.reason = reason,
            "Content recycle rejected"
        );
    }

    /// Log a job event that matched no post
    pub fn log_correlation_miss(job_id: &str, event_type: &str) {
        warn!(
            event = "correlation_miss",
            job.id = job_id,
            job.event = event_type,
            "Job event did not match any scheduled post"
        );
    }

    /// Log best-effort job progress
    pub fn log_job_progress(job_id: &str, percent: u8, step: &str) {
        debug!(
            event = "job_progress",
            job.id = job_id,
            job.percent = percent,
            job.step = step,
            "Generation job progress"
        );
    }

    /// Log posts stuck in processing
    pub fn log_stuck_post(post_id: &str, dispatched_at: DateTime<Utc>) {
        warn!(
            event = "stuck_post",
            post.id = post_id,
            post.dispatched_at = %dispatched_at,
            "Post exceeded processing timeout"
        );
    }

    /// Log system error
    pub fn log_system_error(component: &str, operation: &str, error: &dyn std::error::Error) {
        error!(
            event = "system_error",
            error.component = component,
            error.operation = operation,
            error.message = %error,
            "System error occurred"
        );
    }
}
