mod common;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use publisher_core::{Clock, PlatformWindowConfig, SchedulerError};
    use publisher_dispatcher::{PostLifecycle, ScheduleOptions, TimeWindowPolicy};
    use publisher_domain::{
        ContentType, NewPost, Platform, PostEvent, PostStatus, TransitionOutcome,
    };
    use publisher_infrastructure::InMemoryPostRepository;
    use publisher_testing_utils::ManualClock;

    use crate::common::Harness;

    fn lifecycle(clock: &ManualClock) -> PostLifecycle {
        let windows = TimeWindowPolicy::from_config(&PlatformWindowConfig::default()).unwrap();
        PostLifecycle::new(
            Arc::new(InMemoryPostRepository::new()),
            Arc::new(clock.clone()),
            Arc::new(windows),
            16,
        )
    }

    fn new_post(clock: &ManualClock) -> NewPost {
        NewPost {
            content_id: "article-1".to_string(),
            platform: Platform::Facebook,
            content_type: ContentType::Blog,
            scheduled_at: clock.now(),
            post_body: "body".to_string(),
            priority: None,
            force_immediate: false,
            job_id: None,
        }
    }

    #[tokio::test]
    async fn test_default_time_is_next_platform_window() {
        let h = Harness::new();
        let post = h
            .orchestrator
            .schedule_content("article-1", Platform::Facebook, "hello", ScheduleOptions::default())
            .await
            .unwrap();

        assert_eq!(post.status, PostStatus::Scheduled);
        assert_eq!(post.content_type, ContentType::NormalNews);
        assert_eq!(post.priority, 3);
        assert_eq!(
            post.scheduled_at,
            Utc.with_ymd_and_hms(2024, 6, 1, 13, 0, 0).unwrap()
        );
        assert!(post.job_id.is_none());
    }

    #[tokio::test]
    async fn test_breaking_news_publishes_now() {
        let h = Harness::new();
        let options = ScheduleOptions {
            content_type: Some(ContentType::BreakingNews),
            ..Default::default()
        };
        let post = h
            .orchestrator
            .schedule_content("flash", Platform::Twitter, "urgent", options)
            .await
            .unwrap();

        assert_eq!(post.scheduled_at, h.now());
        assert_eq!(post.priority, 1);
    }

    #[tokio::test]
    async fn test_past_custom_time_is_rejected() {
        let h = Harness::new();
        let err = h
            .orchestrator
            .schedule_content(
                "article-1",
                Platform::Facebook,
                "hello",
                ScheduleOptions::at(h.now() - Duration::minutes(1)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SchedulerError::InvalidScheduleTime { .. }));
        assert_eq!(h.posts.len().await, 0);
    }

    #[tokio::test]
    async fn test_force_immediate_overrides_past_time() {
        let h = Harness::new();
        let options = ScheduleOptions {
            force_immediate: true,
            custom_scheduled_time: Some(h.now() - Duration::days(1)),
            ..Default::default()
        };
        let post = h
            .orchestrator
            .schedule_content("article-1", Platform::Instagram, "hello", options)
            .await
            .unwrap();
        assert_eq!(post.scheduled_at, h.now());
    }

    #[tokio::test]
    async fn test_failed_dispatch_then_reschedule_uses_next_window() {
        let h = Harness::new();
        h.adapter.fail_publish(Platform::Twitter);

        let post = h
            .orchestrator
            .schedule_content("article-1", Platform::Twitter, "hello", ScheduleOptions::immediate())
            .await
            .unwrap();

        let report = h.orchestrator.dispatch_due().await.unwrap();
        assert_eq!(report.failed, 1);

        let failed = h.orchestrator.get_post(&post.id).await.unwrap();
        assert_eq!(failed.status, PostStatus::Failed);
        assert!(failed
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("rate limited"));

        let rescheduled = h.orchestrator.reschedule(&post.id, None).await.unwrap();
        assert_eq!(rescheduled.id, post.id);
        assert_eq!(rescheduled.status, PostStatus::Scheduled);
        assert_eq!(
            rescheduled.scheduled_at,
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(rescheduled.attempt, 2);
        assert!(rescheduled.failure_reason.is_none());
        assert!(rescheduled.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_cancel_processing_post_fails_without_change() {
        let h = Harness::new();
        let post = h
            .orchestrator
            .schedule_generated(
                "image-1",
                Platform::Instagram,
                ContentType::Blog,
                "job-1",
                ScheduleOptions::immediate(),
            )
            .await
            .unwrap();
        h.orchestrator.dispatch_due().await.unwrap();

        let err = h
            .orchestrator
            .cancel(&post.id, Some("changed my mind".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::CannotCancelInProgress { .. }));

        let current = h.orchestrator.get_post(&post.id).await.unwrap();
        assert_eq!(current.status, PostStatus::Processing);
        assert_eq!(current.job_id.as_deref(), Some("job-1"));
    }

    #[tokio::test]
    async fn test_cancel_terminal_post_fails() {
        let h = Harness::new();
        let post = h
            .orchestrator
            .schedule_content("article-1", Platform::Facebook, "hello", ScheduleOptions::default())
            .await
            .unwrap();

        let cancelled = h
            .orchestrator
            .cancel(&post.id, Some("duplicate".into()))
            .await
            .unwrap();
        assert_eq!(cancelled.status, PostStatus::Cancelled);
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("duplicate"));

        let err = h.orchestrator.cancel(&post.id, None).await.unwrap_err();
        assert!(matches!(err, SchedulerError::CannotCancelTerminal { .. }));
    }

    #[tokio::test]
    async fn test_reschedule_cancelled_post_with_explicit_time() {
        let h = Harness::new();
        let post = h
            .orchestrator
            .schedule_content("article-1", Platform::Facebook, "hello", ScheduleOptions::default())
            .await
            .unwrap();
        h.orchestrator.cancel(&post.id, None).await.unwrap();

        let at = h.now() + Duration::days(3);
        let rescheduled = h.orchestrator.reschedule(&post.id, Some(at)).await.unwrap();
        assert_eq!(rescheduled.scheduled_at, at);
        assert!(rescheduled.cancel_reason.is_none());

        let err = h.orchestrator.reschedule(&post.id, None).await.unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_unknown_post_is_not_found() {
        let h = Harness::new();
        let err = h.orchestrator.cancel("missing", None).await.unwrap_err();
        assert!(matches!(err, SchedulerError::PostNotFound { .. }));
    }

    #[tokio::test]
    async fn test_mark_published_twice_matches_once() {
        let clock = ManualClock::at_default();
        let lifecycle = lifecycle(&clock);
        let post = lifecycle.create(new_post(&clock)).await.unwrap();
        let mut events = lifecycle.subscribe();

        lifecycle.begin_dispatch(&post.id).await.unwrap();
        let (first, outcome) = lifecycle
            .mark_published(&post.id, Some("fb-1".into()))
            .await
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::Applied);

        clock.advance(Duration::minutes(5));
        let (second, outcome) = lifecycle
            .mark_published(&post.id, Some("fb-1".into()))
            .await
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::Unchanged);
        assert_eq!(first, second);
        assert_eq!(lifecycle.get(&post.id).await.unwrap(), first);

        assert!(matches!(events.try_recv().unwrap(), PostEvent::Dispatched { .. }));
        assert!(matches!(events.try_recv().unwrap(), PostEvent::Published { .. }));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_conflicting_terminal_report_keeps_first_outcome() {
        let clock = ManualClock::at_default();
        let lifecycle = lifecycle(&clock);
        let post = lifecycle.create(new_post(&clock)).await.unwrap();

        lifecycle.begin_dispatch(&post.id).await.unwrap();
        lifecycle.mark_failed(&post.id, "api down").await.unwrap();
        let (current, outcome) = lifecycle
            .mark_published(&post.id, Some("late".into()))
            .await
            .unwrap();

        assert!(matches!(outcome, TransitionOutcome::Conflict { .. }));
        assert_eq!(current.status, PostStatus::Failed);
        assert!(current.published_ref.is_none());
    }

    #[tokio::test]
    async fn test_scheduled_event_is_broadcast() {
        let h = Harness::new();
        let mut events = h.orchestrator.subscribe();
        let post = h
            .orchestrator
            .schedule_content("article-1", Platform::Facebook, "hello", ScheduleOptions::default())
            .await
            .unwrap();

        match events.try_recv().unwrap() {
            PostEvent::Scheduled {
                post_id,
                scheduled_at,
                ..
            } => {
                assert_eq!(post_id, post.id);
                assert_eq!(scheduled_at, post.scheduled_at);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_cancels_serialize_on_one_post() {
        let h = Harness::new();
        let post = h
            .orchestrator
            .schedule_content("article-1", Platform::Facebook, "hello", ScheduleOptions::default())
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let orchestrator = h.orchestrator.clone();
            let id = post.id.clone();
            handles.push(tokio::spawn(async move {
                orchestrator.cancel(&id, Some(format!("request {i}"))).await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(e) => assert!(matches!(e, SchedulerError::CannotCancelTerminal { .. })),
            }
        }
        assert_eq!(succeeded, 1);
    }
}
