//! 排期调度核心
//!
//! 帖子生命周期、常青内容回收、生成任务事件关联，以及对外的编排门面。

pub mod job_tracker;
pub mod lifecycle;
pub mod locks;
pub mod orchestrator;
pub mod recycling;
pub mod time_window;

pub use job_tracker::{JobCorrelationTracker, JobEventOutcome, PrunedJobs};
pub use lifecycle::{Mutation, PostLifecycle, MISSING_CONTENT_REASON};
pub use locks::KeyedLocks;
pub use orchestrator::{
    DispatchReport, Orchestrator, PruneReport, ScheduleOptions, SchedulerDependencies,
    PROCESSING_TIMEOUT_REASON,
};
pub use recycling::RecyclingScheduleManager;
pub use time_window::TimeWindowPolicy;
