pub mod app_config;
pub mod eligibility;
pub mod observability;
pub mod scheduling;

pub use app_config::AppConfig;
pub use eligibility::{EligibilityConfig, RecycleLimits, RecyclingConfig};
pub use observability::ObservabilityConfig;
pub use scheduling::{PlatformWindowConfig, SchedulerConfig};
