pub mod eligibility;
pub mod entities;
pub mod events;
pub mod ports;
pub mod repositories;
pub mod state_machine;

pub use eligibility::*;
pub use entities::*;
pub use events::*;
pub use ports::*;
pub use repositories::*;
pub use state_machine::*;
pub use publisher_core::{SchedulerError, SchedulerResult};
