pub mod dispatch_adapter;
pub mod event_channel;
pub mod memory;
pub mod observability;

pub use dispatch_adapter::LoggingDispatchAdapter;
pub use event_channel::{GenerationEventChannel, GenerationEventSender};
pub use memory::*;
pub use observability::*;
