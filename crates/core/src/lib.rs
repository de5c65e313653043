pub mod clock;
pub mod config;
pub mod errors;

pub use clock::{Clock, SystemClock};
pub use config::*;
pub use errors::*;
