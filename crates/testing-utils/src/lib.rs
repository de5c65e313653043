//! # Publisher Testing Utils
//!
//! Shared testing utilities for the content publisher workspace:
//! scriptable collaborator mocks, entity builders and a manually driven clock.
//!
//! ```toml
//! [dev-dependencies]
//! publisher-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
