//! 外部协作方接口
//!
//! 核心只依赖这些窄接口，不拥有平台API、内容库或生成服务的内部实现。

pub mod content;
pub mod dispatch;

pub use content::ContentStore;
pub use dispatch::{DispatchOutcome, PlatformDispatchAdapter};
