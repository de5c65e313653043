//! 内存存储实现
//!
//! 嵌入式部署与测试使用；数据只存在于进程生命周期内。

pub mod content_store;
pub mod post_repository;
pub mod recycling_repository;

pub use content_store::InMemoryContentStore;
pub use post_repository::InMemoryPostRepository;
pub use recycling_repository::InMemoryRecyclingRepository;
