//! 配置管理
//!
//! 加载顺序：内置默认值 → TOML配置文件 → 环境变量（前缀 `PUBLISHER`，层级分隔符 `__`）。
//! 所有配置段都带有 `validate()`，加载完成后统一校验。

pub mod models;

pub use models::*;
