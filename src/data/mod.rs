//! 数据层
//!
//! # 模块组织
//!
//! - `error`: 统一错误类型定义
//! - `cache`: 单文件键值缓存（bucket 隔离 + 排他文件锁）

pub mod cache;
pub mod error;

pub use cache::{Cache, CacheOptions, DEFAULT_LOCK_TIMEOUT};
pub use error::{found, Result, StoreError};
