//! 缓存层实现
//!
//! 单文件键值缓存，按 bucket 隔离，值以 JSON 编码存储：
//! - `options`: 缓存文件路径、bucket 与锁等待时间
//! - `store`: `Cache` 句柄（打开时获取排他文件锁，必须显式关闭）
//!
//! # 使用示例
//!
//! ```rust
//! use crate::data::cache::{Cache, CacheOptions};
//!
//! let cache = Cache::open(&CacheOptions::new("/tmp/konfig.bolt", "konfig"))?;
//! cache.set_value("konfigs.used", &serde_json::json!({"id": "abc"}))?;
//! let used: serde_json::Value = cache.get_value("konfigs.used")?;
//! cache.close()?;
//! ```

pub mod options;
pub mod store;

pub use options::{CacheOptions, DEFAULT_LOCK_TIMEOUT};
pub use store::Cache;
