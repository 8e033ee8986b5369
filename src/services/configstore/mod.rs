//! 配置存储
//!
//! 在本地键值缓存中保存多个 Konfig，记录当前激活的配置，
//! 并在首次使用时将旧版单配置迁移为多配置格式。
//!
//! 缓存键：
//! - `konfig`: 旧版单配置（只读）
//! - `konfigs`: 配置集合（ID -> Konfig）
//! - `konfigs.used`: 激活配置引用 `{ "id": ... }`
//!
//! 核心逻辑只依赖显式构造的 `Client`；本模块的自由函数仅为边界处的便捷封装，
//! 使用惰性创建的默认客户端。

mod cache_file;
mod client;
mod merge;


pub use cache_file::{CacheFileResolution, Relocation, ResolveWarning};
pub use client::{Client, MigrationReport, KEY_KONFIG, KEY_KONFIGS, KEY_USED};
pub use merge::{merge_in, Merge};

use crate::data::{CacheOptions, Result};
use crate::models::{Environments, Konfig, Konfigs};
use once_cell::sync::Lazy;

/// 默认客户端（配置目录无法解析时退回到临时目录）
static DEFAULT_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::new().unwrap_or_else(|e| {
        let home = std::env::temp_dir().join("koding");
        tracing::warn!(error = %e, home = %home.display(), "无法解析配置目录，使用临时目录");
        Client::with_home(home)
    })
});

/// 默认客户端
pub fn default_client() -> &'static Client {
    &DEFAULT_CLIENT
}

pub fn list() -> Konfigs {
    default_client().list()
}

pub fn read(env: &Environments) -> Konfig {
    default_client().read(env)
}

pub fn use_konfig(konfig: &Konfig) -> Result<()> {
    default_client().use_konfig(konfig)
}

pub fn used() -> Result<Konfig> {
    default_client().used()
}

pub fn cache_options(app: &str) -> CacheOptions {
    default_client().cache_options(app)
}
