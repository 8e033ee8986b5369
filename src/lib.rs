// lib.rs - 本地多配置存储

pub mod core; // 日志等基础设施
pub mod data; // 键值缓存与错误类型
pub mod models;
pub mod services;
pub mod utils;

pub use models::{
    konfig_id, Endpoint, Endpoints, Environments, Konfig, Konfigs, LogConfig, LogFormat, LogLevel,
    LogOutput, UsedKonfig,
};

pub use data::{Cache, CacheOptions, Result, StoreError};

pub use services::configstore::{
    self, CacheFileResolution, Client, MigrationReport, Relocation, ResolveWarning,
};

pub use core::{init_logger, update_log_level};
