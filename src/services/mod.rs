// 服务层模块
//
// - configstore: 多环境配置存储（集合、激活配置、旧版迁移、应用缓存文件解析）

pub mod configstore;

pub use configstore::{CacheFileResolution, Client, MigrationReport, Relocation, ResolveWarning};
