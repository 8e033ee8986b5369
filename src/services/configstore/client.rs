//! 配置存储客户端
//!
//! 每个公开操作先确保一次性迁移已执行，再以“打开 - 执行 - 关闭”事务访问缓存。

use super::cache_file::{self, CacheFileResolution};
use super::merge::merge_in;
use crate::data::{found, Cache, CacheOptions, Result, StoreError};
use crate::models::{Environments, Konfig, Konfigs, UsedKonfig};
use crate::utils::config::{default_cache_options, konfig_home};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// 旧版单配置
pub const KEY_KONFIG: &str = "konfig";
/// 配置集合
pub const KEY_KONFIGS: &str = "konfigs";
/// 激活配置引用
pub const KEY_USED: &str = "konfigs.used";

/// 一次性迁移的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// 从旧版单配置迁入集合的配置 ID
    pub migrated_legacy: Option<String>,
    /// 自动设为激活的配置 ID
    pub selected_used: Option<String>,
    /// 迁移中断时的错误（已忽略）
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

/// 配置存储客户端
///
/// 同一实例上的迁移最多执行一次；并发的首次调用者会等待其完成。
#[derive(Debug)]
pub struct Client {
    home: PathBuf,
    cache_opts: CacheOptions,
    migration: OnceCell<MigrationReport>,
}

impl Client {
    /// 使用默认配置目录创建客户端
    pub fn new() -> Result<Self> {
        let home = konfig_home().map_err(StoreError::Config)?;
        Ok(Self::with_home(home))
    }

    /// 使用指定配置目录创建客户端
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            cache_opts: default_cache_options(&home),
            home,
            migration: OnceCell::new(),
        }
    }

    /// 覆盖客户端自身的缓存参数
    pub fn with_cache_options(mut self, cache_opts: CacheOptions) -> Self {
        self.cache_opts = cache_opts;
        self
    }

    /// 返回全部配置
    ///
    /// 尽力而为：读取失败时返回空集合。
    pub fn list(&self) -> Konfigs {
        self.init();

        let result: Result<Konfigs> =
            self.commit(|cache| Ok(found(cache.get_value(KEY_KONFIGS))?.unwrap_or_default()));

        let konfigs = result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "读取配置集合失败");
            Konfigs::new()
        });

        let mismatched = konfigs.mismatched_ids();
        if !mismatched.is_empty() {
            tracing::warn!(ids = ?mismatched, "配置集合中存在键与配置 ID 不一致的条目");
        }

        konfigs
    }

    /// 构造默认配置，并以旧版单配置作为覆盖层合并
    ///
    /// 不读取配置集合。旧版记录缺失、不可用或读取失败时返回默认配置。
    pub fn read(&self, env: &Environments) -> Konfig {
        self.init();

        let mut konfig = Konfig::new(env);

        match self.commit(|cache| found(cache.get_value::<Value>(KEY_KONFIG))) {
            Ok(Some(mixin)) => {
                if let Err(e) = merge_in(&mut konfig, &mixin) {
                    tracing::warn!(error = %e, "忽略无法合并的旧版配置");
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "读取旧版配置失败，使用默认配置");
            }
        }

        konfig
    }

    /// 保存配置并设为激活
    ///
    /// 配置未通过校验时返回 `StoreError::Validation`，不写入任何数据。
    pub fn use_konfig(&self, konfig: &Konfig) -> Result<()> {
        self.init();

        konfig.valid()?;

        let id = self.commit(|cache| {
            let mut konfigs: Konfigs = found(cache.get_value(KEY_KONFIGS))?.unwrap_or_default();

            let id = konfigs.insert(konfig.clone());

            cache.set_value(KEY_KONFIGS, &konfigs)?;
            cache.set_value(KEY_USED, &UsedKonfig { id: id.clone() })?;

            Ok(id)
        })?;

        tracing::info!(id = %id, koding = ?konfig.koding_public(), "已切换激活配置");
        Ok(())
    }

    /// 返回当前激活的配置
    ///
    /// - 无激活引用：`StoreError::NotFound`
    /// - 引用的配置不在集合中：`StoreError::KonfigNotFound`
    pub fn used(&self) -> Result<Konfig> {
        self.init();

        self.commit(|cache| {
            let used: UsedKonfig = cache.get_value(KEY_USED)?;
            let konfigs: Konfigs = cache.get_value(KEY_KONFIGS)?;

            konfigs
                .get(&used.id)
                .cloned()
                .ok_or(StoreError::KonfigNotFound { id: used.id })
        })
    }

    /// 应用 `app` 的缓存参数（按激活配置隔离）
    pub fn cache_options(&self, app: &str) -> CacheOptions {
        self.resolve_cache_file(app).options
    }

    /// 解析应用 `app` 的缓存文件，并返回迁移与目录准备的详细结果
    pub fn resolve_cache_file(&self, app: &str) -> CacheFileResolution {
        self.init();

        let used_id = self.used().ok().map(|konfig| konfig.id());
        cache_file::resolve(&self.home, app, used_id.as_deref())
    }

    /// 一次性迁移的结果（必要时触发迁移）
    pub fn migration_report(&self) -> &MigrationReport {
        self.init()
    }

    fn init(&self) -> &MigrationReport {
        self.migration.get_or_init(|| self.migrate())
    }

    /// 尽力保证缓存数据一致
    ///
    /// 损坏的配置无法自动修复，所有错误只记录日志。
    fn migrate(&self) -> MigrationReport {
        let mut report = MigrationReport {
            migrated_legacy: None,
            selected_used: None,
            error: None,
            finished_at: Utc::now(),
        };

        if let Err(e) = self.commit(|cache| migrate_legacy(cache, &mut report)) {
            tracing::warn!(error = %e, file = %self.cache_opts.file.display(), "配置迁移失败");
            report.error = Some(e.to_string());
        }

        report.finished_at = Utc::now();
        tracing::debug!(
            migrated_legacy = ?report.migrated_legacy,
            selected_used = ?report.selected_used,
            "配置迁移检查完成"
        );
        report
    }

    /// 打开缓存、执行 `f`、关闭缓存
    ///
    /// 无论 `f` 是否出错都会关闭缓存；返回 `f` 的错误，其次为关闭错误。
    fn commit<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Cache) -> Result<T>,
    {
        let cache = Cache::open(&self.cache_opts)?;
        let result = f(&cache);
        let closed = cache.close();

        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    tracing::debug!(error = %close_err, "关闭缓存失败");
                }
                Err(e)
            }
        }
    }
}

fn migrate_legacy(cache: &Cache, report: &mut MigrationReport) -> Result<()> {
    let legacy: Option<Konfig> = found(cache.get_value(KEY_KONFIG))?;
    let mut konfigs: Konfigs = found(cache.get_value(KEY_KONFIGS))?.unwrap_or_default();
    let used: Option<UsedKonfig> = found(cache.get_value(KEY_USED))?;

    // 旧版单配置存在且可用时迁入集合
    if let Some(legacy) = legacy.filter(|k| k.valid().is_ok()) {
        let id = legacy.id();

        if !konfigs.contains(&id) {
            konfigs.insert(legacy);
            cache.set_value(KEY_KONFIGS, &konfigs)?;

            tracing::info!(id = %id, "已将旧版配置迁入配置集合");
            report.migrated_legacy = Some(id);
        }
    }

    // 无激活配置且集合中只有一个可用配置时，将其设为激活
    let has_used = used.is_some_and(|u| !u.id.is_empty());
    if !has_used && konfigs.len() == 1 {
        if let Some((id, konfig)) = konfigs.iter().next() {
            if konfig.valid().is_ok() {
                cache.set_value(KEY_USED, &UsedKonfig { id: id.clone() })?;

                tracing::info!(id = %id, "已自动选择唯一配置作为激活配置");
                report.selected_used = Some(id.clone());
            }
        }
    }

    Ok(())
}
