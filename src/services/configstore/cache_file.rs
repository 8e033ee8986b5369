//! 应用缓存文件解析
//!
//! 缓存文件按当前激活配置隔离：`<app>.<id>.bolt`，无激活配置时为 `<app>.bolt`。
//! 旧版的未隔离文件在首次解析时迁移到新路径（重命名，失败则创建符号链接）。
//! 所有文件系统操作均为尽力而为，失败只记录在结果中，不返回错误。

use crate::data::CacheOptions;
use crate::utils::config::cache_file_path;
use crate::utils::file_helpers::{chown_to_invoking_user, create_dir_all};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// 旧版缓存文件的迁移结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relocation {
    /// 无需迁移（路径相同、新文件已存在或旧文件不存在）
    NotNeeded,
    /// 旧文件已重命名到新路径
    Renamed { from: PathBuf, to: PathBuf },
    /// 重命名失败，新路径为指向旧文件的符号链接
    Symlinked { target: PathBuf, link: PathBuf },
    /// 重命名与符号链接均失败
    Failed {
        from: PathBuf,
        to: PathBuf,
        rename_error: String,
        symlink_error: String,
    },
}

/// 非致命的目录准备失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveWarning {
    CreateDir { path: PathBuf, error: String },
    Chown { path: PathBuf, error: String },
}

/// 缓存文件解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheFileResolution {
    pub options: CacheOptions,
    pub relocation: Relocation,
    pub warnings: Vec<ResolveWarning>,
}

impl CacheFileResolution {
    /// 是否发生了任何被忽略的失败
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty() || matches!(self.relocation, Relocation::Failed { .. })
    }
}

/// 解析应用 `app` 的缓存参数
///
/// `used_id` 为当前激活配置的 ID（无激活配置时为 `None`）。
pub fn resolve(home: &Path, app: &str, used_id: Option<&str>) -> CacheFileResolution {
    let old_file = cache_file_path(home, app, None);
    let file = cache_file_path(home, app, used_id);

    let relocation = relocate_legacy(&old_file, &file, |from, to| fs::rename(from, to));
    let mut warnings = Vec::new();

    if let Some(dir) = file.parent() {
        if let Err(e) = create_dir_all(dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "创建缓存目录失败");
            warnings.push(ResolveWarning::CreateDir {
                path: dir.to_path_buf(),
                error: e.to_string(),
            });
        }
        if let Err(e) = chown_to_invoking_user(dir) {
            tracing::debug!(dir = %dir.display(), error = %e, "调整缓存目录属主失败");
            warnings.push(ResolveWarning::Chown {
                path: dir.to_path_buf(),
                error: e.to_string(),
            });
        }
    }

    CacheFileResolution {
        options: CacheOptions::new(file, app),
        relocation,
        warnings,
    }
}

/// 旧文件存在而新文件不存在时，将旧文件迁移到新路径
///
/// 先用 `rename` 移动，失败再创建符号链接。
fn relocate_legacy<R>(old_file: &Path, file: &Path, rename: R) -> Relocation
where
    R: FnOnce(&Path, &Path) -> io::Result<()>,
{
    if old_file == file || file.exists() || !old_file.exists() {
        return Relocation::NotNeeded;
    }

    // 旧位置存在缓存而新位置没有，通常是刚从旧版配置迁移过来
    let rename_error = match rename(old_file, file) {
        Ok(()) => {
            tracing::info!(from = %old_file.display(), to = %file.display(), "已迁移旧版缓存文件");
            return Relocation::Renamed {
                from: old_file.to_path_buf(),
                to: file.to_path_buf(),
            };
        }
        Err(e) => e,
    };

    match symlink(old_file, file) {
        Ok(()) => {
            tracing::info!(
                link_target = %old_file.display(),
                link = %file.display(),
                rename_error = %rename_error,
                "无法移动旧版缓存文件，已创建符号链接"
            );
            Relocation::Symlinked {
                target: old_file.to_path_buf(),
                link: file.to_path_buf(),
            }
        }
        Err(symlink_error) => {
            tracing::warn!(
                to = %file.display(),
                rename_error = %rename_error,
                symlink_error = %symlink_error,
                "无法将旧版缓存文件迁移到新位置"
            );
            Relocation::Failed {
                from: old_file.to_path_buf(),
                to: file.to_path_buf(),
                rename_error: rename_error.to_string(),
                symlink_error: symlink_error.to_string(),
            }
        }
    }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
fn symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}
