//! 文件操作辅助函数
//!
//! 目录创建与属主调整，供缓存文件解析使用。

use std::fs;
use std::io;
use std::path::Path;

/// 递归创建目录（Unix 平台权限 0o755）
pub fn create_dir_all(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o755)
            .create(path)
    }

    #[cfg(not(unix))]
    {
        fs::create_dir_all(path)
    }
}

/// 通过 sudo 运行时返回调用者的 uid/gid
#[cfg(unix)]
fn invoking_user() -> Option<(u32, u32)> {
    let uid = std::env::var("SUDO_UID").ok()?.parse().ok()?;
    let gid = std::env::var("SUDO_GID").ok()?.parse().ok()?;
    Some((uid, gid))
}

/// 将路径属主调整为调用者（通过 sudo 运行时）
///
/// 非 sudo 运行或非 Unix 平台时不做任何事。
#[cfg(unix)]
pub fn chown_to_invoking_user(path: &Path) -> io::Result<()> {
    match invoking_user() {
        Some((uid, gid)) => std::os::unix::fs::chown(path, Some(uid), Some(gid)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
pub fn chown_to_invoking_user(_path: &Path) -> io::Result<()> {
    Ok(())
}
