use crate::data::CacheOptions;
use std::env;
use std::path::{Path, PathBuf};

/// 覆盖配置目录的环境变量
pub const KONFIG_HOME_ENV: &str = "KONFIG_HOME";

/// 缓存文件扩展名
pub const CACHE_FILE_EXT: &str = "bolt";

/// 配置存储自身使用的缓存名（文件 `konfig.bolt`，bucket `konfig`）
pub const KONFIG_CACHE_NAME: &str = "konfig";

/// 配置目录：`KONFIG_HOME` 优先，否则为 `~/.config/koding`
///
/// 仅计算路径，不创建目录。
pub fn konfig_home() -> Result<PathBuf, String> {
    if let Some(home) = env::var_os(KONFIG_HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }

    let home_dir = dirs::home_dir().ok_or("Failed to get home directory")?;
    Ok(home_dir.join(".config").join("koding"))
}

/// 应用缓存文件路径：`<home>/<app>.bolt` 或 `<home>/<app>.<id>.bolt`
pub fn cache_file_path(home: &Path, app: &str, used_id: Option<&str>) -> PathBuf {
    match used_id.filter(|id| !id.is_empty()) {
        Some(id) => home.join(format!("{app}.{id}.{CACHE_FILE_EXT}")),
        None => home.join(format!("{app}.{CACHE_FILE_EXT}")),
    }
}

/// 配置存储自身的缓存参数
pub fn default_cache_options(home: &Path) -> CacheOptions {
    CacheOptions::new(
        cache_file_path(home, KONFIG_CACHE_NAME, None),
        KONFIG_CACHE_NAME,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DEFAULT_LOCK_TIMEOUT;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_konfig_home_env_override() {
        env::set_var(KONFIG_HOME_ENV, "/tmp/konfig-home-test");
        assert_eq!(konfig_home().unwrap(), PathBuf::from("/tmp/konfig-home-test"));
        env::remove_var(KONFIG_HOME_ENV);
    }

    #[test]
    #[serial]
    fn test_konfig_home_default() {
        env::remove_var(KONFIG_HOME_ENV);
        if let Some(home_dir) = dirs::home_dir() {
            assert_eq!(
                konfig_home().unwrap(),
                home_dir.join(".config").join("koding")
            );
        }
    }

    #[test]
    fn test_cache_file_path() {
        let home = Path::new("/h");
        assert_eq!(cache_file_path(home, "klient", None), PathBuf::from("/h/klient.bolt"));
        assert_eq!(cache_file_path(home, "klient", Some("")), PathBuf::from("/h/klient.bolt"));
        assert_eq!(
            cache_file_path(home, "klient", Some("abc123")),
            PathBuf::from("/h/klient.abc123.bolt")
        );
    }

    #[test]
    fn test_default_cache_options() {
        let opts = default_cache_options(Path::new("/h"));
        assert_eq!(opts.file, PathBuf::from("/h/konfig.bolt"));
        assert_eq!(opts.bucket, "konfig");
        assert_eq!(opts.timeout, DEFAULT_LOCK_TIMEOUT);
    }
}
