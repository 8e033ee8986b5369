use std::path::{Path, PathBuf};
use std::time::Duration;

/// 获取文件锁的默认最长等待时间
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// 缓存打开参数（按应用名解析，不持久化）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// 缓存文件路径
    pub file: PathBuf,
    /// bucket 名称
    pub bucket: String,
    /// 获取排他锁的最长等待时间
    pub timeout: Duration,
}

impl CacheOptions {
    pub fn new(file: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            bucket: bucket.into(),
            timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 与缓存文件同目录的锁文件（`<file>.lock`）
    pub fn lock_path(&self) -> PathBuf {
        lock_path(&self.file)
    }
}

fn lock_path(file: &Path) -> PathBuf {
    let mut path = file.as_os_str().to_owned();
    path.push(".lock");
    PathBuf::from(path)
}
