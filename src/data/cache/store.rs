//! 键值缓存句柄
//!
//! 底层为 SQLite 单表 `kv(bucket, key, value)`，通过同目录 `<file>.lock`
//! 上的排他文件锁保证跨进程互斥。打开时在超时时间内轮询获取锁，
//! 超时即返回 `StoreError::LockTimeout`，不做重试。

use super::CacheOptions;
use crate::data::{Result, StoreError};
use fs2::FileExt;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// 轮询文件锁的间隔
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv (
    bucket TEXT NOT NULL,
    key    TEXT NOT NULL,
    value  TEXT NOT NULL,
    PRIMARY KEY (bucket, key)
)";

/// 已打开的缓存
///
/// 持有排他文件锁直到 `close`（或 drop）为止。
pub struct Cache {
    conn: Connection,
    lock: File,
    lock_path: PathBuf,
    bucket: String,
}

impl Cache {
    /// 打开缓存并获取排他锁
    pub fn open(opts: &CacheOptions) -> Result<Self> {
        if let Some(parent) = opts.file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
            }
        }

        let lock_path = opts.lock_path();
        let lock = acquire_lock(&lock_path, opts.timeout)?;

        let conn = Connection::open(&opts.file)?;
        conn.busy_timeout(opts.timeout)?;
        conn.execute_batch(SCHEMA)?;

        tracing::trace!(file = %opts.file.display(), bucket = %opts.bucket, "缓存已打开");

        Ok(Self {
            conn,
            lock,
            lock_path,
            bucket: opts.bucket.clone(),
        })
    }

    /// 读取并解码指定键的值
    ///
    /// 键不存在时返回 `StoreError::NotFound`。
    pub fn get_value<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE bucket = ?1 AND key = ?2",
                params![self.bucket, key],
                |row| row.get(0),
            )
            .optional()?;

        let raw = raw.ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        serde_json::from_str(&raw).map_err(|source| StoreError::Codec {
            key: key.to_string(),
            source,
        })
    }

    /// 编码并写入指定键的值（存在则覆盖）
    pub fn set_value<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value).map_err(|source| StoreError::Codec {
            key: key.to_string(),
            source,
        })?;

        self.conn.execute(
            "INSERT INTO kv (bucket, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(bucket, key) DO UPDATE SET value = excluded.value",
            params![self.bucket, key, raw],
        )?;

        Ok(())
    }

    /// 关闭数据库连接并释放文件锁
    ///
    /// 两步都会执行，返回第一个错误。
    pub fn close(self) -> Result<()> {
        let Cache {
            conn,
            lock,
            lock_path,
            ..
        } = self;

        let closed = conn.close().map_err(|(_, e)| StoreError::Database(e));
        let unlocked = lock.unlock().map_err(|e| StoreError::io(&lock_path, e));

        tracing::trace!(lock = %lock_path.display(), "缓存已关闭");

        closed.and(unlocked)
    }
}

/// 在超时时间内轮询获取排他锁
fn acquire_lock(path: &Path, timeout: Duration) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| StoreError::io(path, e))?;

    let deadline = Instant::now() + timeout;
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(file),
            Err(e) if is_contended(&e) => {
                if Instant::now() >= deadline {
                    tracing::warn!(lock = %path.display(), ?timeout, "获取文件锁超时");
                    return Err(StoreError::LockTimeout {
                        path: path.to_path_buf(),
                        timeout,
                    });
                }
                thread::sleep(LOCK_POLL_INTERVAL);
            }
            Err(e) => return Err(StoreError::io(path, e)),
        }
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_opts(dir: &TempDir) -> CacheOptions {
        CacheOptions::new(dir.path().join("test.bolt"), "test")
    }

    #[test]
    fn test_get_missing_key_is_not_found() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let cache = Cache::open(&test_opts(&dir))?;

        let err = cache.get_value::<serde_json::Value>("konfig").unwrap_err();
        assert!(err.is_not_found());

        cache.close()
    }

    #[test]
    fn test_set_get_overwrite() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let cache = Cache::open(&test_opts(&dir))?;

        cache.set_value("konfigs.used", &json!({"id": "a"}))?;
        cache.set_value("konfigs.used", &json!({"id": "b"}))?;

        let used: serde_json::Value = cache.get_value("konfigs.used")?;
        assert_eq!(used, json!({"id": "b"}));

        cache.close()
    }

    #[test]
    fn test_values_persist_across_reopen() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let opts = test_opts(&dir);

        let cache = Cache::open(&opts)?;
        cache.set_value("answer", &42u32)?;
        cache.close()?;

        let cache = Cache::open(&opts)?;
        let answer: u32 = cache.get_value("answer")?;
        assert_eq!(answer, 42);
        cache.close()
    }

    #[test]
    fn test_buckets_are_isolated() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("shared.bolt");

        let cache = Cache::open(&CacheOptions::new(&file, "klient"))?;
        cache.set_value("key", "klient-value")?;
        cache.close()?;

        let cache = Cache::open(&CacheOptions::new(&file, "kd"))?;
        assert!(cache
            .get_value::<String>("key")
            .unwrap_err()
            .is_not_found());
        cache.close()
    }

    #[test]
    fn test_decode_error_is_codec() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let cache = Cache::open(&test_opts(&dir))?;
        cache.set_value("key", "not a number")?;

        let err = cache.get_value::<u32>("key").unwrap_err();
        assert!(matches!(err, StoreError::Codec { ref key, .. } if key == "key"));
        cache.close()
    }

    #[test]
    fn test_open_times_out_while_locked() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let opts = test_opts(&dir).with_timeout(Duration::from_millis(150));

        let held = Cache::open(&opts)?;

        let started = Instant::now();
        let err = Cache::open(&opts).err().expect("second open should time out");
        assert!(matches!(err, StoreError::LockTimeout { .. }));
        assert!(started.elapsed() >= Duration::from_millis(150));

        held.close()?;

        // 释放后可再次打开
        Cache::open(&opts)?.close()
    }

    #[test]
    fn test_creates_parent_directory() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let opts = CacheOptions::new(dir.path().join("nested/dir/konfig.bolt"), "konfig");

        Cache::open(&opts)?.close()?;
        assert!(opts.file.exists());
        assert!(opts.lock_path().exists());
        Ok(())
    }
}
