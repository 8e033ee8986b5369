//! 统一错误类型定义
//!
//! 使用 `thiserror` 定义配置存储的所有错误类型。
//!
//! - `NotFound`: 缓存中不存在该键（只读路径视为空值，`used` 中作为显式错误）
//! - `KonfigNotFound`: 激活引用指向集合中不存在的配置
//! - `Validation`: 候选配置未通过校验，任何写入前即拒绝
//! - `Merge`: 覆盖层无法解码为配置
//! - 其余变体均为存储错误（读写、锁超时），属于致命错误

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// 配置存储的统一错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    /// 键不存在
    #[error("key not found: {0}")]
    NotFound(String),

    /// 激活引用悬空
    #[error("config not found - use one that exists")]
    KonfigNotFound { id: String },

    /// 配置校验失败
    #[error("invalid config: {0}")]
    Validation(String),

    /// 合并覆盖层失败
    #[error("unable to merge config: {0}")]
    Merge(#[source] serde_json::Error),

    /// 值的 JSON 编解码失败
    #[error("unable to encode/decode value of {key:?}: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// 数据库错误
    #[error("cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// 文件 I/O 错误
    #[error("i/o error: {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 获取文件锁超时
    #[error("timed out after {timeout:?} waiting for lock on {}", path.display())]
    LockTimeout { path: PathBuf, timeout: Duration },

    /// 配置目录无法解析
    #[error("unable to resolve config home: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// 从 `std::io::Error` 和路径创建 I/O 错误
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// 是否为“键不存在”（只读路径中非致命）
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// 将“键不存在”转换为 `None`，其余错误原样返回
pub fn found<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::NotFound("konfigs.used".to_string());
        assert_eq!(err.to_string(), "key not found: konfigs.used");

        let err = StoreError::KonfigNotFound {
            id: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "config not found - use one that exists");
    }

    #[test]
    fn test_io_error_construction() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = StoreError::io("/path/to/file", io_err);
        assert!(err.to_string().contains("/path/to/file"));
    }

    #[test]
    fn test_found_tolerates_only_not_found() {
        let missing: Result<u32> = Err(StoreError::NotFound("konfig".into()));
        assert!(matches!(found(missing), Ok(None)));

        let present: Result<u32> = Ok(7);
        assert!(matches!(found(present), Ok(Some(7))));

        let dangling: Result<u32> = Err(StoreError::KonfigNotFound { id: "x".into() });
        assert!(matches!(
            found(dangling),
            Err(StoreError::KonfigNotFound { .. })
        ));
    }

    #[test]
    fn test_lock_timeout_message() {
        let err = StoreError::LockTimeout {
            path: PathBuf::from("/tmp/konfig.bolt"),
            timeout: Duration::from_secs(5),
        };
        assert!(err.to_string().contains("konfig.bolt"));
        assert!(err.to_string().contains("5s"));
    }
}
