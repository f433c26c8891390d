//! 同步错误类型
//!
//! 任何一种错误都会中止当前运行，核心不做重试，也不跳过失败项。

use std::path::{Path, PathBuf};
use thiserror::Error;

/// 对象存储底层错误（由适配器装箱）
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// 源根路径不存在
    #[error("path not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// 遍历时无权限打开目录
    #[error("permission denied: {}", path.display())]
    Permission {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 列举 / 读取 / 写入 / 删除对象失败
    #[error("object store {op} failed for '{key}': {source}")]
    ObjectStore {
        op: &'static str,
        key: String,
        #[source]
        source: BoxError,
    },

    /// 本地读写删除失败
    #[error("local io failed for {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 非 UTF-8 的本地路径，或会逃出本地根的 key（`..`、`.`、盘符等）
    #[error("invalid path: {}", path.display())]
    InvalidPath { path: PathBuf },
}

pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    pub fn object_store(op: &'static str, key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        SyncError::ObjectStore {
            op,
            key: key.into(),
            source: source.into(),
        }
    }

    /// 按 io 错误类型归类本地错误
    pub fn from_io(path: &Path, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => SyncError::NotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => SyncError::Permission {
                path: path.to_path_buf(),
                source,
            },
            _ => SyncError::LocalIo {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    pub fn local_io(path: &Path, source: std::io::Error) -> Self {
        SyncError::LocalIo {
            path: path.to_path_buf(),
            source,
        }
    }
}
