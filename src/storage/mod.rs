#[cfg(test)]
pub(crate) mod memory;
pub mod s3;

use crate::error::SyncResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use s3::{OpendalStore, StoreOptions};

// ============ 公共常量 ============

/// 非 IO 操作超时（秒）- stat, delete, list 等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- read, write 等
pub const IO_TIMEOUT_SECS: u64 = 300;
/// 每页最多返回的对象数（与 COS / S3 的 MaxKeys 上限一致）
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// 存储桶定位信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    pub region: String,
}

impl Bucket {
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
        }
    }
}

/// 列举结果中的单个对象
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
}

impl ObjectEntry {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
        }
    }
}

/// 一页列举结果
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub items: Vec<ObjectEntry>,
    /// 后端还有更多结果
    pub truncated: bool,
    /// 下一次请求使用的续列标记
    pub next_marker: Option<String>,
}

impl ListPage {
    /// 从后端原始响应字段构造
    ///
    /// COS / S3 的 `IsTruncated` 是字符串，只有字面量 `"true"` 表示还有下一页；
    /// 空字符串的 `NextMarker` 视为没有标记。
    pub fn from_wire(items: Vec<ObjectEntry>, is_truncated: &str, next_marker: Option<String>) -> Self {
        Self {
            items,
            truncated: is_truncated == "true",
            next_marker: next_marker.filter(|m| !m.is_empty()),
        }
    }
}

/// 上传结果
#[derive(Debug, Clone, Default)]
pub struct PutOutcome {
    /// 对象的公开访问地址（后端能给出时）
    pub location: Option<String>,
}

/// 元数据（HEAD 探测）
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    pub size: u64,
    pub is_dir: bool,
}

/// 对象存储抽象接口
///
/// 所有方法都是可能失败的远程调用，失败一律映射为 `SyncError::ObjectStore`。
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 列举一页以 `prefix` 开头的对象，`marker` 为上一页返回的续列标记
    async fn list_objects(
        &self,
        bucket: &Bucket,
        prefix: &str,
        marker: Option<&str>,
    ) -> SyncResult<ListPage>;

    /// 获取对象元数据，不存在时返回 None
    async fn head_object(&self, bucket: &Bucket, key: &str) -> SyncResult<Option<ObjectMeta>>;

    /// 读取整个对象
    async fn get_object(&self, bucket: &Bucket, key: &str) -> SyncResult<Vec<u8>>;

    /// 写入整个对象
    async fn put_object(&self, bucket: &Bucket, key: &str, data: Vec<u8>) -> SyncResult<PutOutcome>;

    /// 删除对象（不存在时不报错）
    async fn delete_object(&self, bucket: &Bucket, key: &str) -> SyncResult<()>;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}
