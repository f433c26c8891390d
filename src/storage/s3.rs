use super::{
    Bucket, ListPage, ObjectEntry, ObjectMeta, ObjectStore, PutOutcome, DEFAULT_PAGE_SIZE,
    IO_TIMEOUT_SECS, OP_TIMEOUT_SECS,
};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use futures::TryStreamExt;
use opendal::{
    layers::{RetryLayer, TimeoutLayer},
    Metakey, Operator,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 适配器参数
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// 自定义 endpoint，优先于 COS 默认域名
    pub endpoint: Option<String>,
    /// 使用 COS 全球加速域名
    pub accelerate: bool,
    /// 上传时使用的存储类型
    pub storage_class: String,
    /// 每页最多返回的对象数
    pub page_size: usize,
    pub op_timeout_secs: u64,
    pub io_timeout_secs: u64,
    /// 传输层重试次数（由 opendal 处理）
    pub max_retries: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            endpoint: None,
            accelerate: false,
            storage_class: "STANDARD".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            op_timeout_secs: OP_TIMEOUT_SECS,
            io_timeout_secs: IO_TIMEOUT_SECS,
            max_retries: 3,
        }
    }
}

/// 上传后对外地址的生成方式
#[derive(Debug, Clone)]
enum LocationBase {
    Cos,
    Endpoint(String),
    Emulated(PathBuf),
}

/// 基于 opendal 的对象存储客户端
pub struct OpendalStore {
    operator: Operator,
    bucket: Bucket,
    name: String,
    page_size: usize,
    location: LocationBase,
}

impl OpendalStore {
    /// 连接 COS（S3 兼容接口）
    pub fn cos(
        bucket: &Bucket,
        secret_id: &str,
        secret_key: &str,
        options: &StoreOptions,
    ) -> anyhow::Result<Self> {
        use opendal::services::S3;

        let (endpoint, location) = match options.endpoint {
            Some(ref ep) => (
                ep.trim_end_matches('/').to_string(),
                LocationBase::Endpoint(ep.trim_end_matches('/').to_string()),
            ),
            None if options.accelerate => (
                "https://cos.accelerate.myqcloud.com".to_string(),
                LocationBase::Cos,
            ),
            None => (
                format!("https://cos.{}.myqcloud.com", bucket.region),
                LocationBase::Cos,
            ),
        };

        let builder = S3::default()
            .bucket(&bucket.name)
            .region(&bucket.region)
            .endpoint(&endpoint)
            .access_key_id(secret_id)
            .secret_access_key(secret_key)
            .default_storage_class(&options.storage_class)
            .enable_virtual_host_style()
            .disable_config_load();

        // 添加超时与重试层
        let operator = Operator::new(builder)?
            .layer(Self::timeout_layer(options))
            .layer(RetryLayer::new().with_max_times(options.max_retries))
            .finish();
        let name = format!("cos://{}", bucket.name);
        tracing::info!("初始化 COS 存储: bucket={}, endpoint={}", bucket.name, endpoint);

        Ok(Self {
            operator,
            bucket: bucket.clone(),
            name,
            page_size: options.page_size.max(1),
            location,
        })
    }

    /// 以本地目录模拟存储桶（`<root>/<bucket>/<key>`），用于离线运行
    pub fn emulated(root: &Path, bucket: &Bucket, options: &StoreOptions) -> anyhow::Result<Self> {
        use opendal::services::Fs;

        let bucket_dir = root.join(&bucket.name);
        std::fs::create_dir_all(&bucket_dir)?;
        let root_str = bucket_dir
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid emulate root: {:?}", bucket_dir))?;

        let operator = Operator::new(Fs::default().root(root_str))?
            .layer(Self::timeout_layer(options))
            .finish();
        tracing::info!("初始化模拟存储: {}", bucket_dir.display());

        Ok(Self {
            operator,
            bucket: bucket.clone(),
            name: format!("emulated:{}", bucket_dir.display()),
            page_size: options.page_size.max(1),
            location: LocationBase::Emulated(bucket_dir),
        })
    }

    fn timeout_layer(options: &StoreOptions) -> TimeoutLayer {
        TimeoutLayer::default()
            .with_timeout(Duration::from_secs(options.op_timeout_secs))
            .with_io_timeout(Duration::from_secs(options.io_timeout_secs))
    }

    /// 每个客户端只服务一个存储桶
    fn ensure_bucket(&self, bucket: &Bucket, key: &str) -> SyncResult<()> {
        if *bucket == self.bucket {
            return Ok(());
        }
        Err(SyncError::object_store(
            "bind",
            key,
            format!(
                "client is bound to bucket '{}', got '{}'",
                self.bucket.name, bucket.name
            ),
        ))
    }

    fn location_for(&self, key: &str) -> String {
        match &self.location {
            LocationBase::Cos => format!(
                "https://{}.cos.{}.myqcloud.com/{}",
                self.bucket.name, self.bucket.region, key
            ),
            LocationBase::Endpoint(ep) => format!("{}/{}/{}", ep, self.bucket.name, key),
            LocationBase::Emulated(dir) => format!("file://{}", dir.join(key).display()),
        }
    }
}

/// 列举时使用的目录：前缀中最后一个 `/` 之前的部分
fn list_dir(prefix: &str) -> &str {
    match prefix.rfind('/') {
        Some(idx) => &prefix[..=idx],
        None => "/",
    }
}

#[async_trait]
impl ObjectStore for OpendalStore {
    async fn list_objects(
        &self,
        bucket: &Bucket,
        prefix: &str,
        marker: Option<&str>,
    ) -> SyncResult<ListPage> {
        self.ensure_bucket(bucket, prefix)?;

        // S3 原生支持 start_after 且按字典序返回；其他后端在客户端排序后分页
        let native = self
            .operator
            .info()
            .full_capability()
            .list_with_start_after;

        let mut future = self
            .operator
            .lister_with(list_dir(prefix))
            .recursive(true)
            .metakey(Metakey::ContentLength | Metakey::Mode);
        if native {
            if let Some(m) = marker {
                future = future.start_after(m);
            }
        }
        let mut lister = future
            .await
            .map_err(|e| SyncError::object_store("list", prefix, e))?;

        let mut items = Vec::new();
        while let Some(entry) = lister
            .try_next()
            .await
            .map_err(|e| SyncError::object_store("list", prefix, e))?
        {
            let key = entry.path().trim_start_matches('/');

            // 跳过目录占位对象
            if key.is_empty() || key.ends_with('/') || !key.starts_with(prefix) {
                continue;
            }
            if !native && marker.is_some_and(|m| key <= m) {
                continue;
            }

            items.push(ObjectEntry::new(key, entry.metadata().content_length()));
            if native && items.len() > self.page_size {
                break;
            }
        }

        if !native {
            items.sort_by(|a, b| a.key.cmp(&b.key));
        }

        let truncated = items.len() > self.page_size;
        items.truncate(self.page_size);
        let next_marker = if truncated {
            items.last().map(|i| i.key.clone())
        } else {
            None
        };

        tracing::debug!(
            "列举 {}: {} 个对象, truncated={}",
            prefix,
            items.len(),
            truncated
        );

        Ok(ListPage {
            items,
            truncated,
            next_marker,
        })
    }

    async fn head_object(&self, bucket: &Bucket, key: &str) -> SyncResult<Option<ObjectMeta>> {
        self.ensure_bucket(bucket, key)?;
        match self.operator.stat(key).await {
            Ok(meta) => Ok(Some(ObjectMeta {
                size: meta.content_length(),
                is_dir: meta.is_dir(),
            })),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::object_store("head", key, e)),
        }
    }

    async fn get_object(&self, bucket: &Bucket, key: &str) -> SyncResult<Vec<u8>> {
        self.ensure_bucket(bucket, key)?;
        let data = self
            .operator
            .read(key)
            .await
            .map_err(|e| SyncError::object_store("get", key, e))?;
        Ok(data.to_vec())
    }

    async fn put_object(&self, bucket: &Bucket, key: &str, data: Vec<u8>) -> SyncResult<PutOutcome> {
        self.ensure_bucket(bucket, key)?;
        self.operator
            .write(key, data)
            .await
            .map_err(|e| SyncError::object_store("put", key, e))?;
        Ok(PutOutcome {
            location: Some(self.location_for(key)),
        })
    }

    async fn delete_object(&self, bucket: &Bucket, key: &str) -> SyncResult<()> {
        self.ensure_bucket(bucket, key)?;
        // 删除不存在的对象不会报错
        self.operator
            .delete(key)
            .await
            .map_err(|e| SyncError::object_store("delete", key, e))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
