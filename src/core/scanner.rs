use crate::core::comparator::FileSet;
use crate::core::path_key::{looks_like_file, normalize, parent_of, RootKind};
use crate::error::{SyncError, SyncResult};
use crate::storage::{Bucket, ObjectStore};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// 本地根
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRoot {
    pub path: PathBuf,
    pub kind: RootKind,
}

impl LocalRoot {
    /// 文件所在目录（单文件根时为父目录）
    pub fn dir(&self) -> PathBuf {
        match self.kind {
            RootKind::File => self
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            RootKind::Directory => self.path.clone(),
        }
    }
}

/// 远端根
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRoot {
    /// 去掉前导 `/` 的前缀或对象 key
    pub prefix: String,
    pub kind: RootKind,
}

impl RemoteRoot {
    pub fn new(prefix: &str, kind: RootKind) -> Self {
        Self {
            prefix: prefix.trim_start_matches('/').to_string(),
            kind,
        }
    }

    /// 按名称推断类型
    pub fn guess(prefix: &str) -> Self {
        let kind = if looks_like_file(prefix) {
            RootKind::File
        } else {
            RootKind::Directory
        };
        Self::new(prefix, kind)
    }

    /// 有效目录（单对象根时为父前缀），不带末尾 `/`
    pub fn dir(&self) -> &str {
        match self.kind {
            RootKind::File => parent_of(&self.prefix),
            RootKind::Directory => self.prefix.trim_end_matches('/'),
        }
    }

    /// 列举时使用的前缀：空串或以 `/` 结尾
    pub fn list_prefix(&self) -> String {
        let dir = self.dir();
        if dir.is_empty() {
            String::new()
        } else {
            format!("{}/", dir)
        }
    }
}

fn path_str(path: &Path) -> SyncResult<&str> {
    path.to_str().ok_or_else(|| SyncError::InvalidPath {
        path: path.to_path_buf(),
    })
}

fn walk_error(root: &Path, err: walkdir::Error) -> SyncError {
    let path = err.path().unwrap_or(root).to_path_buf();
    if err.loop_ancestor().is_some() {
        let message = err.to_string();
        return SyncError::local_io(&path, std::io::Error::other(message));
    }
    match err.into_io_error() {
        Some(io) => SyncError::from_io(&path, io),
        None => SyncError::local_io(&path, std::io::Error::other("walk failed")),
    }
}

/// 扫描本地根下的全部文件
///
/// 根是普通文件时只返回它自己；任何子目录无法打开都会中止整个扫描，
/// 不完整的集合会在镜像模式下导致误删。
pub async fn walk_local(root: &Path) -> SyncResult<FileSet> {
    let root = root.to_path_buf();
    let task_root = root.clone();

    // 使用 spawn_blocking 避免阻塞 async runtime
    tokio::task::spawn_blocking(move || walk_local_blocking(&task_root))
        .await
        .map_err(|e| SyncError::local_io(&root, std::io::Error::other(e)))?
}

fn walk_local_blocking(root: &Path) -> SyncResult<FileSet> {
    // 跟随链接，与 stat 的结果保持一致
    let meta = std::fs::metadata(root).map_err(|e| SyncError::from_io(root, e))?;
    let root_str = path_str(root)?;

    if !meta.is_dir() {
        debug!("本地根是单个文件: {}", root.display());
        return Ok(FileSet::from_iter([normalize(root_str, root_str, true)]));
    }

    info!("开始扫描本地目录: {}", root.display());

    let mut files = FileSet::new();
    let mut dir_count = 0usize;

    for entry in WalkDir::new(root).follow_links(true).min_depth(1) {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if entry.file_type().is_dir() {
            dir_count += 1;
            continue;
        }
        let key = normalize(root_str, path_str(entry.path())?, false);
        files.insert(key);
    }

    info!("本地扫描完成: {} 个文件, {} 个目录", files.len(), dir_count);
    Ok(files)
}

/// 按名称推断根类型后扫描远端前缀
pub async fn walk_remote(store: &dyn ObjectStore, bucket: &Bucket, prefix: &str) -> SyncResult<FileSet> {
    walk_remote_root(store, bucket, &RemoteRoot::guess(prefix)).await
}

/// 扫描远端根下的全部对象，翻页直到后端不再报告截断
pub async fn walk_remote_root(
    store: &dyn ObjectStore,
    bucket: &Bucket,
    root: &RemoteRoot,
) -> SyncResult<FileSet> {
    let list_prefix = root.list_prefix();
    info!(
        "开始扫描存储: {}, bucket={}, prefix={:?}",
        store.name(),
        bucket.name,
        root.prefix
    );

    let mut files = FileSet::new();
    let mut marker: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = store
            .list_objects(bucket, &list_prefix, marker.as_deref())
            .await?;
        pages += 1;
        debug!(
            "第 {} 页: {} 个对象, truncated={}",
            pages,
            page.items.len(),
            page.truncated
        );

        let last_key = page.items.last().map(|item| item.key.clone());

        for item in &page.items {
            match root.kind {
                RootKind::File => {
                    if item.key == root.prefix {
                        files.insert_with_origin(
                            normalize(&root.prefix, &item.key, true),
                            item.key.as_str(),
                        );
                    }
                }
                RootKind::Directory => {
                    // 跳过目录占位对象
                    if item.key.ends_with('/') {
                        continue;
                    }
                    let key = normalize(root.dir(), &item.key, false);
                    if !key.is_empty() {
                        files.insert_with_origin(key, item.key.as_str());
                    }
                }
            }
        }

        if !page.truncated {
            break;
        }

        // 没有 NextMarker 时用本页最后一个 key 续列
        match page.next_marker.or(last_key) {
            Some(next) if marker.as_deref() != Some(next.as_str()) => marker = Some(next),
            _ => {
                return Err(SyncError::object_store(
                    "list",
                    list_prefix,
                    "truncated listing did not advance the marker",
                ))
            }
        }
    }

    info!("远端扫描完成: {} 个对象, {} 页", files.len(), pages);
    Ok(files)
}
