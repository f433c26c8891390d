use crate::core::comparator::{reconcile, FileSet, ReconciliationResult};
use crate::core::path_key::{join_key, PathKey, RootKind};
use crate::core::scanner::{walk_local, walk_remote_root, LocalRoot, RemoteRoot};
use crate::core::transfer::{Phase, ProgressEvent, TransferProgress};
use crate::error::{SyncError, SyncResult};
use crate::storage::{Bucket, ObjectStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// 同步方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// 本地 -> 远端
    Upload,
    /// 远端 -> 本地
    Download,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upload => write!(f, "upload"),
            Direction::Download => write!(f, "download"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "upload" => Ok(Direction::Upload),
            "download" => Ok(Direction::Download),
            other => Err(format!("unknown sync type '{}', expected upload or download", other)),
        }
    }
}

/// 远端根的判定方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteRootMode {
    /// 按最后一段是否带扩展名推断
    #[default]
    Guess,
    /// HEAD 探测对象是否存在
    Probe,
}

/// 同步配置，单次运行内不可变
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub local_root: PathBuf,
    pub remote_root: String,
    pub bucket: Bucket,
    pub direction: Direction,
    /// 删除目标中源侧不存在的文件
    pub mirror_delete: bool,
    pub remote_root_mode: RemoteRootMode,
}

/// 执行结果
#[derive(Debug, Clone, Default)]
pub struct TransferOutcome {
    pub transferred: usize,
    pub deleted: usize,
    pub bytes: u64,
    /// 上传后对象的公开地址，按传输顺序
    pub locations: Vec<String>,
}

/// 同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub direction: Direction,
    pub start_time: i64,
    pub end_time: i64,
    pub files_to_transfer: usize,
    pub files_transferred: usize,
    pub files_to_clean: usize,
    pub files_cleaned: usize,
    pub bytes_transferred: u64,
    pub locations: Vec<String>,
    pub duration_ms: u64,
}

impl SyncReport {
    /// 逗号拼接的上传地址
    pub fn locations_joined(&self) -> String {
        self.locations.join(",")
    }
}

/// 同步引擎
pub struct SyncEngine {
    config: SyncConfig,
    store: Arc<dyn ObjectStore>,
}

impl SyncEngine {
    pub fn new(config: SyncConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// 运行同步：扫描 -> 比较 -> 执行
    pub async fn run(&self, progress_tx: Option<mpsc::Sender<ProgressEvent>>) -> SyncResult<SyncReport> {
        let start_time = chrono::Utc::now().timestamp_millis();
        let direction = self.config.direction;

        info!(
            "开始同步: {} {} <-> {}:{}",
            direction,
            self.config.local_root.display(),
            self.store.name(),
            self.config.remote_root
        );

        let local = self.resolve_local_root().await?;
        let remote = self.resolve_remote_root(&local).await?;
        debug!("本地根: {:?}, 远端根: {:?}", local, remote);

        let plan = self.plan(&local, &remote).await?;

        info!("{} files to be {}ed", plan.to_transfer.len(), direction);
        if !plan.to_delete.is_empty() {
            info!("{} files to be cleaned", plan.to_delete.len());
        }

        let outcome = self.execute(&plan, &local, &remote, &progress_tx).await?;

        let end_time = chrono::Utc::now().timestamp_millis();
        info!(
            "同步完成: 传输 {}, 删除 {}, {} 字节",
            outcome.transferred, outcome.deleted, outcome.bytes
        );

        Ok(SyncReport {
            direction,
            start_time,
            end_time,
            files_to_transfer: plan.to_transfer.len(),
            files_transferred: outcome.transferred,
            files_to_clean: plan.to_delete.len(),
            files_cleaned: outcome.deleted,
            bytes_transferred: outcome.bytes,
            locations: outcome.locations,
            duration_ms: (end_time - start_time).max(0) as u64,
        })
    }

    /// 判定本地根类型
    ///
    /// 上传时本地根必须存在；下载时不存在则创建目录。
    pub async fn resolve_local_root(&self) -> SyncResult<LocalRoot> {
        let path = self.config.local_root.clone();
        match fs::metadata(&path).await {
            Ok(meta) => {
                let kind = if meta.is_dir() {
                    RootKind::Directory
                } else {
                    RootKind::File
                };
                Ok(LocalRoot { path, kind })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => match self.config.direction {
                Direction::Upload => Err(SyncError::NotFound { path }),
                Direction::Download => {
                    debug!("本地目录不存在，自动创建: {}", path.display());
                    fs::create_dir_all(&path)
                        .await
                        .map_err(|e| SyncError::local_io(&path, e))?;
                    Ok(LocalRoot {
                        path,
                        kind: RootKind::Directory,
                    })
                }
            },
            Err(e) => Err(SyncError::from_io(&path, e)),
        }
    }

    /// 判定远端根类型
    ///
    /// 上传目录时远端根总是目录：`releases/v1.2` 这样带点的前缀不能当成单个对象。
    pub async fn resolve_remote_root(&self, local: &LocalRoot) -> SyncResult<RemoteRoot> {
        let raw = self.config.remote_root.as_str();
        let trimmed = raw.trim_start_matches('/');
        let uploading_dir =
            self.config.direction == Direction::Upload && local.kind == RootKind::Directory;
        if trimmed.is_empty() || trimmed.ends_with('/') || uploading_dir {
            return Ok(RemoteRoot::new(trimmed, RootKind::Directory));
        }

        match self.config.remote_root_mode {
            RemoteRootMode::Guess => Ok(RemoteRoot::guess(trimmed)),
            RemoteRootMode::Probe => {
                let meta = self
                    .store
                    .head_object(&self.config.bucket, trimmed)
                    .await?;
                let kind = match meta {
                    Some(m) if !m.is_dir => RootKind::File,
                    _ => RootKind::Directory,
                };
                Ok(RemoteRoot::new(trimmed, kind))
            }
        }
    }

    /// 扫描两侧并计算差异；非镜像模式不扫描目标
    pub async fn plan(&self, local: &LocalRoot, remote: &RemoteRoot) -> SyncResult<ReconciliationResult> {
        let mirror = self.config.mirror_delete;
        let (source, destination) = match self.config.direction {
            Direction::Upload => {
                let source = walk_local(&local.path).await?;
                let destination = if mirror {
                    walk_remote_root(self.store.as_ref(), &self.config.bucket, remote).await?
                } else {
                    FileSet::new()
                };
                (source, destination)
            }
            Direction::Download => {
                let source =
                    walk_remote_root(self.store.as_ref(), &self.config.bucket, remote).await?;
                let destination = if mirror {
                    walk_local(&local.path).await?
                } else {
                    FileSet::new()
                };
                (source, destination)
            }
        };

        Ok(reconcile(&source, &destination, mirror))
    }

    /// 顺序执行传输和删除，任意一项失败立即中止并返回原始错误
    pub async fn execute(
        &self,
        plan: &ReconciliationResult,
        local: &LocalRoot,
        remote: &RemoteRoot,
        progress_tx: &Option<mpsc::Sender<ProgressEvent>>,
    ) -> SyncResult<TransferOutcome> {
        let bucket = &self.config.bucket;
        let local_dir = local.dir();
        let remote_dir = remote.dir();
        let mut outcome = TransferOutcome::default();

        // 先校验全部本地路径，避免写到一半才发现越界的 key
        if self.config.direction == Direction::Download {
            for key in plan.to_transfer.iter().chain(plan.to_delete.iter()) {
                local_path(&local_dir, key)?;
            }
        }

        let phase = match self.config.direction {
            Direction::Upload => Phase::Upload,
            Direction::Download => Phase::Download,
        };
        let mut progress = TransferProgress::new(plan.to_transfer.len());

        for key in &plan.to_transfer {
            let local_path = local_path(&local_dir, key)?;
            let remote_key = remote_key(&plan.to_transfer, remote_dir, key);

            let target = match self.config.direction {
                Direction::Upload => {
                    debug!("UPLOAD FILE ----> {}", key);
                    let data = fs::read(&local_path)
                        .await
                        .map_err(|e| SyncError::local_io(&local_path, e))?;
                    outcome.bytes += data.len() as u64;
                    let put = self.store.put_object(bucket, &remote_key, data).await?;
                    if let Some(location) = put.location {
                        outcome.locations.push(location);
                    }
                    local_path.display().to_string()
                }
                Direction::Download => {
                    debug!("DOWNLOAD FILE ----> {}", key);
                    let data = self.store.get_object(bucket, &remote_key).await?;
                    outcome.bytes += data.len() as u64;
                    write_local(&local_path, data).await?;
                    local_path.display().to_string()
                }
            };

            outcome.transferred += 1;
            let snapshot = progress.advance();
            info!(">> {} {} {}", snapshot, phase, target);
            self.send_progress(progress_tx, phase, key, target, snapshot);
        }

        let mut progress = TransferProgress::new(plan.to_delete.len());

        for key in &plan.to_delete {
            let target = match self.config.direction {
                Direction::Upload => {
                    let remote_key = remote_key(&plan.to_delete, remote_dir, key);
                    self.store.delete_object(bucket, &remote_key).await?;
                    remote_key
                }
                Direction::Download => {
                    let path = local_path(&local_dir, key)?;
                    fs::remove_file(&path)
                        .await
                        .map_err(|e| SyncError::local_io(&path, e))?;
                    path.display().to_string()
                }
            };

            outcome.deleted += 1;
            let snapshot = progress.advance();
            info!(">> {} {} {}", snapshot, Phase::Clean, target);
            self.send_progress(progress_tx, Phase::Clean, key, target, snapshot);
        }

        Ok(outcome)
    }

    /// 发送进度更新
    ///
    /// 不等待接收方：通道满了或已关闭时丢弃这条进度，同步本身不受影响。
    fn send_progress(
        &self,
        tx: &Option<mpsc::Sender<ProgressEvent>>,
        phase: Phase,
        key: &PathKey,
        target: String,
        progress: TransferProgress,
    ) {
        if let Some(tx) = tx {
            let event = ProgressEvent {
                phase,
                key: key.clone(),
                target,
                progress,
            };
            if let Err(mpsc::error::TrySendError::Full(event)) = tx.try_send(event) {
                debug!("进度通道已满，丢弃: {} {}", event.progress, event.key);
            }
        }
    }
}

/// PathKey 对应的本地路径
///
/// 每一段都必须是普通文件名；`..`、`.`、空段或盘符会让路径落到根目录之外。
fn local_path(dir: &Path, key: &PathKey) -> SyncResult<PathBuf> {
    let mut path = dir.to_path_buf();
    for seg in key.segments() {
        let mut components = Path::new(seg).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => path.push(name),
            _ => {
                return Err(SyncError::InvalidPath {
                    path: dir.join(key.as_str()),
                })
            }
        }
    }
    Ok(path)
}

/// 远端对象 key：优先用扫描时记下的原始 key
fn remote_key(files: &FileSet, remote_dir: &str, key: &PathKey) -> String {
    match files.origin(key) {
        Some(origin) => origin.to_string(),
        None => join_key(remote_dir, key),
    }
}

/// 写入本地文件：先建父目录，写临时文件后重命名
async fn write_local(path: &Path, data: Vec<u8>) -> SyncResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| SyncError::local_io(parent, e))?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".cos-sync.tmp");
    let temp_path = path.with_file_name(temp_name);

    fs::write(&temp_path, data)
        .await
        .map_err(|e| SyncError::local_io(&temp_path, e))?;
    fs::rename(&temp_path, path)
        .await
        .map_err(|e| SyncError::local_io(path, e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;

    fn bucket() -> Bucket {
        Bucket::new("site-1250000000", "ap-guangzhou")
    }

    fn config(local: &Path, remote: &str, direction: Direction, mirror: bool) -> SyncConfig {
        SyncConfig {
            local_root: local.to_path_buf(),
            remote_root: remote.to_string(),
            bucket: bucket(),
            direction,
            mirror_delete: mirror,
            remote_root_mode: RemoteRootMode::Guess,
        }
    }

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[tokio::test]
    async fn test_upload_with_clean() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.html", "<html>");
        write(dir.path(), "css/site.css", "body{}");

        let store = Arc::new(
            MemoryStore::new(100).with_objects(&["site/index.html", "site/old.js", "other/keep.txt"]),
        );
        let engine = SyncEngine::new(
            config(dir.path(), "site", Direction::Upload, true),
            store.clone(),
        );

        let report = engine.run(None).await.unwrap();
        assert_eq!(report.files_transferred, 2);
        assert_eq!(report.files_cleaned, 1);
        assert_eq!(
            store.keys(),
            vec!["other/keep.txt", "site/css/site.css", "site/index.html"]
        );
        assert_eq!(store.object("site/css/site.css").unwrap(), b"body{}");
        assert_eq!(
            report.locations_joined(),
            "https://mem.example/site/css/site.css,https://mem.example/site/index.html"
        );
    }

    #[tokio::test]
    async fn test_upload_without_clean_skips_remote_listing() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "a");

        let store = Arc::new(MemoryStore::new(100).with_objects(&["site/old.txt"]));
        let engine = SyncEngine::new(
            config(dir.path(), "site", Direction::Upload, false),
            store.clone(),
        );

        let report = engine.run(None).await.unwrap();
        assert_eq!(report.files_cleaned, 0);
        assert_eq!(store.list_calls(), 0);
        assert!(store.object("site/old.txt").is_some());
    }

    #[tokio::test]
    async fn test_upload_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "a");
        write(dir.path(), "b/c.txt", "c");

        let store = Arc::new(MemoryStore::new(100));
        let engine = SyncEngine::new(
            config(dir.path(), "site", Direction::Upload, false),
            store.clone(),
        );

        let local = engine.resolve_local_root().await.unwrap();
        let remote = engine.resolve_remote_root(&local).await.unwrap();
        let first = engine.plan(&local, &remote).await.unwrap();
        engine.execute(&first, &local, &remote, &None).await.unwrap();
        let after_first = store.keys();

        let second = engine.plan(&local, &remote).await.unwrap();
        engine.execute(&second, &local, &remote, &None).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.keys(), after_first);
    }

    #[tokio::test]
    async fn test_fail_fast_on_third_item() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1.txt", "2.txt", "3.txt", "4.txt", "5.txt"] {
            write(dir.path(), name, name);
        }

        let store = Arc::new(MemoryStore::new(100).fail_at(3));
        let engine = SyncEngine::new(
            config(dir.path(), "dest", Direction::Upload, false),
            store.clone(),
        );

        let err = engine.run(None).await.unwrap_err();
        match &err {
            SyncError::ObjectStore { op, key, .. } => {
                assert_eq!(*op, "put");
                assert_eq!(key, "dest/3.txt");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            err.to_string(),
            "object store put failed for 'dest/3.txt': injected failure"
        );
        assert_eq!(
            store.calls(),
            vec!["put:dest/1.txt", "put:dest/2.txt", "put:dest/3.txt"]
        );
        assert!(store.object("dest/4.txt").is_none());
    }

    #[tokio::test]
    async fn test_download_with_clean() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("out");
        write(&local, "stale.txt", "old");
        write(&local, "a.txt", "old a");

        let store = Arc::new(MemoryStore::new(2).with_objects(&[
            "site/a.txt",
            "site/deep/b/c.txt",
            "site/d.txt",
        ]));
        let engine = SyncEngine::new(
            config(&local, "site/", Direction::Download, true),
            store.clone(),
        );

        let (tx, mut rx) = mpsc::channel(16);
        let report = engine.run(Some(tx)).await.unwrap();
        assert_eq!(report.files_transferred, 3);
        assert_eq!(report.files_cleaned, 1);
        assert!(report.locations.is_empty());

        assert_eq!(std::fs::read(local.join("a.txt")).unwrap(), b"site/a.txt");
        assert_eq!(
            std::fs::read(local.join("deep/b/c.txt")).unwrap(),
            b"site/deep/b/c.txt"
        );
        assert!(!local.join("stale.txt").exists());
        assert!(!local.join("a.txt.cos-sync.tmp").exists());

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 4);
        assert_eq!(events[2].progress, TransferProgress { completed: 3, total: 3 });
        assert_eq!(events[3].phase, Phase::Clean);
        assert_eq!(events[3].key.as_str(), "stale.txt");
    }

    #[tokio::test]
    async fn test_download_creates_missing_local_root() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("missing/dir");

        let store = Arc::new(MemoryStore::new(10).with_objects(&["sync/2024/report.json"]));
        let engine = SyncEngine::new(
            config(&local, "sync/2024/report.json", Direction::Download, false),
            store.clone(),
        );

        let report = engine.run(None).await.unwrap();
        assert_eq!(report.files_transferred, 1);
        assert_eq!(
            std::fs::read(local.join("report.json")).unwrap(),
            b"sync/2024/report.json"
        );
    }

    #[tokio::test]
    async fn test_upload_missing_local_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new(10));
        let engine = SyncEngine::new(
            config(&dir.path().join("nope"), "site", Direction::Upload, false),
            store,
        );
        let err = engine.run(None).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_upload_single_file_root() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "report.json", "{}");
        write(dir.path(), "ignored.json", "{}");

        let store = Arc::new(MemoryStore::new(10));
        let engine = SyncEngine::new(
            config(&dir.path().join("report.json"), "sync/2024", Direction::Upload, false),
            store.clone(),
        );

        engine.run(None).await.unwrap();
        assert_eq!(store.keys(), vec!["sync/2024/report.json"]);
    }

    #[tokio::test]
    async fn test_probe_remote_root() {
        let store = Arc::new(MemoryStore::new(10).with_objects(&["builds/latest", "dist/v1.2/a.js"]));
        let dir = tempfile::tempdir().unwrap();
        let local = LocalRoot {
            path: dir.path().to_path_buf(),
            kind: RootKind::Directory,
        };

        let mut cfg = config(dir.path(), "builds/latest", Direction::Download, false);
        cfg.remote_root_mode = RemoteRootMode::Probe;
        let engine = SyncEngine::new(cfg, store.clone());
        assert_eq!(engine.resolve_remote_root(&local).await.unwrap().kind, RootKind::File);

        let mut cfg = config(dir.path(), "dist/v1.2", Direction::Download, false);
        cfg.remote_root_mode = RemoteRootMode::Probe;
        let engine = SyncEngine::new(cfg, store.clone());
        assert_eq!(
            engine.resolve_remote_root(&local).await.unwrap().kind,
            RootKind::Directory
        );

        let engine = SyncEngine::new(
            config(dir.path(), "dist/v1.2", Direction::Download, false),
            store,
        );
        assert_eq!(engine.resolve_remote_root(&local).await.unwrap().kind, RootKind::File);
    }

    #[tokio::test]
    async fn test_download_rejects_keys_escaping_local_root() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("out");

        let store = Arc::new(MemoryStore::new(10).with_objects(&["site/../escape.txt", "site/ok.txt"]));
        let engine = SyncEngine::new(
            config(&local, "site", Direction::Download, true),
            store.clone(),
        );

        let err = engine.run(None).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidPath { .. }), "{err}");
        assert!(!dir.path().join("escape.txt").exists());
        assert!(!local.join("ok.txt").exists());
        assert!(store.calls().is_empty());
    }

    #[test]
    fn test_local_path_segments() {
        let dir = Path::new("/work/out");
        assert_eq!(
            local_path(dir, &PathKey::new("a/b.txt")).unwrap(),
            PathBuf::from("/work/out/a/b.txt")
        );
        for bad in ["../x", "a/../../x", "./a", "a/."] {
            assert!(local_path(dir, &PathKey::new(bad)).is_err(), "{bad}");
        }
    }

    #[tokio::test]
    async fn test_download_uses_listed_keys() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("out");

        let store = Arc::new(MemoryStore::new(10).with_objects(&["site/a//b.txt", "site/ok.txt"]));
        let engine = SyncEngine::new(
            config(&local, "site", Direction::Download, false),
            store.clone(),
        );

        let report = engine.run(None).await.unwrap();
        assert_eq!(report.files_transferred, 2);
        assert_eq!(std::fs::read(local.join("a/b.txt")).unwrap(), b"site/a//b.txt");
        assert_eq!(std::fs::read(local.join("ok.txt")).unwrap(), b"site/ok.txt");
        assert_eq!(store.calls(), vec!["get:site/a//b.txt", "get:site/ok.txt"]);
    }

    #[tokio::test]
    async fn test_upload_clean_deletes_listed_keys() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "ok.txt", "ok");

        let store = Arc::new(MemoryStore::new(10).with_objects(&["site/a//b.txt", "site/ok.txt"]));
        let engine = SyncEngine::new(
            config(dir.path(), "site", Direction::Upload, true),
            store.clone(),
        );

        let report = engine.run(None).await.unwrap();
        assert_eq!(report.files_cleaned, 1);
        assert_eq!(store.keys(), vec!["site/ok.txt"]);
        assert_eq!(store.calls(), vec!["put:site/ok.txt", "delete:site/a//b.txt"]);
    }

    #[tokio::test]
    async fn test_upload_directory_into_dotted_prefix() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.js", "a");

        let store = Arc::new(
            MemoryStore::new(10).with_objects(&["releases/keep.js", "releases/v1.2/stale.js"]),
        );
        let engine = SyncEngine::new(
            config(dir.path(), "releases/v1.2", Direction::Upload, true),
            store.clone(),
        );

        let report = engine.run(None).await.unwrap();
        assert_eq!(report.files_cleaned, 1);
        assert_eq!(store.keys(), vec!["releases/keep.js", "releases/v1.2/a.js"]);
    }

    #[tokio::test]
    async fn test_fail_fast_in_clean_phase() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "a");

        let store = Arc::new(
            MemoryStore::new(10)
                .fail_at(3)
                .with_objects(&["site/old1", "site/old2", "site/old3"]),
        );
        let engine = SyncEngine::new(
            config(dir.path(), "site", Direction::Upload, true),
            store.clone(),
        );

        let err = engine.run(None).await.unwrap_err();
        match &err {
            SyncError::ObjectStore { op, key, .. } => {
                assert_eq!(*op, "delete");
                assert_eq!(key, "site/old2");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            store.calls(),
            vec!["put:site/a.txt", "delete:site/old1", "delete:site/old2"]
        );
        assert!(store.object("site/old3").is_some());
    }

    #[tokio::test]
    async fn test_undrained_progress_channel_does_not_block() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1.txt", "2.txt", "3.txt"] {
            write(dir.path(), name, name);
        }

        let store = Arc::new(MemoryStore::new(10));
        let engine = SyncEngine::new(
            config(dir.path(), "site", Direction::Upload, false),
            store.clone(),
        );

        let (tx, mut rx) = mpsc::channel(1);
        let report = engine.run(Some(tx)).await.unwrap();
        assert_eq!(report.files_transferred, 3);
        assert_eq!(rx.try_recv().unwrap().progress, TransferProgress { completed: 1, total: 3 });
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("upload".parse::<Direction>().unwrap(), Direction::Upload);
        assert_eq!(" Download ".parse::<Direction>().unwrap(), Direction::Download);
        assert!("sync".parse::<Direction>().is_err());
    }
}
