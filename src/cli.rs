//! 命令行参数，兼容 GitHub Action 的 `INPUT_*` 环境变量

use crate::config::AppConfig;
use crate::core::{Direction, RemoteRootMode, SyncConfig};
use crate::storage::Bucket;
use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "cos-sync")]
#[command(about = "Upload a local tree to a COS prefix, or download a prefix to a local tree")]
pub struct Cli {
    /// upload 或 download
    #[arg(long = "type", env = "INPUT_TYPE", default_value = "upload")]
    pub direction: Direction,

    #[arg(long, env = "INPUT_SECRET_ID", hide_env_values = true)]
    pub secret_id: Option<String>,

    #[arg(long, env = "INPUT_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    #[arg(long = "bucket", env = "INPUT_COS_BUCKET")]
    pub bucket: String,

    #[arg(long = "region", env = "INPUT_COS_REGION")]
    pub region: String,

    /// 相对当前目录解析
    #[arg(long, env = "INPUT_LOCAL_PATH", default_value = ".")]
    pub local_path: PathBuf,

    #[arg(long, env = "INPUT_REMOTE_PATH", default_value = "")]
    pub remote_path: String,

    /// 删除目标中源侧不存在的文件
    #[arg(long, env = "INPUT_CLEAN", num_args = 0..=1, default_value = "false", default_missing_value = "true", value_parser = parse_flag)]
    pub clean: bool,

    #[arg(long, env = "INPUT_ACCELERATE", num_args = 0..=1, default_value = "false", default_missing_value = "true", value_parser = parse_flag)]
    pub accelerate: bool,

    #[arg(long, env = "INPUT_ENDPOINT")]
    pub endpoint: Option<String>,

    /// 用 HEAD 请求判定远端根，而不是看扩展名
    #[arg(long)]
    pub probe_remote_root: bool,

    /// 用本地目录模拟存储桶
    #[arg(long)]
    pub emulate_root: Option<PathBuf>,

    /// JSON 配置文件
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, env = "COS_SYNC_LOG")]
    pub log_level: Option<String>,
}

/// Action 输入只把字面量 `true` 当作开启，区分大小写，不去空白
fn parse_flag(raw: &str) -> Result<bool, String> {
    Ok(raw == "true")
}

/// 连接凭证，只交给存储客户端
#[derive(Clone)]
pub struct Credentials {
    pub secret_id: String,
    pub secret_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"***")
            .finish()
    }
}

/// 解析后的单次运行参数
#[derive(Debug)]
pub struct RunConfig {
    pub sync: SyncConfig,
    pub app: AppConfig,
    pub credentials: Option<Credentials>,
    pub emulate_root: Option<PathBuf>,
}

impl Cli {
    /// 合并配置文件与命令行参数，命令行优先
    pub fn into_run_config(self, mut app: AppConfig, cwd: &Path) -> anyhow::Result<RunConfig> {
        if self.accelerate {
            app.remote.accelerate = true;
        }
        if let Some(endpoint) = self.endpoint.filter(|e| !e.is_empty()) {
            app.remote.endpoint = Some(endpoint);
        }
        if self.probe_remote_root {
            app.remote.probe_remote_root = true;
        }
        if let Some(level) = self.log_level {
            app.log.level = level;
        }

        let credentials = match (self.secret_id, self.secret_key) {
            (Some(id), Some(key)) if !id.is_empty() && !key.is_empty() => Some(Credentials {
                secret_id: id,
                secret_key: key,
            }),
            _ if self.emulate_root.is_some() => None,
            _ => anyhow::bail!("secret_id and secret_key are required"),
        };

        if self.bucket.is_empty() || self.region.is_empty() {
            anyhow::bail!("cos_bucket and cos_region are required");
        }

        let remote_root_mode = if app.remote.probe_remote_root {
            RemoteRootMode::Probe
        } else {
            RemoteRootMode::Guess
        };

        let sync = SyncConfig {
            local_root: cwd.join(&self.local_path),
            remote_root: self.remote_path,
            bucket: Bucket::new(self.bucket, self.region),
            direction: self.direction,
            mirror_delete: self.clean,
            remote_root_mode,
        };

        Ok(RunConfig {
            sync,
            app,
            credentials,
            emulate_root: self.emulate_root,
        })
    }
}
