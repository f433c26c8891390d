//! 应用配置模块

use crate::logging::LogConfig;
use crate::storage::{StoreOptions, DEFAULT_PAGE_SIZE, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 配置文件（JSON），所有字段都有默认值
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub remote: RemoteOptions,
}

/// 远端连接参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteOptions {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub accelerate: bool,
    #[serde(default = "default_storage_class")]
    pub storage_class: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// 用 HEAD 请求判定远端根是否为单个对象
    #[serde(default)]
    pub probe_remote_root: bool,
    #[serde(default = "default_op_timeout")]
    pub op_timeout_secs: u64,
    #[serde(default = "default_io_timeout")]
    pub io_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

fn default_storage_class() -> String {
    "STANDARD".to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_op_timeout() -> u64 {
    OP_TIMEOUT_SECS
}

fn default_io_timeout() -> u64 {
    IO_TIMEOUT_SECS
}

fn default_max_retries() -> usize {
    3
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            endpoint: None,
            accelerate: false,
            storage_class: default_storage_class(),
            page_size: default_page_size(),
            probe_remote_root: false,
            op_timeout_secs: default_op_timeout(),
            io_timeout_secs: default_io_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl RemoteOptions {
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            endpoint: self.endpoint.clone().filter(|e| !e.is_empty()),
            accelerate: self.accelerate,
            storage_class: self.storage_class.clone(),
            page_size: self.page_size,
            op_timeout_secs: self.op_timeout_secs,
            io_timeout_secs: self.io_timeout_secs,
            max_retries: self.max_retries,
        }
    }
}

impl AppConfig {
    /// 读取配置文件；未指定文件时使用默认配置
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
        Ok(config)
    }
}
