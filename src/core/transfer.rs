//! 传输进度

use crate::core::path_key::PathKey;
use serde::Serialize;
use std::fmt;

/// 执行阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Upload,
    Download,
    Clean,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Upload => write!(f, "uploaded"),
            Phase::Download => write!(f, "downloaded"),
            Phase::Clean => write!(f, "cleaned"),
        }
    }
}

/// 单个阶段的进度，只增不减
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferProgress {
    pub completed: usize,
    pub total: usize,
}

impl TransferProgress {
    pub fn new(total: usize) -> Self {
        Self { completed: 0, total }
    }

    /// 完成一项，返回更新后的快照
    pub fn advance(&mut self) -> TransferProgress {
        if self.completed < self.total {
            self.completed += 1;
        }
        *self
    }

    /// 向下取整的百分比；空阶段视为 100%
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 100;
        }
        (self.completed * 100 / self.total) as u32
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

impl fmt::Display for TransferProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}, {}%]", self.completed, self.total, self.percent())
    }
}

/// 每完成一项发送一次
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub phase: Phase,
    pub key: PathKey,
    /// 本地路径或远端 key
    pub target: String,
    pub progress: TransferProgress,
}
