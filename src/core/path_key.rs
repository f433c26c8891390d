//! PathKey 规范化
//!
//! 本地路径和远端对象 key 都会被转换为相对根的 PathKey，
//! 统一使用 `/` 分隔、不带前导分隔符，用于两侧集合比较。

use serde::Serialize;
use std::fmt;

/// 规范化后的相对路径
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PathKey(String);

impl PathKey {
    /// 规范化任意相对路径字符串（幂等）
    pub fn new(raw: &str) -> Self {
        let joined = raw
            .split(is_separator)
            .filter(|seg| !seg.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        Self(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 逐段迭代
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PathKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 根的类型：单个文件 / 对象，或目录 / 前缀
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RootKind {
    File,
    Directory,
}

impl RootKind {
    pub fn is_file(self) -> bool {
        self == RootKind::File
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// 计算 `full_path` 相对 `root` 的 PathKey
///
/// `root_is_file` 为 true 时根就是文件本身，PathKey 只取最后一段。
/// 不做任何 IO。
pub fn normalize(root: &str, full_path: &str, root_is_file: bool) -> PathKey {
    if root_is_file {
        return PathKey::new(last_segment(full_path));
    }

    let root = PathKey::new(root);
    let full = PathKey::new(full_path);

    if root.is_empty() {
        return full;
    }

    match full.as_str().strip_prefix(root.as_str()) {
        // 只在段边界上截断，避免 `sync/2024` 吃掉 `sync/2024-old`
        Some(rest) if rest.is_empty() || rest.starts_with('/') => PathKey::new(rest),
        _ => full,
    }
}

/// 路径的最后一段（忽略末尾分隔符）
pub fn last_segment(path: &str) -> &str {
    path.trim_end_matches(is_separator)
        .rsplit(is_separator)
        .next()
        .unwrap_or("")
}

/// 父目录部分（不含末尾分隔符），没有父目录时为空串
pub fn parent_of(path: &str) -> &str {
    let trimmed = path.trim_end_matches(is_separator);
    match trimmed.rfind(is_separator) {
        Some(idx) => trimmed[..idx].trim_end_matches(is_separator),
        None => "",
    }
}

/// 按名称推断远端根是否是单个对象
///
/// 最后一段包含 `.` 且 `.` 不在首位（`report.json` 是文件，`.github` 不是）；
/// 以 `/` 结尾的前缀总是目录。
pub fn looks_like_file(path: &str) -> bool {
    if path.is_empty() || path.ends_with(is_separator) {
        return false;
    }
    let last = last_segment(path);
    matches!(last.rfind('.'), Some(idx) if idx > 0)
}

/// 把目录根与 PathKey 拼成远端 key
pub fn join_key(dir: &str, key: &PathKey) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        key.as_str().to_string()
    } else {
        format!("{}/{}", dir, key)
    }
}
