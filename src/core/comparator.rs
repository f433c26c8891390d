use crate::core::path_key::PathKey;
use std::collections::btree_map::{self, Entry};
use std::collections::BTreeMap;

/// 一侧的文件集合
///
/// 由扫描器一次性构造，之后只读。按 PathKey 排序，保证传输顺序与日志稳定。
/// 远端扫描会同时记下每个 PathKey 对应的原始对象 key，规范化可能丢失
/// `//` 或 `\` 之类的信息，读取和删除必须用原始 key。
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    keys: BTreeMap<PathKey, Option<String>>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: PathKey) -> bool {
        self.insert_entry(key, None)
    }

    /// 插入并记录原始 key；同一 PathKey 只保留最先出现的一个
    pub fn insert_with_origin(&mut self, key: PathKey, origin: impl Into<String>) -> bool {
        self.insert_entry(key, Some(origin.into()))
    }

    fn insert_entry(&mut self, key: PathKey, origin: Option<String>) -> bool {
        match self.keys.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(origin);
                true
            }
        }
    }

    pub fn contains(&self, key: &PathKey) -> bool {
        self.keys.contains_key(key)
    }

    /// 扫描时记录的原始 key
    pub fn origin(&self, key: &PathKey) -> Option<&str> {
        self.keys.get(key).and_then(|o| o.as_deref())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathKey> {
        self.keys.keys()
    }

    /// 在 self 中但不在 other 中的 key，保留 self 的原始 key
    pub fn difference(&self, other: &FileSet) -> FileSet {
        Self {
            keys: self
                .keys
                .iter()
                .filter(|(k, _)| !other.contains(k))
                .map(|(k, o)| (k.clone(), o.clone()))
                .collect(),
        }
    }
}

/// 只按 PathKey 比较，原始 key 不参与
impl PartialEq for FileSet {
    fn eq(&self, other: &Self) -> bool {
        self.keys.keys().eq(other.keys.keys())
    }
}

impl Eq for FileSet {}

impl FromIterator<PathKey> for FileSet {
    fn from_iter<I: IntoIterator<Item = PathKey>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(|k| (k, None)).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a FileSet {
    type Item = &'a PathKey;
    type IntoIter = btree_map::Keys<'a, PathKey, Option<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.keys()
    }
}

/// 对比结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationResult {
    /// 需要传输的文件（源侧全部文件）
    pub to_transfer: FileSet,
    /// 需要从目标删除的文件（仅镜像模式）
    pub to_delete: FileSet,
}

/// 对比源和目标两侧的文件集合
///
/// 不比较内容或修改时间：源侧每个文件每次都会重新传输。
/// 镜像模式下删除集合是 `destination - source`，即目标中多余的文件。
pub fn reconcile(source: &FileSet, destination: &FileSet, mirror_delete: bool) -> ReconciliationResult {
    let to_delete = if mirror_delete {
        destination.difference(source)
    } else {
        FileSet::new()
    };

    tracing::debug!(
        "比较完成: 源 {} 个, 目标 {} 个, 待传输 {}, 待删除 {}",
        source.len(),
        destination.len(),
        source.len(),
        to_delete.len()
    );

    ReconciliationResult {
        to_transfer: source.clone(),
        to_delete,
    }
}
