//! 内存对象存储，仅用于测试
//!
//! 分页结果通过 `ListPage::from_wire` 构造，与真实后端的字符串协议一致。

use super::{Bucket, ListPage, ObjectEntry, ObjectMeta, ObjectStore, PutOutcome};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    page_size: usize,
    /// 截断页不返回 NextMarker（与 COS 不带 delimiter 时一致）
    omit_marker: bool,
    /// 第 n 次（从 1 开始）写/读/删调用失败
    fail_at: Option<usize>,
    /// 第 n 次（从 1 开始）列举调用失败
    fail_list_at: Option<usize>,
    calls: Mutex<Vec<String>>,
    list_calls: Mutex<usize>,
}

impl MemoryStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size,
            omit_marker: false,
            fail_at: None,
            fail_list_at: None,
            calls: Mutex::new(Vec::new()),
            list_calls: Mutex::new(0),
        }
    }

    pub fn with_objects(self, keys: &[&str]) -> Self {
        {
            let mut objects = self.objects.lock().unwrap();
            for key in keys {
                objects.insert(key.to_string(), key.as_bytes().to_vec());
            }
        }
        self
    }

    pub fn omit_marker(mut self) -> Self {
        self.omit_marker = true;
        self
    }

    pub fn fail_at(mut self, n: usize) -> Self {
        self.fail_at = Some(n);
        self
    }

    pub fn fail_list_at(mut self, n: usize) -> Self {
        self.fail_list_at = Some(n);
        self
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }

    fn record(&self, op: &'static str, key: &str) -> SyncResult<()> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(format!("{op}:{key}"));
        if self.fail_at == Some(calls.len()) {
            return Err(SyncError::object_store(op, key, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_objects(
        &self,
        _bucket: &Bucket,
        prefix: &str,
        marker: Option<&str>,
    ) -> SyncResult<ListPage> {
        {
            let mut list_calls = self.list_calls.lock().unwrap();
            *list_calls += 1;
            if self.fail_list_at == Some(*list_calls) {
                return Err(SyncError::object_store("list", prefix, "injected failure"));
            }
        }

        let objects = self.objects.lock().unwrap();
        let mut matched: Vec<ObjectEntry> = objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .filter(|(k, _)| marker.map_or(true, |m| k.as_str() > m))
            .map(|(k, v)| ObjectEntry::new(k.clone(), v.len() as u64))
            .take(self.page_size + 1)
            .collect();

        if matched.len() > self.page_size {
            matched.truncate(self.page_size);
            let next = if self.omit_marker {
                None
            } else {
                matched.last().map(|e| e.key.clone())
            };
            Ok(ListPage::from_wire(matched, "true", next))
        } else {
            Ok(ListPage::from_wire(matched, "false", Some(String::new())))
        }
    }

    async fn head_object(&self, _bucket: &Bucket, key: &str) -> SyncResult<Option<ObjectMeta>> {
        Ok(self.objects.lock().unwrap().get(key).map(|v| ObjectMeta {
            size: v.len() as u64,
            is_dir: false,
        }))
    }

    async fn get_object(&self, _bucket: &Bucket, key: &str) -> SyncResult<Vec<u8>> {
        self.record("get", key)?;
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| SyncError::object_store("get", key, "NoSuchKey"))
    }

    async fn put_object(&self, _bucket: &Bucket, key: &str, data: Vec<u8>) -> SyncResult<PutOutcome> {
        self.record("put", key)?;
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(PutOutcome {
            location: Some(format!("https://mem.example/{key}")),
        })
    }

    async fn delete_object(&self, _bucket: &Bucket, key: &str) -> SyncResult<()> {
        self.record("delete", key)?;
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
