#![allow(dead_code)]

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use s3_explorer::services::storage::{ListRequest, ObjectStore, RawListing, RawObject};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub type DeleteHook = Arc<dyn Fn(&str) + Send + Sync>;

/// In-memory store with S3 listing semantics and per-key failure injection
pub struct MemoryStore {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    buckets: Mutex<BTreeSet<String>>,
    failing_puts: Mutex<HashSet<String>>,
    failing_deletes: Mutex<HashSet<String>>,
    failing_copies: Mutex<HashSet<String>>,
    failing_list_prefix: Mutex<Option<String>>,
    delete_hook: Mutex<Option<DeleteHook>>,
    always_exists: AtomicBool,
    pub exists_probes: AtomicUsize,
    pub list_calls: AtomicUsize,
}

enum Listed {
    Object(String),
    Prefix(String),
}

impl Listed {
    fn name(&self) -> &str {
        match self {
            Listed::Object(k) | Listed::Prefix(k) => k,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(BTreeMap::new()),
            buckets: Mutex::new(BTreeSet::new()),
            failing_puts: Mutex::new(HashSet::new()),
            failing_deletes: Mutex::new(HashSet::new()),
            failing_copies: Mutex::new(HashSet::new()),
            failing_list_prefix: Mutex::new(None),
            delete_hook: Mutex::new(None),
            always_exists: AtomicBool::new(false),
            exists_probes: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_files(keys: &[(&str, &str)]) -> Self {
        let store = Self::new();
        for (key, data) in keys {
            store.insert(key, data.as_bytes());
        }
        store
    }

    pub fn insert(&self, key: &str, data: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.files.lock().unwrap().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    pub fn fail_put(&self, key: &str) {
        self.failing_puts.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_delete(&self, key: &str) {
        self.failing_deletes.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_copy(&self, source_key: &str) {
        self.failing_copies
            .lock()
            .unwrap()
            .insert(source_key.to_string());
    }

    pub fn fail_listing_under(&self, prefix: &str) {
        *self.failing_list_prefix.lock().unwrap() = Some(prefix.to_string());
    }

    /// Runs before every delete, outside the store's locks
    pub fn on_delete(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        *self.delete_hook.lock().unwrap() = Some(Arc::new(hook));
    }

    pub fn set_always_exists(&self, value: bool) {
        self.always_exists.store(value, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(&self, _bucket: &str, request: ListRequest) -> anyhow::Result<RawListing> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failing) = self.failing_list_prefix.lock().unwrap().as_deref() {
            if request.prefix.starts_with(failing) {
                anyhow::bail!("injected listing failure under {}", request.prefix);
            }
        }

        let files = self.files.lock().unwrap();
        let mut listed: Vec<Listed> = Vec::new();
        let mut seen_prefixes = HashSet::new();
        for key in files.keys().filter(|k| k.starts_with(&request.prefix)) {
            let rest = &key[request.prefix.len()..];
            let folded = request
                .delimiter
                .as_deref()
                .and_then(|d| rest.find(d).map(|idx| idx + d.len()));
            match folded {
                Some(end) => {
                    let common = format!("{}{}", request.prefix, &rest[..end]);
                    if seen_prefixes.insert(common.clone()) {
                        listed.push(Listed::Prefix(common));
                    }
                }
                None => listed.push(Listed::Object(key.clone())),
            }
        }

        let start = match &request.continuation_token {
            Some(token) => listed
                .iter()
                .position(|l| l.name() > token.as_str())
                .unwrap_or(listed.len()),
            None => 0,
        };
        let max_keys = request.max_keys.unwrap_or(1000).max(1) as usize;
        let end = (start + max_keys).min(listed.len());

        let mut page = RawListing::default();
        for item in &listed[start..end] {
            match item {
                Listed::Object(key) => page.objects.push(RawObject {
                    key: key.clone(),
                    size: files[key].len() as u64,
                    last_modified: None,
                }),
                Listed::Prefix(prefix) => page.common_prefixes.push(prefix.clone()),
            }
        }
        if end < listed.len() {
            page.next_token = Some(listed[end - 1].name().to_string());
        }
        Ok(page)
    }

    async fn get_object(&self, _bucket: &str, key: &str) -> anyhow::Result<ByteStream> {
        match self.get(key) {
            Some(data) => Ok(ByteStream::from(data)),
            None => anyhow::bail!("NoSuchKey: {}", key),
        }
    }

    async fn put_object(&self, _bucket: &str, key: &str, data: Vec<u8>) -> anyhow::Result<()> {
        if self.failing_puts.lock().unwrap().contains(key) {
            anyhow::bail!("injected network error writing {}", key);
        }
        self.files.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn delete_object(&self, _bucket: &str, key: &str) -> anyhow::Result<()> {
        let hook = self.delete_hook.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(key);
        }
        if self.failing_deletes.lock().unwrap().contains(key) {
            anyhow::bail!("injected failure deleting {}", key);
        }
        self.files.lock().unwrap().remove(key);
        Ok(())
    }

    async fn copy_object(
        &self,
        _bucket: &str,
        source_key: &str,
        dest_key: &str,
    ) -> anyhow::Result<()> {
        if self.failing_copies.lock().unwrap().contains(source_key) {
            anyhow::bail!("injected failure copying {}", source_key);
        }
        let mut files = self.files.lock().unwrap();
        let data = files
            .get(source_key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("NoSuchKey: {}", source_key))?;
        files.insert(dest_key.to_string(), data);
        Ok(())
    }

    async fn object_exists(&self, _bucket: &str, key: &str) -> anyhow::Result<bool> {
        self.exists_probes.fetch_add(1, Ordering::SeqCst);
        if self.always_exists.load(Ordering::SeqCst) {
            return Ok(true);
        }
        // the real store answers 400 for these, which the S3 adapter maps to "absent"
        if key.contains("??") {
            return Ok(false);
        }
        Ok(self.contains(key))
    }

    async fn create_folder_marker(&self, bucket: &str, key: &str) -> anyhow::Result<()> {
        self.put_object(bucket, key, Vec::new()).await
    }

    async fn list_buckets(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.buckets.lock().unwrap().iter().cloned().collect())
    }

    async fn create_bucket(&self, bucket: &str) -> anyhow::Result<()> {
        self.buckets.lock().unwrap().insert(bucket.to_string());
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> anyhow::Result<()> {
        self.buckets.lock().unwrap().remove(bucket);
        Ok(())
    }
}
