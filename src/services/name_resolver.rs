use crate::error::{ExplorerError, Result};
use crate::services::storage::{ListRequest, ObjectStore};
use crate::utils::keys::{DELIMITER, normalize_prefix, split_name};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Finds a free destination by appending `(1)`, `(2)`, ... to a taken name.
///
/// Every name handed out is reserved for the lifetime of the resolver, so workers
/// sharing one resolver never receive the same destination.
pub struct NameResolver {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    max_probes: u32,
    reserved: Mutex<HashSet<String>>,
}

impl NameResolver {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, max_probes: u32) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            max_probes,
            reserved: Mutex::new(HashSet::new()),
        }
    }

    /// Free object key for `candidate`, e.g. `docs/report.txt` -> `docs/report(1).txt`
    pub async fn resolve_key(&self, candidate: &str) -> Result<String> {
        let (base, ext) = split_name(candidate);
        self.resolve(candidate.to_string(), false, |n| format!("{base}({n}){ext}"))
            .await
    }

    /// Free folder prefix for `candidate`, always returned with a trailing delimiter
    pub async fn resolve_folder(&self, candidate: &str) -> Result<String> {
        let base = candidate.trim_end_matches(DELIMITER).to_string();
        self.resolve(normalize_prefix(&base), true, |n| {
            format!("{base}({n}){DELIMITER}")
        })
        .await
    }

    async fn resolve(
        &self,
        candidate: String,
        folder: bool,
        numbered: impl Fn(u32) -> String,
    ) -> Result<String> {
        if self.try_claim(&candidate, folder).await? {
            return Ok(candidate);
        }

        for n in 1..=self.max_probes {
            let next = numbered(n);
            if self.try_claim(&next, folder).await? {
                tracing::debug!("Resolved name collision: '{}' -> '{}'", candidate, next);
                return Ok(next);
            }
        }

        Err(ExplorerError::NameExhausted {
            candidate,
            attempts: self.max_probes,
        })
    }

    async fn try_claim(&self, name: &str, folder: bool) -> Result<bool> {
        if self.is_reserved(name) {
            return Ok(false);
        }
        let taken = if folder {
            self.folder_exists(name).await?
        } else {
            self.store
                .object_exists(&self.bucket, name)
                .await
                .map_err(ExplorerError::Storage)?
        };
        Ok(!taken && self.reserve(name))
    }

    async fn folder_exists(&self, prefix: &str) -> Result<bool> {
        let listing = self
            .store
            .list_page(
                &self.bucket,
                ListRequest {
                    prefix: prefix.to_string(),
                    max_keys: Some(1),
                    ..Default::default()
                },
            )
            .await
            .map_err(ExplorerError::Storage)?;
        Ok(!listing.objects.is_empty() || !listing.common_prefixes.is_empty())
    }

    /// Give a name back, e.g. after the write it was reserved for failed
    pub fn release(&self, name: &str) {
        self.reserved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
    }

    fn is_reserved(&self, name: &str) -> bool {
        self.reserved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(name)
    }

    /// `false` if another caller got there first
    fn reserve(&self, name: &str) -> bool {
        self.reserved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string())
    }
}
