use crate::error::{ExplorerError, Result};
use crate::services::expander::RecursiveExpander;
use crate::services::name_resolver::NameResolver;
use crate::services::storage::ObjectStore;
use crate::utils::keys::{join_prefix_key, normalize_prefix};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Parallel deletes/copies issued by the direct (non-batch) folder operations
const FOLDER_FANOUT: usize = 10;

/// One file-level unit of work, produced by the scan phase or built directly
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Upload {
        local: PathBuf,
        key: String,
        /// Destination already fixed by a resolved parent folder
        pre_resolved: bool,
    },
    CreateFolder {
        key: String,
    },
    Download {
        key: String,
        local: PathBuf,
    },
    Delete {
        key: String,
    },
    Copy {
        source: String,
        dest: String,
        pre_resolved: bool,
    },
    /// Planned only to be reported: the key has no safe local destination
    Reject {
        key: String,
    },
}

/// Single-item operations against one bucket
pub struct TransferOps {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    resolver: Arc<NameResolver>,
    expander: Arc<RecursiveExpander>,
}

impl TransferOps {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        resolver: Arc<NameResolver>,
        expander: Arc<RecursiveExpander>,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            resolver,
            expander,
        }
    }

    pub async fn execute(&self, op: &Operation) -> Result<()> {
        match op {
            Operation::Upload {
                local,
                key,
                pre_resolved,
            } => self.upload_file(local, key, *pre_resolved).await.map(|_| ()),
            Operation::CreateFolder { key } => self.put_marker(key).await,
            Operation::Download { key, local } => {
                self.download_object(key, local).await.map(|_| ())
            }
            Operation::Delete { key } => self.delete_object(key).await,
            Operation::Copy {
                source,
                dest,
                pre_resolved,
            } => self.copy_object(source, dest, *pre_resolved).await.map(|_| ()),
            Operation::Reject { key } => Err(ExplorerError::InvalidPath(key.clone())),
        }
    }

    /// Reads the whole file and stores it; returns the key actually written.
    ///
    /// The content length sent is the number of bytes read, not an earlier stat.
    pub async fn upload_file(&self, local: &Path, key: &str, pre_resolved: bool) -> Result<String> {
        let data = tokio::fs::read(local).await?;

        let final_key = if pre_resolved {
            key.to_string()
        } else {
            self.resolver.resolve_key(key).await?
        };

        tracing::debug!(
            "Uploading {} ({} bytes) -> {}",
            local.display(),
            data.len(),
            final_key
        );
        if let Err(e) = self.store.put_object(&self.bucket, &final_key, data).await {
            if !pre_resolved {
                self.resolver.release(&final_key);
            }
            return Err(ExplorerError::Storage(e));
        }
        Ok(final_key)
    }

    /// Streams `key` into `local`, creating parent directories. Returns bytes written.
    ///
    /// A partially written file is removed when the copy fails.
    pub async fn download_object(&self, key: &str, local: &Path) -> Result<u64> {
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let stream = self
            .store
            .get_object(&self.bucket, key)
            .await
            .map_err(ExplorerError::Storage)?;

        let file = tokio::fs::File::create(local).await?;
        let mut writer = BufWriter::new(file);
        let mut reader = stream.into_async_read();

        let copied = match tokio::io::copy(&mut reader, &mut writer).await {
            Ok(n) => writer.flush().await.map(|_| n),
            Err(e) => Err(e),
        };

        match copied {
            Ok(n) => {
                tracing::debug!("Downloaded {} -> {} ({} bytes)", key, local.display(), n);
                Ok(n)
            }
            Err(e) => {
                drop(writer);
                let _ = tokio::fs::remove_file(local).await;
                Err(ExplorerError::Io(e))
            }
        }
    }

    pub async fn delete_object(&self, key: &str) -> Result<()> {
        self.store
            .delete_object(&self.bucket, key)
            .await
            .map_err(ExplorerError::Storage)?;
        tracing::debug!("Deleted {}", key);
        Ok(())
    }

    /// Deletes every key under `prefix`, the folder's own marker included.
    ///
    /// Best effort: all keys are attempted, and any failures are reported together.
    pub async fn delete_folder(&self, prefix: &str) -> Result<usize> {
        let prefix = normalize_prefix(prefix);
        let entries = self.expander.expand_all(&self.bucket, &prefix).await?;
        let total = entries.len();

        let failed_keys: Vec<String> = stream::iter(entries)
            .map(|entry| async move {
                match self.store.delete_object(&self.bucket, &entry.key).await {
                    Ok(()) => None,
                    Err(e) => {
                        tracing::warn!("Failed to delete {}: {}", entry.key, e);
                        Some(entry.key)
                    }
                }
            })
            .buffer_unordered(FOLDER_FANOUT)
            .filter_map(|failed| async move { failed })
            .collect()
            .await;

        if failed_keys.is_empty() {
            tracing::info!("Deleted folder {} ({} keys)", prefix, total);
            Ok(total)
        } else {
            Err(ExplorerError::FolderDeleteIncomplete {
                prefix,
                failed_keys,
            })
        }
    }

    /// Same-bucket server-side copy; the destination is resolved unless already fixed.
    pub async fn copy_object(&self, source: &str, dest: &str, pre_resolved: bool) -> Result<String> {
        let final_key = if pre_resolved {
            dest.to_string()
        } else {
            self.resolver.resolve_key(dest).await?
        };

        if let Err(e) = self
            .store
            .copy_object(&self.bucket, source, &final_key)
            .await
        {
            if !pre_resolved {
                self.resolver.release(&final_key);
            }
            return Err(ExplorerError::Storage(e));
        }
        tracing::debug!("Copied {} -> {}", source, final_key);
        Ok(final_key)
    }

    /// Copies everything under `source_prefix` below a freshly resolved `dest_prefix`.
    ///
    /// Returns the folder prefix actually used.
    pub async fn copy_folder(&self, source_prefix: &str, dest_prefix: &str) -> Result<String> {
        let source_prefix = normalize_prefix(source_prefix);
        let new_root = self.resolver.resolve_folder(dest_prefix).await?;
        let entries = self.expander.expand_all(&self.bucket, &source_prefix).await?;

        let new_root_ref = new_root.as_str();
        let failed_keys: Vec<String> = stream::iter(entries)
            .map(|entry| async move {
                let target = join_prefix_key(new_root_ref, &entry.name);
                match self.store.copy_object(&self.bucket, &entry.key, &target).await {
                    Ok(()) => None,
                    Err(e) => {
                        tracing::warn!("Failed to copy {}: {}", entry.key, e);
                        Some(entry.key)
                    }
                }
            })
            .buffer_unordered(FOLDER_FANOUT)
            .filter_map(|failed| async move { failed })
            .collect()
            .await;

        if failed_keys.is_empty() {
            Ok(new_root)
        } else {
            Err(ExplorerError::FolderCopyIncomplete {
                prefix: source_prefix,
                failed_keys,
            })
        }
    }

    /// New empty folder `name` under `parent`; returns the prefix created
    pub async fn create_folder(&self, parent: &str, name: &str) -> Result<String> {
        let name = name.trim().trim_matches('/');
        if name.is_empty() {
            return Err(ExplorerError::InvalidPath(
                "folder name cannot be empty".to_string(),
            ));
        }
        let key = self
            .resolver
            .resolve_folder(&join_prefix_key(parent, name))
            .await?;
        self.put_marker(&key).await?;
        tracing::info!("Created folder {}", key);
        Ok(key)
    }

    async fn put_marker(&self, key: &str) -> Result<()> {
        self.store
            .create_folder_marker(&self.bucket, &normalize_prefix(key))
            .await
            .map_err(ExplorerError::Storage)
    }
}
