use crate::error::{ExplorerError, Result};
use crate::models::{TransferItem, TransferKind};
use crate::services::expander::RecursiveExpander;
use crate::services::name_resolver::NameResolver;
use crate::services::transfer::ops::Operation;
use crate::services::transfer::progress::CancellationFlag;
use crate::utils::keys::{join_prefix_key, local_relative_path, normalize_prefix, normalize_slashes};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// A file-level operation with the bytes it accounts for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedItem {
    pub name: String,
    pub size: u64,
    pub op: Operation,
}

/// Read-only expansion of user-selected items into file-level work.
///
/// Nothing is written while planning. The only side effect is the name reservation
/// made when a folder upload or folder copy picks its destination root.
pub struct Scanner {
    bucket: String,
    resolver: Arc<NameResolver>,
    expander: Arc<RecursiveExpander>,
}

struct LocalEntry {
    relative: PathBuf,
    is_dir: bool,
}

impl Scanner {
    pub fn new(
        bucket: impl Into<String>,
        resolver: Arc<NameResolver>,
        expander: Arc<RecursiveExpander>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            resolver,
            expander,
        }
    }

    /// Plans every item with at most `concurrency` folder scans in flight.
    ///
    /// The first failure aborts the whole plan, wrapped with the item it came from.
    pub async fn plan_batch(
        &self,
        items: &[TransferItem],
        concurrency: usize,
        cancel: &CancellationFlag,
    ) -> Result<Vec<PlannedItem>> {
        let planned: Vec<Vec<PlannedItem>> = stream::iter(items)
            .map(|item| async move {
                if cancel.is_cancelled() {
                    return Err(ExplorerError::Cancelled);
                }
                self.plan(item).await.map_err(|e| ExplorerError::Scan {
                    item: item.display_name(),
                    source: Box::new(e),
                })
            })
            .buffered(concurrency.max(1))
            .try_collect()
            .await?;

        Ok(planned.into_iter().flatten().collect())
    }

    pub async fn plan(&self, item: &TransferItem) -> Result<Vec<PlannedItem>> {
        match (item.kind, item.is_folder_expansion) {
            (TransferKind::Upload, false) => Ok(vec![PlannedItem {
                name: item.display_name(),
                size: item.expected_size,
                op: Operation::Upload {
                    local: PathBuf::from(&item.source),
                    key: item.dest.clone(),
                    pre_resolved: false,
                },
            }]),
            (TransferKind::Upload, true) => self.plan_folder_upload(item).await,
            (TransferKind::Download, false) => Ok(vec![PlannedItem {
                name: item.source.clone(),
                size: item.expected_size,
                op: Operation::Download {
                    key: item.source.clone(),
                    local: PathBuf::from(&item.dest),
                },
            }]),
            (TransferKind::Download, true) => self.plan_folder_download(item).await,
            (TransferKind::Delete, false) => Ok(vec![PlannedItem {
                name: item.source.clone(),
                size: item.expected_size,
                op: Operation::Delete {
                    key: item.source.clone(),
                },
            }]),
            (TransferKind::Delete, true) => {
                let entries = self.expander.expand_all(&self.bucket, &item.source).await?;
                Ok(entries
                    .into_iter()
                    .map(|entry| PlannedItem {
                        name: entry.key.clone(),
                        size: entry.size,
                        op: Operation::Delete { key: entry.key },
                    })
                    .collect())
            }
            (TransferKind::Copy, false) => Ok(vec![PlannedItem {
                name: item.source.clone(),
                size: item.expected_size,
                op: Operation::Copy {
                    source: item.source.clone(),
                    dest: item.dest.clone(),
                    pre_resolved: false,
                },
            }]),
            (TransferKind::Copy, true) => {
                let entries = self.expander.expand_all(&self.bucket, &item.source).await?;
                let new_root = self.resolver.resolve_folder(&item.dest).await?;
                tracing::debug!("Copying folder {} into {}", item.source, new_root);
                Ok(entries
                    .into_iter()
                    .map(|entry| PlannedItem {
                        name: entry.key.clone(),
                        size: entry.size,
                        op: Operation::Copy {
                            dest: join_prefix_key(&new_root, &entry.name),
                            source: entry.key,
                            pre_resolved: true,
                        },
                    })
                    .collect())
            }
        }
    }

    async fn plan_folder_upload(&self, item: &TransferItem) -> Result<Vec<PlannedItem>> {
        let root_dir = PathBuf::from(&item.source);
        if !tokio::fs::metadata(&root_dir).await?.is_dir() {
            return Err(ExplorerError::InvalidPath(format!(
                "{} is not a directory",
                root_dir.display()
            )));
        }

        let walk_root = root_dir.clone();
        let local_entries = tokio::task::spawn_blocking(move || walk_local(&walk_root))
            .await
            .map_err(|e| ExplorerError::Storage(anyhow::anyhow!("Directory walk failed: {e}")))??;

        let new_root = self.resolver.resolve_folder(&item.dest).await?;
        tracing::debug!("Uploading {} into {}", root_dir.display(), new_root);

        let mut planned = Vec::with_capacity(local_entries.len());
        for (entry, size) in local_entries {
            let relative = normalize_slashes(&entry.relative);
            if entry.is_dir {
                let key = normalize_prefix(&join_prefix_key(&new_root, &relative));
                planned.push(PlannedItem {
                    name: key.clone(),
                    size: 0,
                    op: Operation::CreateFolder { key },
                });
            } else {
                planned.push(PlannedItem {
                    name: relative.clone(),
                    size,
                    op: Operation::Upload {
                        local: root_dir.join(&entry.relative),
                        key: join_prefix_key(&new_root, &relative),
                        pre_resolved: true,
                    },
                });
            }
        }
        Ok(planned)
    }

    async fn plan_folder_download(&self, item: &TransferItem) -> Result<Vec<PlannedItem>> {
        let dest_root = PathBuf::from(&item.dest);
        let files = self.expander.expand(&self.bucket, &item.source).await?;

        // an unsafe key fails on its own, its siblings still download
        let planned = files
            .into_iter()
            .map(|entry| {
                let op = match local_relative_path(&entry.name) {
                    Some(relative) => Operation::Download {
                        local: dest_root.join(relative),
                        key: entry.key.clone(),
                    },
                    None => {
                        tracing::warn!("⚠️ Key {} cannot be mapped below {}", entry.key, dest_root.display());
                        Operation::Reject {
                            key: entry.key.clone(),
                        }
                    }
                };
                PlannedItem {
                    name: entry.key,
                    size: entry.size,
                    op,
                }
            })
            .collect();
        Ok(planned)
    }
}

/// Directories (the root included, as an empty relative path) and files with their sizes
fn walk_local(root: &Path) -> Result<Vec<(LocalEntry, u64)>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|_| ExplorerError::InvalidPath(entry.path().display().to_string()))?
            .to_path_buf();
        let file_type = entry.file_type();
        if file_type.is_dir() {
            entries.push((
                LocalEntry {
                    relative,
                    is_dir: true,
                },
                0,
            ));
        } else if file_type.is_file() {
            let size = entry.metadata().map_err(std::io::Error::from)?.len();
            entries.push((
                LocalEntry {
                    relative,
                    is_dir: false,
                },
                size,
            ));
        }
    }
    Ok(entries)
}
