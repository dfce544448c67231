use crate::utils::keys;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// One browsable item under a prefix. Folders are synthetic and always report size 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub key: String,
    pub is_folder: bool,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl Entry {
    pub fn folder(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            is_folder: true,
            size: 0,
            last_modified: None,
        }
    }

    pub fn file(
        name: impl Into<String>,
        key: impl Into<String>,
        size: u64,
        last_modified: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            is_folder: false,
            size,
            last_modified,
        }
    }

    /// `YYYY-MM-DD HH:MM:SS`, empty for folders and unknown timestamps
    pub fn last_modified_display(&self) -> String {
        self.last_modified
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListPage {
    pub entries: Vec<Entry>,
    pub next_marker: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Upload,
    Download,
    Delete,
    Copy,
}

impl std::fmt::Display for TransferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TransferKind::Upload => "upload",
            TransferKind::Download => "download",
            TransferKind::Delete => "delete",
            TransferKind::Copy => "copy",
        };
        f.write_str(label)
    }
}

/// A user-selected item queued for a bulk operation.
///
/// `dest` always names where the item itself lands:
/// - upload: local path -> destination key, or destination folder prefix for a directory
/// - download: object key or folder prefix -> local file path or local directory
/// - delete: object key or folder prefix, `dest` unused
/// - copy: object key or folder prefix -> destination key or folder prefix
///
/// Upload and copy destinations are candidates; collisions are resolved when the batch runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferItem {
    pub source: String,
    pub dest: String,
    pub expected_size: u64,
    pub kind: TransferKind,
    pub is_folder_expansion: bool,
}

impl TransferItem {
    /// Local file into `dest_prefix`, keeping its file name
    pub fn upload(local_path: &Path, dest_prefix: &str, size: u64) -> Self {
        let name = keys::display_name(&local_path.to_string_lossy());
        Self {
            source: local_path.to_string_lossy().to_string(),
            dest: keys::join_prefix_key(dest_prefix, &name),
            expected_size: size,
            kind: TransferKind::Upload,
            is_folder_expansion: false,
        }
    }

    /// Local directory tree into `dest_prefix`, keeping its directory name
    pub fn upload_folder(local_dir: &Path, dest_prefix: &str) -> Self {
        // `.` and `..` name no directory; the resolved path does
        let local_dir = std::fs::canonicalize(local_dir).unwrap_or_else(|_| local_dir.to_path_buf());
        let name = match local_dir.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => keys::display_name(&local_dir.to_string_lossy()),
        };
        Self {
            source: local_dir.to_string_lossy().to_string(),
            dest: keys::normalize_prefix(&keys::join_prefix_key(dest_prefix, &name)),
            expected_size: 0,
            kind: TransferKind::Upload,
            is_folder_expansion: true,
        }
    }

    /// Remote entry into `local_dir`, keeping its name
    pub fn download(entry: &Entry, local_dir: &Path) -> Self {
        let local = local_dir.join(keys::display_name(&entry.key));
        Self {
            source: entry.key.clone(),
            dest: local.to_string_lossy().to_string(),
            expected_size: entry.size,
            kind: TransferKind::Download,
            is_folder_expansion: entry.is_folder,
        }
    }

    pub fn delete(entry: &Entry) -> Self {
        Self {
            source: entry.key.clone(),
            dest: String::new(),
            expected_size: entry.size,
            kind: TransferKind::Delete,
            is_folder_expansion: entry.is_folder,
        }
    }

    /// Server-side copy of `entry` into `dest_prefix`, keeping its name
    pub fn copy(entry: &Entry, dest_prefix: &str) -> Self {
        let target = keys::join_prefix_key(dest_prefix, &keys::display_name(&entry.key));
        Self {
            source: entry.key.clone(),
            dest: if entry.is_folder {
                keys::normalize_prefix(&target)
            } else {
                target
            },
            expected_size: entry.size,
            kind: TransferKind::Copy,
            is_folder_expansion: entry.is_folder,
        }
    }

    /// Label used in failure reports: the last path segment of the source
    pub fn display_name(&self) -> String {
        keys::display_name(&self.source)
    }
}

/// Point-in-time view of a batch's progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub transferred_bytes: u64,
    pub total_bytes: u64,
    pub completed_items: usize,
    pub total_items: usize,
}

impl ProgressSnapshot {
    /// Byte ratio in [0, 1]; falls back to the item ratio for zero-byte batches
    pub fn fraction(&self) -> f64 {
        if self.total_bytes > 0 {
            (self.transferred_bytes as f64 / self.total_bytes as f64).min(1.0)
        } else if self.total_items > 0 {
            (self.completed_items as f64 / self.total_items as f64).min(1.0)
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub item_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub progress: ProgressSnapshot,
    pub succeeded: usize,
    pub failures: Vec<FailureRecord>,
}

impl BatchReport {
    pub fn empty() -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            progress: ProgressSnapshot::default(),
            succeeded: 0,
            failures: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}
