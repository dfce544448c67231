use crate::error::Result;
use crate::models::Entry;
use crate::services::pager::Pager;
use crate::services::projector::{FolderProjector, ProjectionMode, sort_entries};
use crate::utils::keys::{DELIMITER, normalize_prefix, relative_key};
use std::sync::Arc;

/// Flattens a folder into the keys stored beneath it
pub struct RecursiveExpander {
    pager: Arc<Pager>,
}

impl RecursiveExpander {
    pub fn new(pager: Arc<Pager>) -> Self {
        Self { pager }
    }

    /// Files under `folder_key`, markers excluded. Names are paths relative to the folder.
    pub async fn expand(&self, bucket: &str, folder_key: &str) -> Result<Vec<Entry>> {
        let prefix = normalize_prefix(folder_key);
        let objects = self.pager.list_recursive(bucket, &prefix).await?;
        Ok(FolderProjector::project(
            &prefix,
            &[],
            &objects,
            ProjectionMode::Recursive,
        ))
    }

    /// Every key under `folder_key`, including zero-byte markers and the folder's own marker.
    ///
    /// Markers come back with `is_folder` set. The folder's own marker has an empty name.
    pub async fn expand_all(&self, bucket: &str, folder_key: &str) -> Result<Vec<Entry>> {
        let prefix = normalize_prefix(folder_key);
        let objects = self.pager.list_recursive(bucket, &prefix).await?;
        let mut entries: Vec<Entry> = objects
            .into_iter()
            .map(|object| {
                let name = relative_key(&prefix, &object.key)
                    .unwrap_or(&object.key)
                    .to_string();
                Entry {
                    name,
                    is_folder: object.size == 0 && object.key.ends_with(DELIMITER),
                    key: object.key,
                    size: object.size,
                    last_modified: object.last_modified,
                }
            })
            .collect();
        sort_entries(&mut entries);
        Ok(entries)
    }
}
