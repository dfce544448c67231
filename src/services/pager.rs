use crate::error::{ExplorerError, Result};
use crate::models::{Entry, ListPage};
use crate::services::projector::{FolderProjector, ProjectionMode};
use crate::services::storage::{ListRequest, ObjectStore, RawObject};
use crate::utils::keys::{DELIMITER, normalize_prefix};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

const PAGE_MARKER_PREFIX: &str = "page_";

/// Page size used while draining a prefix to exhaustion
const ENUMERATION_BATCH: i32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PagerStrategy {
    /// The store's continuation tokens are handed out as opaque markers
    Native,
    /// Enumerate the whole prefix, sort once, slice with `page_<n>` markers
    FullThenSlice,
}

impl FromStr for PagerStrategy {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "native" => Ok(PagerStrategy::Native),
            "full" | "full_then_slice" | "slice" => Ok(PagerStrategy::FullThenSlice),
            other => Err(ExplorerError::Config(format!("Unknown pager strategy: {other}"))),
        }
    }
}

pub fn page_marker(page: usize) -> String {
    format!("{PAGE_MARKER_PREFIX}{page}")
}

/// `page_<n>` with n >= 1
pub fn parse_page_marker(marker: &str) -> Result<usize> {
    marker
        .strip_prefix(PAGE_MARKER_PREFIX)
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|n| *n >= 1)
        .ok_or_else(|| ExplorerError::InvalidMarker(marker.to_string()))
}

/// Window `page` (1-based) of `entries`, with the marker of the following page if any
pub fn slice_page(entries: &[Entry], page: usize, page_size: usize) -> ListPage {
    let start = (page - 1).saturating_mul(page_size);
    if start >= entries.len() {
        return ListPage::default();
    }
    let end = start.saturating_add(page_size).min(entries.len());
    ListPage {
        entries: entries[start..end].to_vec(),
        next_marker: (end < entries.len()).then(|| page_marker(page + 1)),
    }
}

/// Turns the store's page primitive into a paged view of one folder level
pub struct Pager {
    store: Arc<dyn ObjectStore>,
    strategy: PagerStrategy,
}

impl Pager {
    pub fn new(store: Arc<dyn ObjectStore>, strategy: PagerStrategy) -> Self {
        Self { store, strategy }
    }

    pub async fn fetch_page(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&str>,
        page_size: usize,
    ) -> Result<ListPage> {
        let prefix = normalize_prefix(prefix);
        let prefix = prefix.as_str();
        if page_size == 0 {
            return Ok(ListPage {
                entries: self.list_all(bucket, prefix).await?,
                next_marker: None,
            });
        }

        match self.strategy {
            PagerStrategy::Native => self.fetch_native(bucket, prefix, marker, page_size).await,
            PagerStrategy::FullThenSlice => {
                let page = match marker {
                    Some(m) => parse_page_marker(m)?,
                    None => 1,
                };
                let entries = self.list_all(bucket, prefix).await?;
                Ok(slice_page(&entries, page, page_size))
            }
        }
    }

    async fn fetch_native(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&str>,
        page_size: usize,
    ) -> Result<ListPage> {
        let listing = self
            .store
            .list_page(
                bucket,
                ListRequest {
                    prefix: prefix.to_string(),
                    delimiter: Some(DELIMITER.to_string()),
                    continuation_token: marker.map(str::to_string),
                    max_keys: Some(i32::try_from(page_size).unwrap_or(i32::MAX)),
                },
            )
            .await
            .map_err(ExplorerError::Listing)?;

        Ok(ListPage {
            entries: FolderProjector::project(
                prefix,
                &listing.common_prefixes,
                &listing.objects,
                ProjectionMode::Delimited,
            ),
            next_marker: listing.next_token,
        })
    }

    /// Immediate children of `prefix`, every page drained in marker order, sorted once
    pub async fn list_all(&self, bucket: &str, prefix: &str) -> Result<Vec<Entry>> {
        let prefix = normalize_prefix(prefix);
        let (common_prefixes, objects) = self
            .drain(bucket, &prefix, Some(DELIMITER.to_string()))
            .await?;
        Ok(FolderProjector::project(
            &prefix,
            &common_prefixes,
            &objects,
            ProjectionMode::Delimited,
        ))
    }

    /// Every object below `prefix`, no delimiter, including zero-byte markers
    pub async fn list_recursive(&self, bucket: &str, prefix: &str) -> Result<Vec<RawObject>> {
        let (_, objects) = self.drain(bucket, prefix, None).await?;
        Ok(objects)
    }

    async fn drain(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<String>,
    ) -> Result<(Vec<String>, Vec<RawObject>)> {
        let mut common_prefixes = Vec::new();
        let mut objects = Vec::new();
        let mut continuation_token = None;

        loop {
            let listing = self
                .store
                .list_page(
                    bucket,
                    ListRequest {
                        prefix: prefix.to_string(),
                        delimiter: delimiter.clone(),
                        continuation_token,
                        max_keys: Some(ENUMERATION_BATCH),
                    },
                )
                .await
                .map_err(ExplorerError::Listing)?;

            common_prefixes.extend(listing.common_prefixes);
            objects.extend(listing.objects);

            match listing.next_token {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        tracing::debug!(
            "Enumerated {} objects and {} prefixes under '{}'",
            objects.len(),
            common_prefixes.len(),
            prefix
        );
        Ok((common_prefixes, objects))
    }
}
