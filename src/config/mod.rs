use crate::error::ExplorerError;
use crate::services::pager::PagerStrategy;
use std::env;

/// Connection settings for an S3-compatible endpoint
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Custom endpoint (MinIO, Ceph, ...). `None` uses the AWS default resolver.
    pub endpoint: Option<String>,

    pub access_key: String,
    pub secret_key: String,

    /// Signing region (default: "us-east-1")
    pub region: String,

    /// Path-style addressing, required by most S3-compatible stores (default: true)
    pub force_path_style: bool,
}

impl StoreConfig {
    /// Load connection settings from environment variables
    pub fn from_env() -> Result<Self, ExplorerError> {
        let access_key = env::var("S3_ACCESS_KEY")
            .map_err(|_| ExplorerError::Config("S3_ACCESS_KEY must be set".to_string()))?;
        let secret_key = env::var("S3_SECRET_KEY")
            .map_err(|_| ExplorerError::Config("S3_SECRET_KEY must be set".to_string()))?;

        Ok(Self {
            endpoint: env::var("S3_ENDPOINT").ok().filter(|v| !v.trim().is_empty()),
            access_key,
            secret_key,
            region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            force_path_style: env::var("S3_FORCE_PATH_STYLE")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),
        })
    }
}

/// Tuning for listing and bulk transfers
#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    /// Workers draining the transfer queue (default: 10)
    pub transfer_concurrency: usize,

    /// Workers expanding folders before a batch starts (default: 5)
    pub scan_concurrency: usize,

    /// Entries per listing page (default: 100, 0 = everything on one page)
    pub page_size: usize,

    /// Listing strategy (default: full-then-slice)
    pub pager_strategy: PagerStrategy,

    /// Upper bound on collision probes per name (default: 1000)
    pub max_name_probes: u32,

    /// Entries kept by the preview cache (default: 256)
    pub preview_cache_capacity: usize,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            transfer_concurrency: 10,
            scan_concurrency: 5,
            page_size: 100,
            pager_strategy: PagerStrategy::FullThenSlice,
            max_name_probes: 1000,
            preview_cache_capacity: 256,
        }
    }
}

impl ExplorerConfig {
    /// Load tuning from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            transfer_concurrency: env::var("TRANSFER_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.transfer_concurrency)
                .max(1),

            scan_concurrency: env::var("SCAN_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.scan_concurrency)
                .max(1),

            page_size: env::var("PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.page_size),

            pager_strategy: env::var("PAGER_STRATEGY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.pager_strategy),

            max_name_probes: env::var("MAX_NAME_PROBES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_name_probes),

            preview_cache_capacity: env::var("PREVIEW_CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.preview_cache_capacity),
        }
    }

    /// Small pools and pages, handy against a local MinIO
    pub fn development() -> Self {
        Self {
            transfer_concurrency: 2,
            scan_concurrency: 1,
            page_size: 20,
            pager_strategy: PagerStrategy::FullThenSlice,
            max_name_probes: 100,
            preview_cache_capacity: 32,
        }
    }
}
