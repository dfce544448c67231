pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{ExplorerConfig, StoreConfig};
pub use error::{ExplorerError, Result};
pub use models::{BatchReport, Entry, FailureRecord, ListPage, ProgressSnapshot, TransferItem, TransferKind};
pub use services::expander::RecursiveExpander;
pub use services::name_resolver::NameResolver;
pub use services::pager::{Pager, PagerStrategy};
pub use services::preview_cache::PreviewCache;
pub use services::projector::{FolderProjector, ProjectionMode, filter_entries};
pub use services::storage::{ObjectStore, S3ObjectStore};
pub use services::transfer::TransferCoordinator;
pub use services::transfer::ops::{Operation, TransferOps};
pub use services::transfer::progress::{CancellationFlag, ProgressCallback};
