use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("Listing failed: {0}")]
    Listing(#[source] anyhow::Error),

    #[error("Storage error: {0}")]
    Storage(#[source] anyhow::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid page marker: {0}")]
    InvalidMarker(String),

    #[error("No free name for '{candidate}' after {attempts} attempts")]
    NameExhausted { candidate: String, attempts: u32 },

    #[error("Folder '{prefix}' only partially deleted ({} keys failed)", failed_keys.len())]
    FolderDeleteIncomplete {
        prefix: String,
        failed_keys: Vec<String>,
    },

    #[error("Folder '{prefix}' only partially copied ({} keys failed)", failed_keys.len())]
    FolderCopyIncomplete {
        prefix: String,
        failed_keys: Vec<String>,
    },

    #[error("Scanning '{item}' failed: {source}")]
    Scan {
        item: String,
        #[source]
        source: Box<ExplorerError>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl ExplorerError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            ExplorerError::Cancelled => true,
            ExplorerError::Scan { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

pub type Result<T, E = ExplorerError> = std::result::Result<T, E>;
