#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("profile document not found: {0}")]
    ProfileNotFound(String),
    #[error("could not determine a data directory for this platform")]
    NoDataDir,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
