use thiserror::Error;

/// Failure of the underlying storage engine. The operation that returned it
/// did not take effect.
#[derive(Debug, Error)]
pub enum StorageFault {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("canvas payload could not be encoded: {0}")]
    Codec(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageFault>;
