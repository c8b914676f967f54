use thiserror::Error;

use excaliboard_db::StorageFault;

/// Failures surfaced to workspace callers. Missing targets and blank names
/// are not errors; they come back as no-op outcomes.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Storage(#[from] StorageFault),

    #[error("storage task did not complete: {0}")]
    Runtime(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;
