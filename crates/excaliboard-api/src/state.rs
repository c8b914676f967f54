use std::sync::Arc;

use axum::http::StatusCode;
use tracing::error;

use excaliboard_workspace::{Workspace, WorkspaceError};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub workspace: Workspace,
}

/// Storage faults reach the REST caller as a 500; retrying is up to them.
pub(crate) fn internal(e: WorkspaceError) -> StatusCode {
    error!("Workspace operation failed: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Callers validate names before asking the workspace to act.
pub(crate) fn require_name(name: &str) -> Result<(), StatusCode> {
    if name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(())
}
