use serde::{Deserialize, Serialize};

use crate::models::{Board, DeleteImpact, Folder, InitialCanvas, ROOT_ID};

fn root() -> String {
    ROOT_ID.to_string()
}

// -- Folders --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateFolderRequest {
    pub name: String,
    #[serde(default = "root")]
    pub parent_id: String,
}

/// Contents of one folder as shown on the dashboard.
/// `folder` is `None` when listing the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderListing {
    pub folder: Option<Folder>,
    pub folders: Vec<Folder>,
    pub boards: Vec<Board>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteImpactResponse {
    #[serde(flatten)]
    pub impact: DeleteImpact,
    pub message: String,
}

/// Where the caller should navigate after deleting a folder it may be
/// viewing. `None` when the folder was already gone.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFolderResponse {
    pub redirect_to: Option<String>,
    pub folders_removed: u64,
    pub boards_removed: u64,
}

// -- Boards --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateBoardRequest {
    pub name: String,
    #[serde(default = "root")]
    pub folder_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenBoardResponse {
    pub id: String,
    pub name: String,
    pub initial: InitialCanvas,
}

// -- Shared --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameRequest {
    pub name: String,
}
