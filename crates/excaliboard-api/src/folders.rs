use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use excaliboard_types::api::{
    CreateFolderRequest, DeleteFolderResponse, DeleteImpactResponse, FolderListing, RenameRequest,
};

use crate::state::{AppState, internal, require_name};

/// Contents of a folder; `root` lists the top level.
pub async fn get_listing(
    State(state): State<AppState>,
    Path(folder_id): Path<String>,
) -> Result<Json<FolderListing>, StatusCode> {
    state
        .workspace
        .listing(&folder_id)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn create_folder(
    State(state): State<AppState>,
    Json(req): Json<CreateFolderRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    require_name(&req.name)?;

    let folder = state
        .workspace
        .create_folder(&req.name, &req.parent_id)
        .await
        .map_err(internal)?
        // Only a missing parent can make a validated create a no-op
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok((StatusCode::CREATED, Json(folder)))
}

pub async fn rename_folder(
    State(state): State<AppState>,
    Path(folder_id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<StatusCode, StatusCode> {
    require_name(&req.name)?;

    state
        .workspace
        .rename_folder(&folder_id, &req.name)
        .await
        .map_err(internal)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Pre-check shown before the irreversible cascade.
pub async fn delete_impact(
    State(state): State<AppState>,
    Path(folder_id): Path<String>,
) -> Result<Json<DeleteImpactResponse>, StatusCode> {
    let folder = state
        .workspace
        .folder(&folder_id)
        .await
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let impact = state
        .workspace
        .preview_delete_impact(&folder_id)
        .await
        .map_err(internal)?;

    Ok(Json(DeleteImpactResponse {
        message: impact.warning(&folder.name),
        impact,
    }))
}

pub async fn delete_folder(
    State(state): State<AppState>,
    Path(folder_id): Path<String>,
) -> Result<Json<DeleteFolderResponse>, StatusCode> {
    let deleted = state
        .workspace
        .delete_folder(&folder_id)
        .await
        .map_err(internal)?;

    let response = match deleted {
        Some(removed) => DeleteFolderResponse {
            redirect_to: Some(removed.parent_id),
            folders_removed: removed.folders,
            boards_removed: removed.boards,
        },
        None => DeleteFolderResponse {
            redirect_to: None,
            folders_removed: 0,
            boards_removed: 0,
        },
    };

    Ok(Json(response))
}
