use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use excaliboard_types::Theme;
use excaliboard_types::api::{CreateBoardRequest, OpenBoardResponse, RenameRequest};

use crate::state::{AppState, internal, require_name};

#[derive(Debug, Deserialize)]
pub struct OpenBoardQuery {
    #[serde(default)]
    pub theme: Theme,
}

pub async fn create_board(
    State(state): State<AppState>,
    Json(req): Json<CreateBoardRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    require_name(&req.name)?;

    let board = state
        .workspace
        .create_board(&req.name, &req.folder_id)
        .await
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok((StatusCode::CREATED, Json(board)))
}

/// Board content and view state ready to mount in the drawing surface.
pub async fn open_board(
    State(state): State<AppState>,
    Path(board_id): Path<String>,
    Query(query): Query<OpenBoardQuery>,
) -> Result<Json<OpenBoardResponse>, StatusCode> {
    state
        .workspace
        .open_board(&board_id, query.theme)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn rename_board(
    State(state): State<AppState>,
    Path(board_id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<StatusCode, StatusCode> {
    require_name(&req.name)?;

    state
        .workspace
        .rename_board(&board_id, &req.name)
        .await
        .map_err(internal)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Deleting a board that is already gone also succeeds.
pub async fn delete_board(
    State(state): State<AppState>,
    Path(board_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    state
        .workspace
        .delete_board(&board_id)
        .await
        .map_err(internal)?;

    Ok(StatusCode::NO_CONTENT)
}
