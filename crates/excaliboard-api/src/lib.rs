pub mod boards;
pub mod folders;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};

pub use state::{AppState, AppStateInner};

/// REST routes over the folder tree and boards.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/folders", post(folders::create_folder))
        .route(
            "/folders/{folder_id}",
            get(folders::get_listing)
                .patch(folders::rename_folder)
                .delete(folders::delete_folder),
        )
        .route("/folders/{folder_id}/impact", get(folders::delete_impact))
        .route("/boards", post(boards::create_board))
        .route(
            "/boards/{board_id}",
            get(boards::open_board)
                .patch(boards::rename_board)
                .delete(boards::delete_board),
        )
}
