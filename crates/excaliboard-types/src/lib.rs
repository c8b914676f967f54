pub mod api;
pub mod events;
pub mod models;
pub mod store;

pub use models::{Board, DeleteImpact, Folder, InitialCanvas, ROOT_ID, Theme, ViewState};
