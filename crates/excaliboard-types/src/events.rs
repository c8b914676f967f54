use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::FolderListing;
use crate::models::{Board, Folder, InitialCanvas, Theme};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Fresh contents of the watched folder
    #[serde(rename_all = "camelCase")]
    Listing {
        folder_id: String,
        folder: Option<Folder>,
        folders: Vec<Folder>,
        boards: Vec<Board>,
    },

    /// The watched folder could not be read
    #[serde(rename_all = "camelCase")]
    ListingFailed { folder_id: String, message: String },

    /// Board content is ready to mount; answer with `BoardMounted`
    #[serde(rename_all = "camelCase")]
    BoardLoaded {
        board_id: String,
        name: String,
        initial: InitialCanvas,
    },

    /// The requested board does not exist (or was deleted while open)
    #[serde(rename_all = "camelCase")]
    BoardMissing { board_id: String },

    /// A coalesced canvas snapshot was committed
    #[serde(rename_all = "camelCase")]
    Saved { board_id: String, updated_at: i64 },

    /// An autosave attempt failed; the next change retries
    #[serde(rename_all = "camelCase")]
    SaveFailed { board_id: String, message: String },
}

impl GatewayEvent {
    pub fn listing(folder_id: &str, listing: FolderListing) -> Self {
        Self::Listing {
            folder_id: folder_id.to_string(),
            folder: listing.folder,
            folders: listing.folders,
            boards: listing.boards,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Receive live listings for a folder (`root` for top level).
    /// Replaces any previously watched folder.
    #[serde(rename_all = "camelCase")]
    WatchFolder { folder_id: String },

    /// Stop receiving listings
    Unwatch,

    /// Load a board and start an autosave session for it.
    /// Replaces any previously open board.
    #[serde(rename_all = "camelCase")]
    OpenBoard {
        board_id: String,
        #[serde(default)]
        theme: Theme,
    },

    /// The open board's content is mounted in the drawing surface.
    /// Canvas changes are ignored until this arrives.
    #[serde(rename_all = "camelCase")]
    BoardMounted { board_id: String },

    /// The drawing surface changed. Dropped unless `board_id` is the open,
    /// mounted board.
    #[serde(rename_all = "camelCase")]
    CanvasChange {
        board_id: String,
        elements: Vec<Value>,
        app_state: Value,
    },

    /// Close the open board; a pending save is abandoned
    CloseBoard,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn commands_use_tagged_camel_case_frames() {
        let cmd: GatewayCommand = serde_json::from_value(json!({
            "type": "OpenBoard",
            "data": { "boardId": "b1", "theme": "dark" }
        }))
        .unwrap();
        assert!(matches!(
            cmd,
            GatewayCommand::OpenBoard { ref board_id, theme: Theme::Dark } if board_id == "b1"
        ));

        let cmd: GatewayCommand = serde_json::from_value(json!({
            "type": "BoardMounted",
            "data": { "boardId": "b1" }
        }))
        .unwrap();
        assert!(matches!(cmd, GatewayCommand::BoardMounted { ref board_id } if board_id == "b1"));

        let cmd: GatewayCommand = serde_json::from_value(json!({ "type": "CloseBoard" })).unwrap();
        assert!(matches!(cmd, GatewayCommand::CloseBoard));
    }

    #[test]
    fn saved_event_shape() {
        let event = GatewayEvent::Saved {
            board_id: "b1".into(),
            updated_at: 42,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "Saved", "data": { "boardId": "b1", "updatedAt": 42 } })
        );
    }
}
