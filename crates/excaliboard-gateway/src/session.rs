use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use excaliboard_types::Theme;
use excaliboard_types::events::{GatewayCommand, GatewayEvent};
use excaliboard_workspace::autosave::{self, AutosaveConfig, AutosaveHandle, SaveOutcome};
use excaliboard_workspace::{QueryState, Workspace};

/// The board a connection has open, with its autosave session.
struct OpenBoard {
    handle: AutosaveHandle,
    forwarder: JoinHandle<()>,
}

impl Drop for OpenBoard {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

/// Per-connection state: at most one watched folder and one open board.
///
/// Events for the client are pushed to `outbound`. Dropping the session
/// stops the live listing and abandons any unsaved canvas change.
pub struct Session {
    workspace: Workspace,
    autosave: AutosaveConfig,
    outbound: mpsc::UnboundedSender<GatewayEvent>,
    watch: Option<JoinHandle<()>>,
    board: Option<OpenBoard>,
}

impl Session {
    pub fn new(
        workspace: Workspace,
        autosave: AutosaveConfig,
        outbound: mpsc::UnboundedSender<GatewayEvent>,
    ) -> Self {
        Self {
            workspace,
            autosave,
            outbound,
            watch: None,
            board: None,
        }
    }

    pub async fn handle(&mut self, cmd: GatewayCommand) {
        match cmd {
            GatewayCommand::WatchFolder { folder_id } => self.watch_folder(folder_id),
            GatewayCommand::Unwatch => self.unwatch(),
            GatewayCommand::OpenBoard { board_id, theme } => self.open_board(board_id, theme).await,
            GatewayCommand::BoardMounted { board_id } => self.board_mounted(&board_id),
            GatewayCommand::CanvasChange {
                board_id,
                elements,
                app_state,
            } => self.canvas_change(&board_id, elements, &app_state),
            GatewayCommand::CloseBoard => self.close_board(),
        }
    }

    fn watch_folder(&mut self, folder_id: String) {
        self.unwatch();
        debug!(folder = %folder_id, "Watching folder");

        let mut live = self.workspace.watch_folder(&folder_id);
        let outbound = self.outbound.clone();

        self.watch = Some(tokio::spawn(async move {
            while let Some(state) = live.changed().await {
                let event = match state {
                    QueryState::Pending => continue,
                    QueryState::Ready(Some(listing)) => GatewayEvent::listing(&folder_id, listing),
                    QueryState::Ready(None) => GatewayEvent::ListingFailed {
                        folder_id: folder_id.clone(),
                        message: "Folder not found".into(),
                    },
                    QueryState::Failed(fault) => GatewayEvent::ListingFailed {
                        folder_id: folder_id.clone(),
                        message: fault.to_string(),
                    },
                };
                if outbound.send(event).is_err() {
                    break;
                }
            }
        }));
    }

    fn unwatch(&mut self) {
        if let Some(task) = self.watch.take() {
            task.abort();
        }
    }

    async fn open_board(&mut self, board_id: String, theme: Theme) {
        self.close_board();

        let opened = match self.workspace.open_board(&board_id, theme).await {
            Ok(Some(opened)) => opened,
            Ok(None) => {
                self.send(GatewayEvent::BoardMissing { board_id });
                return;
            }
            Err(e) => {
                warn!(board = %board_id, "Failed to load board: {}", e);
                self.send(GatewayEvent::BoardMissing { board_id });
                return;
            }
        };

        let (handle, outcomes) = autosave::spawn(self.workspace.clone(), &board_id, self.autosave);
        let forwarder = tokio::spawn(forward_outcomes(
            board_id.clone(),
            outcomes,
            self.outbound.clone(),
        ));

        info!(board = %board_id, "Board opened");
        self.send(GatewayEvent::BoardLoaded {
            board_id,
            name: opened.name,
            initial: opened.initial,
        });
        self.board = Some(OpenBoard { handle, forwarder });
    }

    /// The open board whose id is `board_id`, if any.
    fn open(&self, board_id: &str) -> Option<&OpenBoard> {
        self.board
            .as_ref()
            .filter(|board| board.handle.board_id() == board_id)
    }

    /// Autosave stays disarmed until the client confirms the stored content
    /// is on screen, so a blank canvas cannot overwrite it while loading.
    fn board_mounted(&self, board_id: &str) {
        match self.open(board_id) {
            Some(board) => board.handle.mark_loaded(),
            None => debug!(board = %board_id, "Mount for a board that is not open, ignored"),
        }
    }

    fn canvas_change(&self, board_id: &str, elements: Vec<Value>, app_state: &Value) {
        match self.open(board_id) {
            Some(board) => board.handle.on_change(elements, app_state),
            None => debug!(board = %board_id, "Canvas change for a board that is not open, ignored"),
        }
    }

    fn close_board(&mut self) {
        if let Some(board) = self.board.take() {
            debug!(board = %board.handle.board_id(), "Board closed");
        }
    }

    fn send(&self, event: GatewayEvent) {
        let _ = self.outbound.send(event);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.unwatch();
    }
}

async fn forward_outcomes(
    board_id: String,
    mut outcomes: mpsc::UnboundedReceiver<SaveOutcome>,
    outbound: mpsc::UnboundedSender<GatewayEvent>,
) {
    while let Some(outcome) = outcomes.recv().await {
        let event = match outcome {
            SaveOutcome::Saved { updated_at } => GatewayEvent::Saved {
                board_id: board_id.clone(),
                updated_at,
            },
            SaveOutcome::BoardMissing => GatewayEvent::BoardMissing {
                board_id: board_id.clone(),
            },
            SaveOutcome::Failed(message) => GatewayEvent::SaveFailed {
                board_id: board_id.clone(),
                message,
            },
        };
        if outbound.send(event).is_err() {
            break;
        }
    }
}
