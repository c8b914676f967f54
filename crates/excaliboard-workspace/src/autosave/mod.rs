//! Debounced persistence of canvas changes for one open board.
//!
//! The drawing surface reports every change; the driver commits the newest
//! snapshot once no further change has arrived for the configured interval.

mod machine;

pub use machine::{CanvasSnapshot, ChangeOutcome, Debouncer, SaveState};

use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use excaliboard_types::ViewState;

use crate::tree::Workspace;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy)]
pub struct AutosaveConfig {
    /// Quiet period after the last change before it is committed.
    pub interval: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// Result of one commit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { updated_at: i64 },
    /// The board was deleted while open.
    BoardMissing,
    /// The write failed. Nothing is retried; the next change re-arms.
    Failed(String),
}

enum Command {
    Loaded,
    Change(CanvasSnapshot),
}

/// Sending side of an autosave session, owned by the view showing the
/// board. Dropping it tears the session down: a pending change that has
/// not been committed yet is discarded.
pub struct AutosaveHandle {
    board_id: String,
    tx: mpsc::UnboundedSender<Command>,
}

impl AutosaveHandle {
    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    /// The board's stored content has been loaded into the drawing
    /// surface. Changes reported before this are ignored.
    pub fn mark_loaded(&self) {
        let _ = self.tx.send(Command::Loaded);
    }

    /// Report a canvas change. `app_state` is the engine's full view state;
    /// only the persisted fields are kept.
    pub fn on_change(&self, elements: Vec<Value>, app_state: &Value) {
        let snapshot = CanvasSnapshot {
            elements,
            view: ViewState::from_engine(app_state),
        };
        let _ = self.tx.send(Command::Change(snapshot));
    }
}

/// Start an autosave session for `board_id`. Must be called inside a Tokio
/// runtime.
///
/// Returns the handle for the drawing surface and a stream of commit
/// results. The stream ends when the session does.
pub fn spawn(
    workspace: Workspace,
    board_id: impl Into<String>,
    config: AutosaveConfig,
) -> (AutosaveHandle, mpsc::UnboundedReceiver<SaveOutcome>) {
    let board_id = board_id.into();
    let (tx, rx) = mpsc::unbounded_channel();
    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

    tokio::spawn(run_session(
        workspace,
        board_id.clone(),
        config,
        rx,
        outcome_tx,
    ));

    (AutosaveHandle { board_id, tx }, outcome_rx)
}

async fn run_session(
    workspace: Workspace,
    board_id: String,
    config: AutosaveConfig,
    mut commands: mpsc::UnboundedReceiver<Command>,
    outcomes: mpsc::UnboundedSender<SaveOutcome>,
) {
    let mut debouncer = Debouncer::new();
    let mut timer: Option<(Instant, u64)> = None;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Loaded) => debouncer.mark_loaded(),
                Some(Command::Change(snapshot)) => match debouncer.on_change(snapshot) {
                    ChangeOutcome::Ignored => {
                        trace!(board = %board_id, "Change before load, ignored");
                    }
                    ChangeOutcome::Armed { generation } | ChangeOutcome::Rearmed { generation } => {
                        trace!(board = %board_id, generation, "Canvas change queued");
                        timer = Some((Instant::now() + config.interval, generation));
                    }
                },
                None => {
                    if debouncer.abandon().is_some() {
                        debug!(board = %board_id, "Session closed with an uncommitted change");
                    }
                    return;
                }
            },
            generation = expire(timer) => {
                timer = None;
                if let Some(snapshot) = debouncer.on_timer(generation) {
                    let outcome = commit(&workspace, &board_id, snapshot).await;
                    let _ = outcomes.send(outcome);
                }
            }
        }
    }
}

/// Resolves with the timer's generation when it expires; never resolves
/// when no timer is set.
async fn expire(timer: Option<(Instant, u64)>) -> u64 {
    match timer {
        Some((deadline, generation)) => {
            tokio::time::sleep_until(deadline).await;
            generation
        }
        None => std::future::pending().await,
    }
}

async fn commit(workspace: &Workspace, board_id: &str, snapshot: CanvasSnapshot) -> SaveOutcome {
    match workspace
        .save_canvas(board_id, snapshot.elements, snapshot.view)
        .await
    {
        Ok(Some(updated_at)) => {
            debug!(board = %board_id, updated_at, "Canvas saved");
            SaveOutcome::Saved { updated_at }
        }
        Ok(None) => {
            debug!(board = %board_id, "Board gone, canvas not saved");
            SaveOutcome::BoardMissing
        }
        Err(e) => {
            warn!(board = %board_id, "Autosave failed: {}", e);
            SaveOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use excaliboard_db::Database;
    use excaliboard_types::{Board, ROOT_ID};

    use super::*;

    const INTERVAL: Duration = Duration::from_millis(100);

    async fn setup() -> (Workspace, Board) {
        let ws = Workspace::new(Arc::new(Database::open_in_memory().unwrap()));
        let board = ws.create_board("Sketch", ROOT_ID).await.unwrap().unwrap();
        (ws, board)
    }

    fn start(ws: &Workspace, board: &Board) -> (AutosaveHandle, mpsc::UnboundedReceiver<SaveOutcome>) {
        spawn(ws.clone(), board.id.clone(), AutosaveConfig { interval: INTERVAL })
    }

    fn element(version: i64) -> Vec<Value> {
        vec![json!({ "id": "shape", "type": "rectangle", "version": version })]
    }

    async fn next_outcome(outcomes: &mut mpsc::UnboundedReceiver<SaveOutcome>) -> SaveOutcome {
        tokio::time::timeout(Duration::from_secs(5), outcomes.recv())
            .await
            .expect("no save within 5s")
            .expect("session ended")
    }

    #[tokio::test]
    async fn burst_of_changes_is_one_write_of_the_last() {
        let (ws, board) = setup().await;
        let (handle, mut outcomes) = start(&ws, &board);
        let mut feed = ws.db().subscribe();

        handle.mark_loaded();
        for version in 1..=10 {
            handle.on_change(element(version), &json!({ "scrollX": version }));
        }

        assert!(matches!(next_outcome(&mut outcomes).await, SaveOutcome::Saved { .. }));
        tokio::time::sleep(INTERVAL * 3).await;
        assert!(outcomes.try_recv().is_err());

        let writes = std::iter::from_fn(|| feed.try_recv().ok()).count();
        assert_eq!(writes, 1);

        let stored = ws.board(&board.id).await.unwrap().unwrap();
        assert_eq!(stored.content, element(10));
        assert_eq!(stored.app_state.unwrap().scroll_x, Some(json!(10)));
        assert!(stored.updated_at >= board.updated_at);
    }

    #[tokio::test]
    async fn changes_separated_by_quiet_periods_each_flush() {
        let (ws, board) = setup().await;
        let (handle, mut outcomes) = start(&ws, &board);
        handle.mark_loaded();

        handle.on_change(element(1), &json!({}));
        let SaveOutcome::Saved { updated_at: first } = next_outcome(&mut outcomes).await else {
            panic!("first save failed");
        };

        handle.on_change(element(2), &json!({}));
        let SaveOutcome::Saved { updated_at: second } = next_outcome(&mut outcomes).await else {
            panic!("second save failed");
        };

        assert!(second > first);
        assert_eq!(ws.board(&board.id).await.unwrap().unwrap().content, element(2));
    }

    #[tokio::test]
    async fn changes_before_load_never_overwrite_saved_content() {
        let (ws, board) = setup().await;
        ws.save_canvas(&board.id, element(7), ViewState::default())
            .await
            .unwrap();
        let (handle, mut outcomes) = start(&ws, &board);

        handle.on_change(Vec::new(), &json!({}));
        tokio::time::sleep(INTERVAL * 3).await;

        assert!(outcomes.try_recv().is_err());
        assert_eq!(ws.board(&board.id).await.unwrap().unwrap().content, element(7));
    }

    #[tokio::test]
    async fn teardown_abandons_pending_change() {
        let (ws, board) = setup().await;
        let (handle, mut outcomes) = start(&ws, &board);

        handle.mark_loaded();
        handle.on_change(element(1), &json!({}));
        drop(handle);

        let ended = tokio::time::timeout(Duration::from_secs(5), outcomes.recv())
            .await
            .unwrap();
        assert_eq!(ended, None);
        assert!(ws.board(&board.id).await.unwrap().unwrap().content.is_empty());
    }

    #[tokio::test]
    async fn deleted_board_is_not_resurrected() {
        let (ws, board) = setup().await;
        let (handle, mut outcomes) = start(&ws, &board);
        handle.mark_loaded();

        ws.delete_board(&board.id).await.unwrap();
        handle.on_change(element(1), &json!({}));

        assert_eq!(next_outcome(&mut outcomes).await, SaveOutcome::BoardMissing);
        assert!(ws.board(&board.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn only_whitelisted_view_fields_are_stored() {
        let (ws, board) = setup().await;
        let (handle, mut outcomes) = start(&ws, &board);
        handle.mark_loaded();

        handle.on_change(
            element(1),
            &json!({
                "viewBackgroundColor": "#000000",
                "zoom": { "value": 0.5 },
                "gridSize": 20,
                "theme": "dark",
                "selectedElementIds": { "shape": true },
                "openMenu": "canvas"
            }),
        );
        next_outcome(&mut outcomes).await;

        let stored = ws.board(&board.id).await.unwrap().unwrap();
        assert_eq!(
            serde_json::to_value(stored.app_state.unwrap()).unwrap(),
            json!({
                "viewBackgroundColor": "#000000",
                "zoom": { "value": 0.5 },
                "gridSize": 20,
                "theme": "dark"
            })
        );
    }

    #[tokio::test]
    async fn failed_save_does_not_stop_the_session() {
        let (ws, board) = setup().await;
        let (handle, mut outcomes) = start(&ws, &board);
        handle.mark_loaded();

        ws.db()
            .execute_raw(
                "CREATE TRIGGER reject_board_updates BEFORE UPDATE ON boards
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();
        handle.on_change(element(1), &json!({}));
        assert!(matches!(next_outcome(&mut outcomes).await, SaveOutcome::Failed(_)));
        assert!(ws.board(&board.id).await.unwrap().unwrap().content.is_empty());

        ws.db().execute_raw("DROP TRIGGER reject_board_updates;").unwrap();
        handle.on_change(element(2), &json!({}));
        assert!(matches!(next_outcome(&mut outcomes).await, SaveOutcome::Saved { .. }));
        assert_eq!(ws.board(&board.id).await.unwrap().unwrap().content, element(2));
    }
}
