use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use excaliboard_db::{Batch, Database, Record};
use excaliboard_types::api::{FolderListing, OpenBoardResponse};
use excaliboard_types::models::is_root;
use excaliboard_types::{Board, DeleteImpact, Folder, InitialCanvas, Theme, ViewState};

use crate::error::Result;
use crate::live::{LiveQueries, LiveQuery};

/// Result of a rename request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed,
    /// The new name equals the current one; nothing was written.
    Unchanged,
    /// The target does not exist (e.g. deleted concurrently).
    NotFound,
    /// The new name is blank after trimming.
    Skipped,
}

/// What a cascade delete removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedFolder {
    /// Parent of the deleted folder (or `"root"`), where a caller viewing
    /// the folder should navigate.
    pub parent_id: String,
    /// Folders removed, the target included.
    pub folders: u64,
    pub boards: u64,
}

/// Hierarchy-aware CRUD over folders and boards.
///
/// Storage work runs on the blocking pool; each method call completes its
/// writes before returning, so calls awaited in sequence apply in order.
#[derive(Clone)]
pub struct Workspace {
    db: Arc<Database>,
}

impl Workspace {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn live(&self) -> LiveQueries {
        LiveQueries::new(self.db.clone())
    }

    /// Run blocking storage work off the async runtime.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> excaliboard_db::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        let value = tokio::task::spawn_blocking(move || f(&db)).await??;
        Ok(value)
    }

    // -- Folders --

    /// Create a folder under `parent_id` (a folder id or `"root"`).
    ///
    /// Returns `None` without writing if the name is blank or the parent
    /// does not exist.
    pub async fn create_folder(&self, name: &str, parent_id: &str) -> Result<Option<Folder>> {
        let Some(name) = clean_name(name) else {
            debug!("Skipping folder creation: blank name");
            return Ok(None);
        };

        let folder = Folder {
            id: Uuid::new_v4().to_string(),
            name,
            parent_id: parent_id.to_string(),
            created_at: now_millis(),
        };

        let created = self
            .blocking(move |db| {
                db.batch(|b| {
                    if !container_exists(b, &folder.parent_id)? {
                        return Ok(None);
                    }
                    b.put(&folder)?;
                    Ok(Some(folder))
                })
            })
            .await?;

        match &created {
            Some(folder) => info!(id = %folder.id, parent = %folder.parent_id, "Folder created"),
            None => debug!(parent = %parent_id, "Skipping folder creation: parent not found"),
        }
        Ok(created)
    }

    pub async fn rename_folder(&self, id: &str, new_name: &str) -> Result<RenameOutcome> {
        self.rename::<Folder>(id, new_name).await
    }

    /// Delete a folder with everything below it.
    ///
    /// Child folders are removed first (recursively), then the folder's
    /// boards, then the folder. The whole cascade is one transaction.
    /// Returns `None` if the folder does not exist.
    pub async fn delete_folder(&self, id: &str) -> Result<Option<DeletedFolder>> {
        let id = id.to_string();
        let deleted = self
            .blocking(move |db| {
                db.batch(|b| {
                    let Some(folder) = b.get::<Folder>(&id)? else {
                        return Ok(None);
                    };
                    let mut removed = DeletedFolder {
                        parent_id: folder.parent_id,
                        folders: 0,
                        boards: 0,
                    };
                    let mut visited = HashSet::new();
                    delete_subtree(b, &id, &mut visited, &mut removed)?;
                    Ok(Some(removed))
                })
            })
            .await?;

        if let Some(removed) = &deleted {
            info!(
                folders = removed.folders,
                boards = removed.boards,
                "Folder deleted"
            );
        }
        Ok(deleted)
    }

    /// Direct children of a folder. Nested content is not counted.
    pub async fn preview_delete_impact(&self, id: &str) -> Result<DeleteImpact> {
        let id = id.to_string();
        self.blocking(move |db| {
            db.read(|b| {
                Ok(DeleteImpact {
                    child_folders: b.count::<Folder>(&id)?,
                    child_boards: b.count::<Board>(&id)?,
                })
            })
        })
        .await
    }

    pub async fn folder(&self, id: &str) -> Result<Option<Folder>> {
        let id = id.to_string();
        self.blocking(move |db| db.get(&id)).await
    }

    pub async fn child_folders(&self, parent_id: &str) -> Result<Vec<Folder>> {
        let parent_id = parent_id.to_string();
        self.blocking(move |db| db.query_by_index(&parent_id)).await
    }

    /// Folder record plus contents; `None` if `folder_id` is neither root
    /// nor an existing folder.
    pub async fn listing(&self, folder_id: &str) -> Result<Option<FolderListing>> {
        let folder_id = folder_id.to_string();
        self.blocking(move |db| db.read(|b| read_listing(b, &folder_id))).await
    }

    /// Live version of [`Workspace::listing`].
    pub fn watch_folder(&self, folder_id: &str) -> LiveQuery<Option<FolderListing>> {
        let folder_id = folder_id.to_string();
        self.live().observe(move |b| read_listing(b, &folder_id))
    }

    // -- Boards --

    /// Create an empty board inside `folder_id` (a folder id or `"root"`).
    pub async fn create_board(&self, name: &str, folder_id: &str) -> Result<Option<Board>> {
        let Some(name) = clean_name(name) else {
            debug!("Skipping board creation: blank name");
            return Ok(None);
        };

        let now = now_millis();
        let board = Board {
            id: Uuid::new_v4().to_string(),
            name,
            folder_id: folder_id.to_string(),
            content: Vec::new(),
            app_state: None,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .blocking(move |db| {
                db.batch(|b| {
                    if !container_exists(b, &board.folder_id)? {
                        return Ok(None);
                    }
                    b.put(&board)?;
                    Ok(Some(board))
                })
            })
            .await?;

        match &created {
            Some(board) => info!(id = %board.id, folder = %board.folder_id, "Board created"),
            None => debug!(folder = %folder_id, "Skipping board creation: folder not found"),
        }
        Ok(created)
    }

    pub async fn rename_board(&self, id: &str, new_name: &str) -> Result<RenameOutcome> {
        self.rename::<Board>(id, new_name).await
    }

    /// Remove a board. Returns whether it existed.
    pub async fn delete_board(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        let removed = self.blocking(move |db| db.delete::<Board>(&id)).await?;
        if !removed {
            debug!("Board already gone, nothing to delete");
        }
        Ok(removed)
    }

    pub async fn board(&self, id: &str) -> Result<Option<Board>> {
        let id = id.to_string();
        self.blocking(move |db| db.get(&id)).await
    }

    pub async fn boards_in(&self, folder_id: &str) -> Result<Vec<Board>> {
        let folder_id = folder_id.to_string();
        self.blocking(move |db| db.query_by_index(&folder_id)).await
    }

    /// Load a board for the drawing surface, filling in view defaults for
    /// `theme` when nothing was saved yet.
    pub async fn open_board(&self, id: &str, theme: Theme) -> Result<Option<OpenBoardResponse>> {
        Ok(self.board(id).await?.map(|board| OpenBoardResponse {
            initial: InitialCanvas::for_board(&board, theme),
            id: board.id,
            name: board.name,
        }))
    }

    /// Store a canvas snapshot. Returns the new `updated_at`, or `None` if
    /// the board no longer exists.
    pub async fn save_canvas(
        &self,
        id: &str,
        elements: Vec<Value>,
        view: ViewState,
    ) -> Result<Option<i64>> {
        let id = id.to_string();
        let now = now_millis();
        self.blocking(move |db| db.batch(|b| b.save_canvas(&id, &elements, &view, now)))
            .await
    }

    // -- Shared --

    async fn rename<R>(&self, id: &str, new_name: &str) -> Result<RenameOutcome>
    where
        R: Record + Send + 'static,
    {
        let Some(name) = clean_name(new_name) else {
            return Ok(RenameOutcome::Skipped);
        };
        let id = id.to_string();

        let outcome = self
            .blocking(move |db| {
                db.batch(|b| match b.get::<R>(&id)? {
                    None => Ok(RenameOutcome::NotFound),
                    Some(current) if current.name() == name => Ok(RenameOutcome::Unchanged),
                    Some(_) => {
                        b.rename::<R>(&id, &name)?;
                        Ok(RenameOutcome::Renamed)
                    }
                })
            })
            .await?;

        debug!(collection = R::table(), ?outcome, "Rename");
        Ok(outcome)
    }
}

/// Trimmed name, or `None` if nothing is left.
fn clean_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn container_exists(b: &mut Batch<'_>, id: &str) -> excaliboard_db::Result<bool> {
    Ok(is_root(id) || b.get::<Folder>(id)?.is_some())
}

fn read_listing(b: &mut Batch<'_>, folder_id: &str) -> excaliboard_db::Result<Option<FolderListing>> {
    let folder = if is_root(folder_id) {
        None
    } else {
        match b.get::<Folder>(folder_id)? {
            Some(folder) => Some(folder),
            None => return Ok(None),
        }
    };

    Ok(Some(FolderListing {
        folder,
        folders: b.query_by_index(folder_id)?,
        boards: b.query_by_index(folder_id)?,
    }))
}

/// Child folders first, then boards, then the folder itself. `visited`
/// stops the walk if the stored hierarchy ever contains a cycle.
fn delete_subtree(
    b: &mut Batch<'_>,
    folder_id: &str,
    visited: &mut HashSet<String>,
    removed: &mut DeletedFolder,
) -> excaliboard_db::Result<()> {
    if !visited.insert(folder_id.to_string()) {
        return Ok(());
    }

    for child in b.ids_by_index::<Folder>(folder_id)? {
        delete_subtree(b, &child, visited, removed)?;
    }

    for board in b.ids_by_index::<Board>(folder_id)? {
        if b.delete::<Board>(&board)? {
            removed.boards += 1;
        }
    }

    if b.delete::<Folder>(folder_id)? {
        removed.folders += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use excaliboard_types::ROOT_ID;
    use excaliboard_types::store::ChangeKind;

    use super::*;

    fn workspace() -> Workspace {
        Workspace::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn board_created_inside_folder_is_listed() {
        let ws = workspace();
        let projects = ws.create_folder("Projects", ROOT_ID).await.unwrap().unwrap();
        ws.create_board("Sketch 1", &projects.id).await.unwrap().unwrap();

        let boards = ws.boards_in(&projects.id).await.unwrap();

        assert_eq!(boards.len(), 1);
        assert_eq!(boards[0].name, "Sketch 1");
        assert!(boards[0].content.is_empty());
        assert_eq!(boards[0].created_at, boards[0].updated_at);
    }

    #[tokio::test]
    async fn names_are_trimmed_and_blank_names_skipped() {
        let ws = workspace();

        assert!(ws.create_folder("   ", ROOT_ID).await.unwrap().is_none());
        assert!(ws.create_board("", ROOT_ID).await.unwrap().is_none());

        let folder = ws.create_folder("  Ideas  ", ROOT_ID).await.unwrap().unwrap();
        assert_eq!(folder.name, "Ideas");
        assert!(ws.boards_in(ROOT_ID).await.unwrap().is_empty());
        assert_eq!(ws.child_folders(ROOT_ID).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_under_missing_parent_is_a_no_op() {
        let ws = workspace();

        assert!(ws.create_folder("Orphan", "nope").await.unwrap().is_none());
        assert!(ws.create_board("Orphan", "nope").await.unwrap().is_none());
        assert!(ws.child_folders("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ids_are_unique() {
        let ws = workspace();
        let mut ids = HashSet::new();
        for i in 0..20 {
            let folder = ws.create_folder(&format!("f{i}"), ROOT_ID).await.unwrap().unwrap();
            let board = ws.create_board(&format!("b{i}"), ROOT_ID).await.unwrap().unwrap();
            assert!(ids.insert(folder.id));
            assert!(ids.insert(board.id));
        }
    }

    #[tokio::test]
    async fn rename_to_same_name_writes_nothing() {
        let ws = workspace();
        let board = ws.create_board("Sketch", ROOT_ID).await.unwrap().unwrap();
        let mut feed = ws.db().subscribe();

        let outcome = ws.rename_board(&board.id, " Sketch ").await.unwrap();

        assert_eq!(outcome, RenameOutcome::Unchanged);
        assert!(feed.try_recv().is_err());
        let stored = ws.board(&board.id).await.unwrap().unwrap();
        assert_eq!(stored.updated_at, board.updated_at);
    }

    #[tokio::test]
    async fn rename_changes_name_only() {
        let ws = workspace();
        let board = ws.create_board("Sketch", ROOT_ID).await.unwrap().unwrap();
        let folder = ws.create_folder("Old", ROOT_ID).await.unwrap().unwrap();

        assert_eq!(ws.rename_board(&board.id, "Plan").await.unwrap(), RenameOutcome::Renamed);
        assert_eq!(ws.rename_folder(&folder.id, "New").await.unwrap(), RenameOutcome::Renamed);
        assert_eq!(ws.rename_folder(&folder.id, "  ").await.unwrap(), RenameOutcome::Skipped);
        assert_eq!(ws.rename_folder("missing", "X").await.unwrap(), RenameOutcome::NotFound);

        let stored = ws.board(&board.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Plan");
        assert_eq!(stored.updated_at, board.updated_at);
        assert_eq!(ws.folder(&folder.id).await.unwrap().unwrap().name, "New");
    }

    #[tokio::test]
    async fn delete_folder_cascades_through_all_levels() {
        let ws = workspace();
        let top = ws.create_folder("Top", ROOT_ID).await.unwrap().unwrap();
        let mid = ws.create_folder("Mid", &top.id).await.unwrap().unwrap();
        let leaf = ws.create_folder("Leaf", &mid.id).await.unwrap().unwrap();
        ws.create_board("a", &top.id).await.unwrap();
        ws.create_board("b", &mid.id).await.unwrap();
        ws.create_board("c", &leaf.id).await.unwrap();
        let survivor = ws.create_board("keep", ROOT_ID).await.unwrap().unwrap();

        let removed = ws.delete_folder(&top.id).await.unwrap().unwrap();

        assert_eq!(removed.parent_id, ROOT_ID);
        assert_eq!(removed.folders, 3);
        assert_eq!(removed.boards, 3);
        for id in [&top.id, &mid.id, &leaf.id] {
            assert!(ws.folder(id).await.unwrap().is_none());
            assert!(ws.child_folders(id).await.unwrap().is_empty());
            assert!(ws.boards_in(id).await.unwrap().is_empty());
        }
        assert!(ws.board(&survivor.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_nested_folder_points_back_to_parent() {
        let ws = workspace();
        let parent = ws.create_folder("Parent", ROOT_ID).await.unwrap().unwrap();
        let child = ws.create_folder("Child", &parent.id).await.unwrap().unwrap();

        let removed = ws.delete_folder(&child.id).await.unwrap().unwrap();

        assert_eq!(removed.parent_id, parent.id);
        assert!(ws.delete_folder(&child.id).await.unwrap().is_none());
        assert!(ws.folder(&parent.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cascade_deletes_children_before_parent() {
        let ws = workspace();
        let top = ws.create_folder("Top", ROOT_ID).await.unwrap().unwrap();
        let child = ws.create_folder("Child", &top.id).await.unwrap().unwrap();
        let board = ws.create_board("b", &top.id).await.unwrap().unwrap();
        let mut feed = ws.db().subscribe();

        ws.delete_folder(&top.id).await.unwrap();

        let order: Vec<String> = std::iter::from_fn(|| feed.try_recv().ok())
            .inspect(|c| assert_eq!(c.kind, ChangeKind::Delete))
            .map(|c| c.id)
            .collect();
        assert_eq!(order, vec![child.id, board.id, top.id]);
    }

    #[tokio::test]
    async fn impact_counts_direct_children_only() {
        let ws = workspace();
        let target = ws.create_folder("Target", ROOT_ID).await.unwrap().unwrap();
        let a = ws.create_folder("A", &target.id).await.unwrap().unwrap();
        ws.create_folder("B", &target.id).await.unwrap();
        for name in ["1", "2", "3"] {
            ws.create_board(name, &target.id).await.unwrap();
        }
        ws.create_folder("deep", &a.id).await.unwrap();
        ws.create_board("deep board", &a.id).await.unwrap();

        let impact = ws.preview_delete_impact(&target.id).await.unwrap();

        assert_eq!(impact, DeleteImpact { child_folders: 2, child_boards: 3 });
    }

    #[tokio::test]
    async fn deleting_missing_board_is_silent() {
        let ws = workspace();
        let board = ws.create_board("b", ROOT_ID).await.unwrap().unwrap();
        assert!(ws.delete_board(&board.id).await.unwrap());

        let mut feed = ws.db().subscribe();
        assert!(!ws.delete_board(&board.id).await.unwrap());
        assert!(feed.try_recv().is_err());
    }

    #[tokio::test]
    async fn open_board_applies_defaults_then_saved_state() {
        let ws = workspace();
        let board = ws.create_board("b", ROOT_ID).await.unwrap().unwrap();

        let fresh = ws.open_board(&board.id, Theme::Dark).await.unwrap().unwrap();
        assert_eq!(fresh.initial.app_state.view_background_color, Some(json!("#1e1e1e")));

        let view = ViewState::from_engine(&json!({ "viewBackgroundColor": "#abcdef", "scrollY": 7 }));
        let updated_at = ws
            .save_canvas(&board.id, vec![json!({ "id": "e1" })], view)
            .await
            .unwrap()
            .unwrap();
        assert!(updated_at >= board.updated_at);

        let reopened = ws.open_board(&board.id, Theme::Light).await.unwrap().unwrap();
        assert_eq!(reopened.initial.elements, vec![json!({ "id": "e1" })]);
        assert_eq!(reopened.initial.app_state.view_background_color, Some(json!("#abcdef")));
        assert_eq!(reopened.initial.app_state.theme, Some(json!("light")));

        assert!(ws.open_board("missing", Theme::Light).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn listing_covers_both_indexes() {
        let ws = workspace();
        let folder = ws.create_folder("F", ROOT_ID).await.unwrap().unwrap();
        ws.create_folder("Sub", &folder.id).await.unwrap();
        ws.create_board("Board", &folder.id).await.unwrap();

        let listing = ws.listing(&folder.id).await.unwrap().unwrap();
        assert_eq!(listing.folder.as_ref().map(|f| f.name.as_str()), Some("F"));
        assert_eq!(listing.folders.len(), 1);
        assert_eq!(listing.boards.len(), 1);

        let root = ws.listing(ROOT_ID).await.unwrap().unwrap();
        assert!(root.folder.is_none());
        assert_eq!(root.folders.len(), 1);

        assert!(ws.listing("missing").await.unwrap().is_none());
    }
}
