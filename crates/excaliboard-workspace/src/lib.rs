//! Folder/board hierarchy over the local store, live queries that follow
//! it, and the debounced autosave pipeline for open boards.

pub mod autosave;
pub mod error;
pub mod live;
pub mod tree;

pub use autosave::{AutosaveConfig, AutosaveHandle, SaveOutcome};
pub use error::{Result, WorkspaceError};
pub use live::{LiveQueries, LiveQuery, QueryState};
pub use tree::{DeletedFolder, RenameOutcome, Workspace};
