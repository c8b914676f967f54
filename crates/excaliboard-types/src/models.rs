use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Parent identifier for top-level folders and boards.
///
/// Stored instead of NULL because the containment index needs a comparable,
/// non-null key.
pub const ROOT_ID: &str = "root";

pub fn is_root(id: &str) -> bool {
    id == ROOT_ID
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    pub name: String,
    /// Containing folder id or [`ROOT_ID`].
    pub parent_id: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}

/// A drawing board. `content` is the canvas engine's element list and is
/// never inspected here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub name: String,
    /// Containing folder id or [`ROOT_ID`].
    pub folder_id: String,
    #[serde(default)]
    pub content: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_state: Option<ViewState>,
    pub created_at: i64,
    /// Advances on every canvas save, never on rename.
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Canvas background used when a board has no saved view state.
    pub fn background(&self) -> &'static str {
        match self {
            Self::Light => "#ffffff",
            Self::Dark => "#1e1e1e",
        }
    }
}

/// The persisted subset of the canvas engine's view state.
///
/// Values are passed through verbatim; everything outside this whitelist is
/// engine-internal and dropped at the boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_background_color: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_x: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_y: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_size: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Value>,
}

impl ViewState {
    /// Reduce a raw engine app state to the persisted fields.
    pub fn from_engine(app_state: &Value) -> Self {
        let Some(fields) = app_state.as_object() else {
            return Self::default();
        };
        let pick = |key: &str| fields.get(key).cloned();
        Self {
            view_background_color: pick("viewBackgroundColor"),
            scroll_x: pick("scrollX"),
            scroll_y: pick("scrollY"),
            zoom: pick("zoom"),
            grid_size: pick("gridSize"),
            theme: pick("theme"),
        }
    }

    /// View state for a board that was never saved: theme background,
    /// unscrolled, zoom 1.
    pub fn initial(theme: Theme) -> Self {
        Self {
            view_background_color: Some(Value::from(theme.background())),
            scroll_x: Some(Value::from(0)),
            scroll_y: Some(Value::from(0)),
            zoom: Some(json!({ "value": 1 })),
            grid_size: None,
            theme: None,
        }
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = Some(Value::from(theme.as_str()));
        self
    }
}

/// Everything the drawing surface needs to mount a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialCanvas {
    pub elements: Vec<Value>,
    pub app_state: ViewState,
    /// Always false: auto-scrolling to content makes the canvas jump on load.
    pub scroll_to_content: bool,
}

impl InitialCanvas {
    pub fn for_board(board: &Board, theme: Theme) -> Self {
        let app_state = board
            .app_state
            .clone()
            .unwrap_or_else(|| ViewState::initial(theme))
            .with_theme(theme);
        Self {
            elements: board.content.clone(),
            app_state,
            scroll_to_content: false,
        }
    }
}

/// Direct children of a folder, shown before a cascade delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteImpact {
    pub child_folders: u64,
    pub child_boards: u64,
}

impl DeleteImpact {
    pub fn is_empty(&self) -> bool {
        self.child_folders == 0 && self.child_boards == 0
    }

    /// Confirmation text for deleting the folder called `name`.
    pub fn warning(&self, name: &str) -> String {
        if self.is_empty() {
            format!("Are you sure you want to delete \"{name}\"? This action cannot be undone.")
        } else {
            format!(
                "\"{}\" contains {} folder(s) and {} board(s). All contents will be permanently deleted.",
                name, self.child_folders, self.child_boards
            )
        }
    }
}
