use serde_json::Value;

use excaliboard_types::ViewState;

/// One canvas state as reported by the drawing surface, already reduced to
/// the persisted view fields.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasSnapshot {
    pub elements: Vec<Value>,
    pub view: ViewState,
}

#[derive(Debug, Default)]
pub enum SaveState {
    /// No pending write.
    #[default]
    Idle,
    /// A timer tagged `generation` is running; `pending` is the newest
    /// snapshot and replaces any older one.
    Armed {
        generation: u64,
        pending: CanvasSnapshot,
    },
}

/// What the driver must do after a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// Board content is still loading; the change is dropped.
    Ignored,
    /// Start a timer for `generation`.
    Armed { generation: u64 },
    /// Replace the running timer with one for `generation`.
    Rearmed { generation: u64 },
}

/// Debounce state machine for one open board, free of any clock.
///
/// Each change (re)arms a timer with a fresh generation number. Only the
/// timer carrying the current generation may commit, which is how a newer
/// change cancels an older timer.
#[derive(Debug, Default)]
pub struct Debouncer {
    loaded: bool,
    state: SaveState,
    generation: u64,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial content has been handed to the drawing surface; accept
    /// changes from now on.
    pub fn mark_loaded(&mut self) {
        self.loaded = true;
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, SaveState::Armed { .. })
    }

    pub fn on_change(&mut self, snapshot: CanvasSnapshot) -> ChangeOutcome {
        if !self.loaded {
            return ChangeOutcome::Ignored;
        }

        let was_armed = self.is_armed();
        self.generation += 1;
        self.state = SaveState::Armed {
            generation: self.generation,
            pending: snapshot,
        };

        if was_armed {
            ChangeOutcome::Rearmed {
                generation: self.generation,
            }
        } else {
            ChangeOutcome::Armed {
                generation: self.generation,
            }
        }
    }

    /// The timer for `generation` fired. Returns the snapshot to commit and
    /// goes back to idle, or `None` if that timer was superseded.
    pub fn on_timer(&mut self, generation: u64) -> Option<CanvasSnapshot> {
        let current = match self.state {
            SaveState::Armed { generation, .. } => Some(generation),
            SaveState::Idle => None,
        };
        if current != Some(generation) {
            return None;
        }
        self.take_pending()
    }

    /// The view went away. Drops and returns any pending snapshot without
    /// committing it.
    pub fn abandon(&mut self) -> Option<CanvasSnapshot> {
        self.take_pending()
    }

    fn take_pending(&mut self) -> Option<CanvasSnapshot> {
        match std::mem::take(&mut self.state) {
            SaveState::Armed { pending, .. } => Some(pending),
            SaveState::Idle => None,
        }
    }
}
