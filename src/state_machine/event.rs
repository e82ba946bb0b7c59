//! Events that can occur in a user's conversation

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // Transport events
    Joined,
    Left,
    Message {
        text: String,
    },

    // Effect outcomes
    GateChecked {
        text: String,
        passed: bool,
    },
    SolutionChecked {
        correct: bool,
    },
    PuzzleLoaded {
        puzzle_id: i64,
        title: String,
        problem: String,
    },
    PuzzleMissing {
        puzzle_id: i64,
    },
}

impl Event {
    pub fn message(text: impl Into<String>) -> Self {
        Event::Message { text: text.into() }
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Joined => "joined",
            Event::Left => "left",
            Event::Message { .. } => "message",
            Event::GateChecked { .. } => "gate_checked",
            Event::SolutionChecked { .. } => "solution_checked",
            Event::PuzzleLoaded { .. } => "puzzle_loaded",
            Event::PuzzleMissing { .. } => "puzzle_missing",
        }
    }
}
