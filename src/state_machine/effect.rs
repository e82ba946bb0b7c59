//! Effects produced by state transitions

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One message sent back to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outbound {
    pub text: String,
    /// Named asset the transport attaches to the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
}

impl Outbound {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(text: impl Into<String>, asset: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: Some(asset.into()),
        }
    }
}

/// Effects to be executed, in order, after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a message to the user
    Reply(Outbound),

    /// Pacing delay between consecutive replies
    Pause(Duration),

    /// Persist the new session
    PersistSession,

    /// Remove the session record
    DeleteSession,

    /// Best-effort classifier call so the hosted model is loaded
    WarmUpClassifier,

    /// Fuzzy-compare a tutorial reply against `target`
    /// (yields `Event::GateChecked`)
    CheckGate { text: String, target: &'static str },

    /// Answer a yes/no question about the puzzle and reply with the answer
    AnswerQuestion { puzzle_id: i64, question: String },

    /// Run the puzzle's checks against a guess (yields `Event::SolutionChecked`)
    CheckSolution { puzzle_id: i64, guess: String },

    /// Look the puzzle up (yields `Event::PuzzleLoaded` or `Event::PuzzleMissing`)
    LoadPuzzle { puzzle_id: i64 },

    /// Reply with the hint at `index` if the puzzle has one
    SendHint { puzzle_id: i64, index: u32 },

    /// Reply with the puzzle's solution
    RevealSolution { puzzle_id: i64 },

    /// Reply with the listing of playable puzzles
    ListPuzzles,

    RecordFeedback { text: String },
}

impl Effect {
    pub fn say(text: impl Into<String>) -> Self {
        Effect::Reply(Outbound::text(text))
    }

    pub fn say_with_asset(text: impl Into<String>, asset: impl Into<String>) -> Self {
        Effect::Reply(Outbound::with_attachment(text, asset))
    }

    /// Whether executing this effect calls the classifier
    pub fn uses_classifier(&self) -> bool {
        matches!(
            self,
            Effect::WarmUpClassifier
                | Effect::CheckGate { .. }
                | Effect::AnswerQuestion { .. }
                | Effect::CheckSolution { .. }
        )
    }
}
