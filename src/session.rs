//! Per-user session record
//!
//! One session per user id. The state is persisted by name
//! (`tutorial_welcome`, ..., `idle`, `playing`) so a restarted bot picks up
//! every conversation where it left off.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// `puzzle_id` value meaning no puzzle is selected
pub const NO_PUZZLE: i64 = -1;

/// The tutorial always plays this puzzle
pub const TUTORIAL_PUZZLE_ID: i64 = 1;

/// Persisted state name that this build does not know
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown session state: {0}")]
pub struct UnknownState(pub String);

/// Tutorial stages, in the order the user walks through them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TutorialStep {
    Welcome,
    Example,
    Iceberg,
    FirstGuess,
    PossibilityTree,
    Irrelevant,
    Submit,
    Hints,
    Privacy,
    NowSolve,
}

impl TutorialStep {
    pub const ALL: [TutorialStep; 10] = [
        TutorialStep::Welcome,
        TutorialStep::Example,
        TutorialStep::Iceberg,
        TutorialStep::FirstGuess,
        TutorialStep::PossibilityTree,
        TutorialStep::Irrelevant,
        TutorialStep::Submit,
        TutorialStep::Hints,
        TutorialStep::Privacy,
        TutorialStep::NowSolve,
    ];

    pub fn state_name(self) -> &'static str {
        match self {
            TutorialStep::Welcome => "tutorial_welcome",
            TutorialStep::Example => "tutorial_example",
            TutorialStep::Iceberg => "tutorial_iceberg",
            TutorialStep::FirstGuess => "tutorial_first_guess",
            TutorialStep::PossibilityTree => "tutorial_possibility_tree",
            TutorialStep::Irrelevant => "tutorial_irrelevant",
            TutorialStep::Submit => "tutorial_submit",
            TutorialStep::Hints => "tutorial_hints",
            TutorialStep::Privacy => "tutorial_privacy",
            TutorialStep::NowSolve => "tutorial_now_solve",
        }
    }

    /// Following stage; `None` after the last one
    pub fn next(self) -> Option<TutorialStep> {
        let index = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(index + 1).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SessionState {
    Tutorial(TutorialStep),
    Idle,
    Playing,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Tutorial(step) => step.state_name(),
            SessionState::Idle => "idle",
            SessionState::Playing => "playing",
        }
    }

    pub fn is_tutorial(self) -> bool {
        matches!(self, SessionState::Tutorial(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SessionState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(SessionState::Idle),
            "playing" => Ok(SessionState::Playing),
            other => TutorialStep::ALL
                .iter()
                .find(|step| step.state_name() == other)
                .map(|step| SessionState::Tutorial(*step))
                .ok_or_else(|| UnknownState(other.to_string())),
        }
    }
}

impl TryFrom<String> for SessionState {
    type Error = UnknownState;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SessionState> for String {
    fn from(state: SessionState) -> Self {
        state.name().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub state: SessionState,
    /// Active puzzle, or [`NO_PUZZLE`]
    pub puzzle_id: i64,
    pub hints_given: u32,
}

impl Session {
    /// Session for a user who just joined
    pub fn new_user() -> Self {
        Self::tutorial(TutorialStep::Welcome)
    }

    /// Entering any tutorial stage pins the tutorial puzzle and clears hints
    pub fn tutorial(step: TutorialStep) -> Self {
        Self {
            state: SessionState::Tutorial(step),
            puzzle_id: TUTORIAL_PUZZLE_ID,
            hints_given: 0,
        }
    }

    pub fn idle() -> Self {
        Self {
            state: SessionState::Idle,
            puzzle_id: NO_PUZZLE,
            hints_given: 0,
        }
    }

    pub fn playing(puzzle_id: i64) -> Self {
        Self {
            state: SessionState::Playing,
            puzzle_id,
            hints_given: 0,
        }
    }

    pub fn has_puzzle(&self) -> bool {
        self.puzzle_id != NO_PUZZLE
    }

    pub fn is_playing(&self) -> bool {
        self.state == SessionState::Playing
    }

    pub fn is_idle(&self) -> bool {
        self.state == SessionState::Idle
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new_user()
    }
}
