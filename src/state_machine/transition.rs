//! Pure state transition function
//!
//! Given the user's session and one event, decide the next session and the
//! ordered effects that carry it out. No I/O happens here; classifier and
//! storage work is requested through effects whose outcomes come back as
//! further events.

use super::effect::Effect;
use super::event::Event;
use super::{commands, copy, tutorial};
use crate::session::{Session, SessionState, TutorialStep};
use std::time::Duration;
use thiserror::Error;

/// Delays between consecutive replies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub beat: Duration,
    pub long_beat: Duration,
}

impl Pacing {
    pub fn from_beat(beat: Duration) -> Self {
        Self {
            beat,
            long_beat: beat * 2,
        }
    }

    pub fn none() -> Self {
        Self::from_beat(Duration::ZERO)
    }
}

/// Deployment settings the transition rules depend on
#[derive(Debug, Clone)]
pub struct BotContext {
    pub pacing: Pacing,
    pub max_hints: u32,
    pub max_puzzle_id: i64,
}

impl Default for BotContext {
    fn default() -> Self {
        Self {
            pacing: Pacing::from_beat(Duration::from_secs(1)),
            max_hints: 2,
            max_puzzle_id: 7,
        }
    }
}

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub session: Session,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// An effect outcome arrived that the current state cannot accept
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Invalid transition: {event} in state {state}")]
    InvalidTransition { state: SessionState, event: &'static str },
}

fn invalid(session: &Session, event: &Event) -> TransitionError {
    TransitionError::InvalidTransition {
        state: session.state,
        event: event.kind(),
    }
}

/// Pure transition function
///
/// Tutorial messages never reach command dispatch: while the session is in
/// a tutorial stage, `!play` and friends are just text that fails the gate.
pub fn transition(
    session: &Session,
    ctx: &BotContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (session.state, event) {
        // Joining always starts over at the first tutorial stage
        (_, Event::Joined) => Ok(TransitionResult::new(Session::new_user())
            .with_effect(Effect::PersistSession)
            .with_effect(Effect::say(copy::WELCOME))
            .with_effect(Effect::WarmUpClassifier)),

        (_, Event::Left) => {
            Ok(TransitionResult::new(session.clone()).with_effect(Effect::DeleteSession))
        }

        (_, Event::Message { text }) if text.trim().is_empty() => {
            Ok(TransitionResult::new(session.clone()))
        }

        (SessionState::Tutorial(step), Event::Message { text }) => {
            Ok(tutorial::on_message(session, step, ctx, &text))
        }

        (SessionState::Idle | SessionState::Playing, Event::Message { text }) => {
            Ok(match commands::Command::parse(&text) {
                Some(command) => commands::on_command(session, ctx, command),
                None => commands::on_free_text(session, &text),
            })
        }

        // ============================================================
        // Effect outcomes
        // ============================================================
        (SessionState::Tutorial(step), Event::GateChecked { text, passed }) => {
            match tutorial::stage(step) {
                Some(stage) => Ok(tutorial::on_gate_checked(session, stage, ctx, &text, passed)),
                None => Err(TransitionError::InvalidTransition {
                    state: session.state,
                    event: "gate_checked",
                }),
            }
        }

        (SessionState::Tutorial(TutorialStep::NowSolve), Event::SolutionChecked { correct }) => {
            Ok(tutorial::on_solution_checked(session, correct))
        }

        (SessionState::Playing, Event::SolutionChecked { correct }) => {
            Ok(commands::on_solution_checked(session, correct))
        }

        (
            SessionState::Idle,
            Event::PuzzleLoaded {
                puzzle_id,
                title,
                problem,
            },
        ) => Ok(commands::on_puzzle_loaded(puzzle_id, &title, &problem)),

        (SessionState::Idle, Event::PuzzleMissing { puzzle_id }) => {
            tracing::debug!(puzzle_id, "Requested puzzle is not stored");
            Ok(TransitionResult::new(session.clone()).with_effect(Effect::say(copy::NO_SUCH_PUZZLE)))
        }

        (_, event) => Err(invalid(session, &event)),
    }
}
