//! Tutorial stage table
//!
//! Every stage but the last is one row: a gate the user's message must
//! pass, the beats played when it does, and the nudge sent when it doesn't.
//! Passing a gate always moves to the next stage in [`TutorialStep::ALL`].
//! The last stage (`now_solve`) plays the tutorial puzzle for real and is
//! handled by [`now_solve`].

use super::commands::split_command;
use super::copy;
use super::effect::Effect;
use super::transition::{BotContext, TransitionResult};
use crate::judge::exactly_matches;
use crate::session::{Session, TutorialStep};

/// What a message must look like to pass a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// The message, trimmed, equals this string
    Exact(&'static str),
    /// Normalized equality, or the classifier says the message entails it
    Fuzzy(&'static str),
}

/// One step of what the bot does after a gate passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beat {
    /// Answer the user's message as a question about the tutorial puzzle
    AnswerGuess,
    Pause,
    LongPause,
    Say(&'static str),
    SayWithAsset(&'static str, &'static str),
    /// Show the tutorial puzzle's next hint
    ShowHint,
}

#[derive(Debug)]
pub struct Stage {
    pub step: TutorialStep,
    pub gate: Gate,
    pub on_pass: &'static [Beat],
    pub nudge: &'static str,
}

const NEXT: &str = "!next";

pub static STAGES: [Stage; 9] = [
    Stage {
        step: TutorialStep::Welcome,
        gate: Gate::Exact(NEXT),
        on_pass: &[Beat::Say(copy::EXAMPLE)],
        nudge: copy::FOLLOW_NEXT,
    },
    Stage {
        step: TutorialStep::Example,
        gate: Gate::Exact(NEXT),
        on_pass: &[Beat::SayWithAsset(copy::ICEBERG, copy::ICEBERG_ASSET)],
        nudge: copy::FOLLOW_NEXT,
    },
    Stage {
        step: TutorialStep::Iceberg,
        gate: Gate::Exact(NEXT),
        on_pass: &[Beat::Say(copy::FIRST_GUESS)],
        nudge: copy::FOLLOW_NEXT,
    },
    Stage {
        step: TutorialStep::FirstGuess,
        gate: Gate::Fuzzy("The person had a parachute"),
        on_pass: &[
            Beat::AnswerGuess,
            Beat::Pause,
            Beat::SayWithAsset(copy::POSSIBILITY_TREE, copy::POSSIBILITY_TREE_ASSET),
        ],
        nudge: copy::TRY_PARACHUTE,
    },
    Stage {
        step: TutorialStep::PossibilityTree,
        gate: Gate::Exact(NEXT),
        on_pass: &[Beat::Say(copy::IRRELEVANT)],
        nudge: copy::FOLLOW_NEXT,
    },
    Stage {
        step: TutorialStep::Irrelevant,
        gate: Gate::Fuzzy("The person was married"),
        on_pass: &[Beat::AnswerGuess, Beat::Pause, Beat::Say(copy::SUBMIT)],
        nudge: copy::TRY_MARRIED,
    },
    Stage {
        step: TutorialStep::Submit,
        gate: Gate::Fuzzy("!submit The person was caught with a net"),
        on_pass: &[
            Beat::Say(copy::TUTORIAL_INCORRECT),
            Beat::Pause,
            Beat::Say(copy::HINTS),
        ],
        nudge: copy::FOLLOW_NEXT,
    },
    Stage {
        step: TutorialStep::Hints,
        gate: Gate::Exact("!hint"),
        on_pass: &[Beat::ShowHint, Beat::LongPause, Beat::Say(copy::PRIVACY)],
        nudge: copy::FOLLOW_HINT,
    },
    Stage {
        step: TutorialStep::Privacy,
        gate: Gate::Fuzzy("I agree"),
        on_pass: &[Beat::Say(copy::NOW_SOLVE)],
        nudge: copy::AGREE_PRIVACY,
    },
];

/// Table row for `step`; `None` for `now_solve`
pub fn stage(step: TutorialStep) -> Option<&'static Stage> {
    STAGES.iter().find(|stage| stage.step == step)
}

/// A message arrived while the user is in the tutorial.
pub fn on_message(
    session: &Session,
    step: TutorialStep,
    ctx: &BotContext,
    text: &str,
) -> TransitionResult {
    let Some(stage) = stage(step) else {
        return now_solve(session, text);
    };
    match stage.gate {
        Gate::Exact(expected) if text == expected => pass(session, stage, ctx, text),
        Gate::Exact(_) => nudge(session, stage),
        // Normalized equality never needs the classifier
        Gate::Fuzzy(target) if exactly_matches(text, target) => pass(session, stage, ctx, text),
        Gate::Fuzzy(target) => {
            TransitionResult::new(session.clone()).with_effect(Effect::CheckGate {
                text: text.to_string(),
                target,
            })
        }
    }
}

/// The classifier has judged a fuzzy gate.
pub fn on_gate_checked(
    session: &Session,
    stage: &'static Stage,
    ctx: &BotContext,
    text: &str,
    passed: bool,
) -> TransitionResult {
    if passed {
        pass(session, stage, ctx, text)
    } else {
        nudge(session, stage)
    }
}

fn nudge(session: &Session, stage: &Stage) -> TransitionResult {
    TransitionResult::new(session.clone()).with_effect(Effect::say(stage.nudge))
}

fn pass(session: &Session, stage: &Stage, ctx: &BotContext, text: &str) -> TransitionResult {
    let Some(next) = stage.step.next() else {
        return nudge(session, stage);
    };
    let beats = stage.on_pass.iter().map(|beat| match *beat {
        Beat::AnswerGuess => Effect::AnswerQuestion {
            puzzle_id: session.puzzle_id,
            question: text.to_string(),
        },
        Beat::Pause => Effect::Pause(ctx.pacing.beat),
        Beat::LongPause => Effect::Pause(ctx.pacing.long_beat),
        Beat::Say(line) => Effect::say(line),
        Beat::SayWithAsset(line, asset) => Effect::say_with_asset(line, asset),
        Beat::ShowHint => Effect::SendHint {
            puzzle_id: session.puzzle_id,
            index: session.hints_given,
        },
    });
    TransitionResult::new(Session::tutorial(next))
        .with_effect(Effect::PersistSession)
        .with_effects(beats)
}

/// Last tutorial stage: the user plays the tutorial puzzle.
fn now_solve(session: &Session, text: &str) -> TransitionResult {
    let result = TransitionResult::new(session.clone());
    match split_command(text) {
        Some(("submit", guess)) => result.with_effect(Effect::CheckSolution {
            puzzle_id: session.puzzle_id,
            guess: guess.to_string(),
        }),
        Some(("hint", _)) => result.with_effect(Effect::say(copy::TUTORIAL_HINT_DISABLED)),
        Some(_) => result.with_effect(Effect::say(copy::FOLLOW_TUTORIAL)),
        None => result.with_effect(Effect::AnswerQuestion {
            puzzle_id: session.puzzle_id,
            question: text.to_string(),
        }),
    }
}

/// The tutorial puzzle's checks have been evaluated.
pub fn on_solution_checked(session: &Session, correct: bool) -> TransitionResult {
    if correct {
        TransitionResult::new(Session::idle())
            .with_effect(Effect::PersistSession)
            .with_effect(Effect::say(copy::CORRECT))
            .with_effect(Effect::say(copy::TUTORIAL_COMPLETE))
    } else {
        TransitionResult::new(session.clone()).with_effect(Effect::say(copy::INCORRECT))
    }
}
