//! Commands available once the tutorial is done

use super::copy;
use super::effect::Effect;
use super::transition::{BotContext, TransitionResult};
use crate::puzzle::RESERVED_PUZZLE_ID;
use crate::session::Session;

/// Split `!name rest` into `("name", "rest")`. `None` if the message is not
/// a command.
pub fn split_command(text: &str) -> Option<(&str, &str)> {
    let body = text.trim().strip_prefix('!')?;
    Some(match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Puzzles,
    Play(&'a str),
    Hint,
    Submit(&'a str),
    GiveUp,
    Quit,
    Help,
    Feedback(&'a str),
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(text: &'a str) -> Option<Self> {
        let (name, rest) = split_command(text)?;
        Some(match name {
            "puzzles" => Command::Puzzles,
            "play" => Command::Play(rest),
            "hint" => Command::Hint,
            "submit" => Command::Submit(rest),
            "giveup" => Command::GiveUp,
            "quit" => Command::Quit,
            "help" => Command::Help,
            "feedback" => Command::Feedback(rest),
            other => Command::Unknown(other),
        })
    }
}

pub fn on_command(session: &Session, ctx: &BotContext, command: Command<'_>) -> TransitionResult {
    let unchanged = TransitionResult::new(session.clone());
    match command {
        Command::Puzzles => unchanged.with_effect(Effect::ListPuzzles),
        Command::Play(arg) => play(session, ctx, arg),
        Command::Hint => hint(session, ctx),
        Command::Submit(guess) if session.is_playing() => unchanged.with_effect(Effect::CheckSolution {
            puzzle_id: session.puzzle_id,
            guess: guess.to_string(),
        }),
        Command::GiveUp if session.is_playing() => unchanged.with_effects([
            Effect::say(copy::SOLUTION_INTRO),
            Effect::Pause(ctx.pacing.beat),
            Effect::RevealSolution {
                puzzle_id: session.puzzle_id,
            },
        ]),
        Command::Submit(_) | Command::GiveUp => unchanged.with_effect(Effect::say(copy::NOT_PLAYING)),
        Command::Quit if session.is_idle() => unchanged.with_effect(Effect::say(copy::ALREADY_IDLE)),
        Command::Quit => TransitionResult::new(Session::idle())
            .with_effect(Effect::PersistSession)
            .with_effect(Effect::say(copy::QUIT)),
        Command::Help => unchanged.with_effect(Effect::say(copy::HELP)),
        Command::Feedback(text) => unchanged
            .with_effect(Effect::RecordFeedback {
                text: text.to_string(),
            })
            .with_effect(Effect::say(copy::FEEDBACK_THANKS)),
        Command::Unknown(name) => {
            tracing::debug!(command = %name, "Unknown command");
            unchanged.with_effect(Effect::say(copy::INVALID_COMMAND))
        }
    }
}

fn play(session: &Session, ctx: &BotContext, arg: &str) -> TransitionResult {
    let unchanged = TransitionResult::new(session.clone());
    if session.is_playing() {
        return unchanged.with_effect(Effect::say(copy::already_playing(session.puzzle_id)));
    }
    match arg.parse::<i64>() {
        Ok(puzzle_id) if puzzle_id > RESERVED_PUZZLE_ID && puzzle_id <= ctx.max_puzzle_id => {
            unchanged.with_effect(Effect::LoadPuzzle { puzzle_id })
        }
        _ => unchanged.with_effect(Effect::say(copy::NO_SUCH_PUZZLE)),
    }
}

/// At the limit the user is told so, and the hint at the current index is
/// still shown if the puzzle has one. The counter never passes the limit.
fn hint(session: &Session, ctx: &BotContext) -> TransitionResult {
    let exhausted = session.hints_given >= ctx.max_hints;
    let mut effects = Vec::new();
    if exhausted {
        effects.push(Effect::say(copy::HINTS_EXHAUSTED));
    }
    if !session.is_playing() {
        effects.push(Effect::say(copy::NOT_PLAYING));
        return TransitionResult::new(session.clone()).with_effects(effects);
    }

    let mut next = session.clone();
    if !exhausted {
        next.hints_given = (session.hints_given + 1).min(ctx.max_hints);
        effects.push(Effect::PersistSession);
    }
    effects.push(Effect::SendHint {
        puzzle_id: session.puzzle_id,
        index: session.hints_given,
    });
    TransitionResult::new(next).with_effects(effects)
}

/// Plain text outside the tutorial is a question about the active puzzle.
pub fn on_free_text(session: &Session, text: &str) -> TransitionResult {
    let unchanged = TransitionResult::new(session.clone());
    if session.has_puzzle() {
        unchanged.with_effect(Effect::AnswerQuestion {
            puzzle_id: session.puzzle_id,
            question: text.to_string(),
        })
    } else {
        unchanged.with_effect(Effect::say(copy::SELECT_PUZZLE_FIRST))
    }
}

pub fn on_puzzle_loaded(puzzle_id: i64, title: &str, problem: &str) -> TransitionResult {
    TransitionResult::new(Session::playing(puzzle_id))
        .with_effect(Effect::PersistSession)
        .with_effect(Effect::say(copy::puzzle_intro(title, problem)))
}

pub fn on_solution_checked(session: &Session, correct: bool) -> TransitionResult {
    if correct {
        TransitionResult::new(Session::idle())
            .with_effect(Effect::PersistSession)
            .with_effect(Effect::say(copy::CORRECT))
    } else {
        TransitionResult::new(session.clone()).with_effect(Effect::say(copy::INCORRECT))
    }
}
