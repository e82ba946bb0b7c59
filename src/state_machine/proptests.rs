//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::*;
use crate::session::{Session, SessionState, TutorialStep, NO_PUZZLE, TUTORIAL_PUZZLE_ID};
use proptest::prelude::*;
use std::time::Duration;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> BotContext {
    BotContext {
        pacing: Pacing::from_beat(Duration::from_millis(5)),
        max_hints: 2,
        max_puzzle_id: 7,
    }
}

fn step_index(step: TutorialStep) -> usize {
    TutorialStep::ALL
        .iter()
        .position(|s| *s == step)
        .unwrap_or(usize::MAX)
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_step() -> impl Strategy<Value = TutorialStep> {
    proptest::sample::select(TutorialStep::ALL.to_vec())
}

fn arb_session() -> impl Strategy<Value = Session> {
    prop_oneof![
        arb_step().prop_map(Session::tutorial),
        Just(Session::idle()),
        (1i64..=7, 0u32..=2).prop_map(|(id, hints)| {
            let mut session = Session::playing(id);
            session.hints_given = hints;
            session
        }),
    ]
}

fn arb_command_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("!next".to_string()),
        Just("!hint".to_string()),
        Just("!puzzles".to_string()),
        Just("!help".to_string()),
        Just("!giveup".to_string()),
        Just("!quit".to_string()),
        (-2i64..10).prop_map(|id| format!("!play {id}")),
        "[a-z ]{0,20}".prop_map(|guess| format!("!submit {guess}")),
        "[a-z ]{0,20}".prop_map(|text| format!("!feedback {text}")),
        "[a-z]{1,8}".prop_map(|name| format!("!{name}")),
    ]
}

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        arb_command_text(),
        Just("The person had a parachute".to_string()),
        Just("I agree".to_string()),
        "[a-zA-Z ?!.]{0,30}",
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        8 => arb_text().prop_map(Event::message),
        2 => (arb_text(), any::<bool>()).prop_map(|(text, passed)| Event::GateChecked { text, passed }),
        1 => any::<bool>().prop_map(|correct| Event::SolutionChecked { correct }),
        1 => (1i64..=7).prop_map(|puzzle_id| Event::PuzzleLoaded {
            puzzle_id,
            title: "Title".to_string(),
            problem: "Problem".to_string(),
        }),
        1 => (1i64..=7).prop_map(|puzzle_id| Event::PuzzleMissing { puzzle_id }),
        1 => Just(Event::Joined),
    ]
}

// ============================================================================
// Session Validity Checkers
// ============================================================================

fn is_valid_session(session: &Session, ctx: &BotContext) -> bool {
    let puzzle_ok = match session.state {
        SessionState::Tutorial(_) => session.puzzle_id == TUTORIAL_PUZZLE_ID,
        SessionState::Idle => session.puzzle_id == NO_PUZZLE,
        SessionState::Playing => session.puzzle_id >= 1 && session.puzzle_id <= ctx.max_puzzle_id,
    };
    puzzle_ok && session.hints_given <= ctx.max_hints
}

fn is_command_effect(effect: &Effect) -> bool {
    matches!(
        effect,
        Effect::LoadPuzzle { .. }
            | Effect::ListPuzzles
            | Effect::RecordFeedback { .. }
            | Effect::RevealSolution { .. }
    )
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Invariant 1: Valid session after any sequence of events
    #[test]
    fn prop_transitions_preserve_validity(
        start in arb_session(),
        events in proptest::collection::vec(arb_event(), 0..30),
    ) {
        let ctx = test_context();
        let mut session = start;
        for event in events {
            if let Ok(result) = transition(&session, &ctx, event) {
                session = result.session;
                prop_assert!(is_valid_session(&session, &ctx), "Invalid session: {:?}", session);
            }
        }
    }

    // Invariant 2: Every session change is persisted
    #[test]
    fn prop_changes_are_persisted(session in arb_session(), event in arb_event()) {
        if let Ok(result) = transition(&session, &test_context(), event) {
            if result.session != session {
                prop_assert!(
                    result.effects.contains(&Effect::PersistSession),
                    "{:?} -> {:?} without persisting", session, result.session
                );
            }
        }
    }

    // Invariant 3: Tutorial messages never reach command dispatch
    #[test]
    fn prop_tutorial_ignores_commands(step in arb_step(), text in arb_text()) {
        let result = transition(&Session::tutorial(step), &test_context(), Event::message(text)).unwrap();
        prop_assert!(
            !result.effects.iter().any(is_command_effect),
            "Command effect from tutorial: {:?}", result.effects
        );
    }

    // Invariant 4: The tutorial moves forward one stage at a time
    #[test]
    fn prop_tutorial_advances_by_one(step in arb_step(), event in arb_event()) {
        prop_assume!(!matches!(event, Event::Joined));
        if let Ok(result) = transition(&Session::tutorial(step), &test_context(), event) {
            match result.session.state {
                SessionState::Tutorial(next) => {
                    let (from, to) = (step_index(step), step_index(next));
                    prop_assert!(to == from || to == from + 1, "{:?} -> {:?}", step, next);
                }
                SessionState::Idle => prop_assert_eq!(step, TutorialStep::NowSolve),
                SessionState::Playing => prop_assert!(false, "Tutorial jumped to playing"),
            }
        }
    }

    // Invariant 5: Only joining re-enters the tutorial
    #[test]
    fn prop_no_way_back_into_tutorial(
        start in prop_oneof![Just(Session::idle()), (1i64..=7).prop_map(Session::playing)],
        events in proptest::collection::vec(arb_event(), 0..20),
    ) {
        let ctx = test_context();
        let mut session = start;
        for event in events {
            let joined = matches!(event, Event::Joined);
            if let Ok(result) = transition(&session, &ctx, event) {
                session = result.session;
                if joined {
                    prop_assert_eq!(&session, &Session::new_user());
                    break;
                }
                prop_assert!(!session.state.is_tutorial());
            }
        }
    }

    // Invariant 6: Anything but an exact `!next` keeps the user at welcome
    #[test]
    fn prop_welcome_needs_next(text in arb_text()) {
        let session = Session::tutorial(TutorialStep::Welcome);
        let result = transition(&session, &test_context(), Event::message(text.clone())).unwrap();
        if text == "!next" {
            prop_assert_eq!(result.session, Session::tutorial(TutorialStep::Example));
        } else {
            prop_assert_eq!(result.session, session);
        }
    }

    // Invariant 7: Repeated hints never pass the limit and never index past it
    #[test]
    fn prop_hint_counter_is_capped(puzzle_id in 1i64..=7, repeats in 1usize..10) {
        let ctx = test_context();
        let mut session = Session::playing(puzzle_id);
        for _ in 0..repeats {
            let result = transition(&session, &ctx, Event::message("!hint")).unwrap();
            for effect in &result.effects {
                if let Effect::SendHint { index, .. } = effect {
                    prop_assert!(*index <= ctx.max_hints);
                }
            }
            session = result.session;
            prop_assert!(session.hints_given <= ctx.max_hints);
        }
    }

    // Invariant 8: Submitting without an active puzzle never checks the solution
    #[test]
    fn prop_idle_submit_never_evaluates(guess in "[a-zA-Z ]{0,30}") {
        let result = transition(&Session::idle(), &test_context(), Event::message(format!("!submit {guess}"))).unwrap();
        prop_assert!(
            !result.effects.iter().any(|e| matches!(e, Effect::CheckSolution { .. })),
            "unexpected CheckSolution effect"
        );
        prop_assert_eq!(result.session, Session::idle());
    }

    // Invariant 9: Stages gated on an exact command never consult the classifier
    #[test]
    fn prop_exact_gates_skip_classifier(
        step in proptest::sample::select(vec![
            TutorialStep::Welcome,
            TutorialStep::Example,
            TutorialStep::Iceberg,
            TutorialStep::PossibilityTree,
            TutorialStep::Hints,
        ]),
        text in arb_text(),
    ) {
        let result = transition(&Session::tutorial(step), &test_context(), Event::message(text)).unwrap();
        prop_assert!(!result.effects.iter().any(Effect::uses_classifier), "{:?}", result.effects);
    }
}
