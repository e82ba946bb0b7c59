//! Property-based tests for solution checking
//!
//! Any AND/OR tree evaluated through a scripted classifier must agree with
//! plain boolean evaluation of the same tree, and must query every leaf.

use super::expr::{evaluate, leaf_prompt, Expr, Operator};
use crate::classifier::{Classifier, ClassifierError, Label};
use async_trait::async_trait;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

const GUESS: &str = "the man was a diver";

/// Classifier whose answer for each leaf is fixed up front
struct Assigned {
    truths: HashMap<String, bool>,
    calls: AtomicUsize,
}

#[async_trait]
impl Classifier for Assigned {
    async fn classify_raw(&self, prompt: &str) -> Result<Label, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.truths.get(prompt) {
            Some(true) => Ok(Label::Entails),
            Some(false) => Ok(Label::Contradicts),
            None => Err(ClassifierError::server_error("unassigned leaf")),
        }
    }

    fn model_id(&self) -> &str {
        "assigned"
    }
}

fn arb_operator() -> impl Strategy<Value = Operator> {
    prop_oneof![Just(Operator::And), Just(Operator::Or)]
}

/// Trees whose leaves are indices into a truth assignment
fn arb_tree() -> impl Strategy<Value = Expr> {
    let leaf = (0usize..6).prop_map(|i| Expr::leaf(format!("fact {i}")));
    leaf.prop_recursive(4, 32, 4, |inner| {
        (arb_operator(), proptest::collection::vec(inner, 1..4))
            .prop_map(|(op, children)| Expr::Node { op, children })
    })
}

/// Plain boolean evaluation used as the oracle
fn reference(expr: &Expr, assignment: &[bool]) -> bool {
    match expr {
        Expr::Leaf(text) => {
            let index: usize = text.trim_start_matches("fact ").parse().unwrap();
            assignment[index]
        }
        Expr::Node { op, children } => {
            let results: Vec<bool> = children.iter().map(|c| reference(c, assignment)).collect();
            op.combine(&results)
        }
    }
}

fn assigned(assignment: &[bool]) -> Assigned {
    Assigned {
        truths: assignment
            .iter()
            .enumerate()
            .map(|(i, t)| (leaf_prompt(GUESS, &format!("fact {i}")), *t))
            .collect(),
        calls: AtomicUsize::new(0),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_matches_boolean_formula(
        tree in arb_tree(),
        assignment in proptest::collection::vec(any::<bool>(), 6),
    ) {
        let classifier = assigned(&assignment);
        let result = futures::executor::block_on(evaluate(&tree, GUESS, &classifier));
        prop_assert_eq!(result.unwrap(), reference(&tree, &assignment));
    }

    #[test]
    fn prop_every_leaf_is_queried(
        tree in arb_tree(),
        assignment in proptest::collection::vec(any::<bool>(), 6),
    ) {
        let classifier = assigned(&assignment);
        let _ = futures::executor::block_on(evaluate(&tree, GUESS, &classifier));
        prop_assert_eq!(classifier.calls.load(Ordering::SeqCst), tree.leaf_count());
    }
}
