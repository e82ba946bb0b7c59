//! Turns classifier labels into game answers
//!
//! Three questions are asked of the classifier: is a free-text question
//! true of the story (Q&A), is a tutorial reply close enough to what we
//! asked for, and does a submitted solution satisfy the puzzle's checks.

use crate::classifier::{Classifier, ClassifierError, Label};
use crate::puzzle::{evaluate, Puzzle};

/// Reply text when the classifier cannot give a usable answer
pub const GENERIC_FAILURE: &str = "Sorry, something went wrong :(";

/// Answer to a yes/no question about the story
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    Irrelevant,
    No,
    /// The model returned a label outside the yes/irrelevant/no set
    Unknown,
}

impl Answer {
    pub fn from_label(label: &Label) -> Self {
        match label {
            Label::Entails => Answer::Yes,
            Label::Neutral => Answer::Irrelevant,
            Label::Contradicts => Answer::No,
            Label::Unrecognized(_) => Answer::Unknown,
        }
    }

    pub fn reply_text(self) -> &'static str {
        match self {
            Answer::Yes => "Yes",
            Answer::Irrelevant => "Irrelevant",
            Answer::No => "No",
            Answer::Unknown => GENERIC_FAILURE,
        }
    }
}

pub fn question_prompt(context: &str, question: &str) -> String {
    format!("{context} mnli {question}")
}

/// Answer `question` using the puzzle's full story as premise.
pub async fn answer_question<C>(
    classifier: &C,
    context: &str,
    question: &str,
) -> Result<Answer, ClassifierError>
where
    C: Classifier + ?Sized,
{
    let label = classifier
        .classify_raw(&question_prompt(context, question))
        .await?;
    if let Label::Unrecognized(raw) = &label {
        tracing::warn!(label = %raw, "Classifier returned an unexpected label");
    }
    Ok(Answer::from_label(&label))
}

/// Lowercase and drop ASCII punctuation.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect()
}

/// Equal once case and punctuation are ignored
pub fn exactly_matches(message: &str, target: &str) -> bool {
    normalize(message) == normalize(target)
}

/// Whether `message` says the same thing as `target`.
///
/// Normalized equality answers without a classifier call; otherwise the
/// message must entail the target.
pub async fn is_message_close<C>(
    classifier: &C,
    message: &str,
    target: &str,
) -> Result<bool, ClassifierError>
where
    C: Classifier + ?Sized,
{
    if exactly_matches(message, target) {
        return Ok(true);
    }
    let label = classifier.classify(message, target).await?;
    Ok(label.is_entailment())
}

/// Check a submitted solution against the puzzle's checks.
pub async fn check_solution<C>(
    classifier: &C,
    puzzle: &Puzzle,
    guess: &str,
) -> Result<bool, ClassifierError>
where
    C: Classifier + ?Sized,
{
    let correct = evaluate(&puzzle.checks, guess, classifier).await?;
    tracing::info!(
        puzzle_id = puzzle.id,
        leaves = puzzle.checks.leaf_count(),
        correct,
        "Checked solution"
    );
    Ok(correct)
}
