//! Mock implementations for testing
//!
//! These mocks enable end-to-end turns without a database or a hosted model.

use super::traits::*;
use super::BotRuntime;
use crate::classifier::{pair_prompt, Classifier, ClassifierError, Label};
use crate::db::Author;
use crate::judge::question_prompt;
use crate::puzzle::expr::leaf_prompt;
use crate::puzzle::{Expr, Puzzle};
use crate::session::Session;
use crate::state_machine::{BotContext, Outbound, Pacing};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock Classifier
// ============================================================================

/// Classifier answering from a prompt -> label script.
///
/// Unscripted prompts fail as if the model were unreachable.
#[derive(Default)]
pub struct MockClassifier {
    script: Mutex<HashMap<String, Label>>,
    /// Prompts that fail with a retryable error this many more times
    flaky: Mutex<HashMap<String, u32>>,
    /// Every prompt received, in order
    pub prompts: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MockClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, prompt: impl Into<String>, label: Label) -> &Self {
        self.script.lock().unwrap().insert(prompt.into(), label);
        self
    }

    /// Script a Q&A answer about a story
    pub fn answer(&self, context: &str, question: &str, label: Label) -> &Self {
        self.script(question_prompt(context, question), label)
    }

    /// Script a tutorial gate judgement
    pub fn gate(&self, message: &str, target: &str, label: Label) -> &Self {
        self.script(pair_prompt(message, target), label)
    }

    /// Script one leaf of a solution check
    pub fn leaf(&self, guess: &str, assertion: &str, label: Label) -> &Self {
        self.script(leaf_prompt(guess, assertion), label)
    }

    /// Fail `prompt` with a retryable server error `times` times before answering
    pub fn fail_first(&self, prompt: impl Into<String>, times: u32) -> &Self {
        self.flaky.lock().unwrap().insert(prompt.into(), times);
        self
    }

    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify_raw(&self, prompt: &str) -> Result<Label, ClassifierError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(remaining) = self.flaky.lock().unwrap().get_mut(prompt) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ClassifierError::server_error("Transient failure").with_retry_after(Duration::ZERO));
            }
        }
        self.script
            .lock()
            .unwrap()
            .get(prompt)
            .cloned()
            .ok_or_else(|| ClassifierError::unavailable(format!("No label scripted for: {prompt}")))
    }

    fn model_id(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// In-Memory Storage
// ============================================================================

/// In-memory storage for testing
#[derive(Default)]
pub struct InMemoryStorage {
    sessions: Mutex<HashMap<String, Session>>,
    puzzles: Mutex<HashMap<i64, Puzzle>>,
    /// Users whose stored state no longer parses
    corrupt: Mutex<HashSet<String>>,
    pub log: Mutex<Vec<(String, Author, String)>>,
    pub feedback: Mutex<Vec<(String, String)>>,
}

#[allow(dead_code)]
impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_puzzles(puzzles: impl IntoIterator<Item = Puzzle>) -> Self {
        let storage = Self::new();
        storage
            .puzzles
            .lock()
            .unwrap()
            .extend(puzzles.into_iter().map(|p| (p.id, p)));
        storage
    }

    pub fn session(&self, user_id: &str) -> Option<Session> {
        self.sessions.lock().unwrap().get(user_id).cloned()
    }

    pub fn set_session(&self, user_id: &str, session: Session) {
        self.sessions
            .lock()
            .unwrap()
            .insert(user_id.to_string(), session);
    }

    /// Make the user's stored state unreadable
    pub fn corrupt_session(&self, user_id: &str) {
        self.corrupt.lock().unwrap().insert(user_id.to_string());
    }

    pub fn logged(&self, user_id: &str) -> Vec<(Author, String)> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(uid, _, _)| uid == user_id)
            .map(|(_, author, text)| (*author, text.clone()))
            .collect()
    }
}

#[async_trait]
impl SessionStore for InMemoryStorage {
    async fn get_session(&self, user_id: &str) -> Result<Session, StoreError> {
        if self.corrupt.lock().unwrap().contains(user_id) {
            return Err(StoreError::UnknownState("dancing".to_string()));
        }
        self.session(user_id)
            .ok_or_else(|| StoreError::SessionNotFound(user_id.to_string()))
    }

    async fn put_session(&self, user_id: &str, session: &Session) -> Result<(), StoreError> {
        self.set_session(user_id, session.clone());
        Ok(())
    }

    async fn delete_session(&self, user_id: &str) -> Result<(), StoreError> {
        self.sessions.lock().unwrap().remove(user_id);
        Ok(())
    }
}

#[async_trait]
impl PuzzleStore for InMemoryStorage {
    async fn list_puzzles(&self) -> Result<Vec<Puzzle>, StoreError> {
        let mut puzzles: Vec<_> = self
            .puzzles
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.id > 0)
            .cloned()
            .collect();
        puzzles.sort_by_key(|p| p.id);
        Ok(puzzles)
    }

    async fn get_puzzle(&self, id: i64) -> Result<Puzzle, StoreError> {
        self.puzzles
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(StoreError::PuzzleNotFound(id))
    }
}

#[async_trait]
impl MessageLog for InMemoryStorage {
    async fn log_message(&self, user_id: &str, text: &str, author: Author) -> Result<(), StoreError> {
        self.log
            .lock()
            .unwrap()
            .push((user_id.to_string(), author, text.to_string()));
        Ok(())
    }

    async fn record_feedback(&self, user_id: &str, text: &str) -> Result<(), StoreError> {
        self.feedback
            .lock()
            .unwrap()
            .push((user_id.to_string(), text.to_string()));
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub const JUMPER_CONTEXT: &str = "A person jumped out of a plane without a parachute and landed on a huge haystack. \
They were not married. They survived because the hay broke their fall.";

/// Tutorial puzzle (id 1)
pub fn jumper_puzzle() -> Puzzle {
    Puzzle {
        id: 1,
        title: "🪂 Lucky jumper".to_string(),
        problem: "A person jumped out of a plane without a parachute and survived.".to_string(),
        hints: vec![
            "The person landed on something soft.".to_string(),
            "It was on a farm.".to_string(),
        ],
        solution: "The person landed on a haystack.".to_string(),
        context: JUMPER_CONTEXT.to_string(),
        checks: Expr::and(vec![
            Expr::leaf("The person landed on hay"),
            Expr::or(vec![
                Expr::leaf("The hay broke the fall"),
                Expr::leaf("The hay was soft"),
            ]),
        ]),
    }
}

pub const ELEVATOR_CONTEXT: &str = "A short man lives on the tenth floor. He can only reach the seventh floor button.";

pub fn elevator_puzzle() -> Puzzle {
    Puzzle {
        id: 2,
        title: "🛗 The elevator".to_string(),
        problem: "A man rides the elevator to the seventh floor and walks the rest of the way.".to_string(),
        hints: vec!["It has to do with his height.".to_string()],
        solution: "He is too short to press the button for the tenth floor.".to_string(),
        context: ELEVATOR_CONTEXT.to_string(),
        checks: Expr::leaf("The man is short"),
    }
}

/// Stored but never listed
pub fn reserved_puzzle() -> Puzzle {
    Puzzle {
        id: 0,
        title: "Reserved".to_string(),
        problem: "Not for players.".to_string(),
        hints: Vec::new(),
        solution: "None.".to_string(),
        context: "None.".to_string(),
        checks: Expr::leaf("nothing"),
    }
}

// ============================================================================
// Harness
// ============================================================================

type TestRuntime = BotRuntime<Arc<InMemoryStorage>, MockClassifier>;

/// A bot with in-memory storage, a scripted classifier and no pacing
pub struct TestBot {
    pub runtime: TestRuntime,
    pub storage: Arc<InMemoryStorage>,
    pub classifier: Arc<MockClassifier>,
}

impl TestBot {
    pub fn new() -> Self {
        let storage = Arc::new(InMemoryStorage::with_puzzles([
            reserved_puzzle(),
            jumper_puzzle(),
            elevator_puzzle(),
        ]));
        let classifier = Arc::new(MockClassifier::new());
        let context = BotContext {
            pacing: Pacing::none(),
            ..BotContext::default()
        };
        Self {
            runtime: BotRuntime::new(storage.clone(), classifier.clone(), context),
            storage,
            classifier,
        }
    }

    pub async fn join(&self, user_id: &str) -> Vec<Outbound> {
        self.runtime.on_user_joined(user_id).await.unwrap()
    }

    /// Send a message and return the reply texts
    pub async fn say(&self, user_id: &str, text: &str) -> Vec<String> {
        self.runtime
            .on_message(user_id, text)
            .await
            .unwrap()
            .into_iter()
            .map(|reply| reply.text)
            .collect()
    }

    pub fn session(&self, user_id: &str) -> Option<Session> {
        self.storage.session(user_id)
    }
}

// ============================================================================
// End-to-end tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::GuardedClassifier;
    use crate::runtime::SseEvent;
    use crate::session::{SessionState, TutorialStep};
    use crate::state_machine::copy;

    const USER: &str = "user-1";

    /// Join and walk the tutorial up to (not through) `now_solve`
    async fn through_privacy(bot: &TestBot) {
        bot.join(USER).await;
        for _ in 0..3 {
            bot.say(USER, "!next").await;
        }
        bot.classifier
            .answer(JUMPER_CONTEXT, "The person had a parachute", Label::Contradicts);
        bot.say(USER, "The person had a parachute").await;
        bot.say(USER, "!next").await;
        bot.classifier
            .answer(JUMPER_CONTEXT, "the person was married", Label::Neutral);
        bot.say(USER, "the person was married").await;
        bot.say(USER, "!submit The person was caught with a net").await;
        bot.say(USER, "!hint").await;
        bot.say(USER, "I agree").await;
        assert_eq!(bot.session(USER), Some(Session::tutorial(TutorialStep::NowSolve)));
    }

    #[tokio::test]
    async fn test_join_starts_tutorial() {
        let bot = TestBot::new();
        let replies = bot.join(USER).await;

        assert_eq!(replies, vec![Outbound::text(copy::WELCOME)]);
        assert_eq!(bot.session(USER), Some(Session::new_user()));
        // Warm-up went out and its failure did not reach the user
        assert_eq!(bot.classifier.recorded_prompts(), vec![pair_prompt("wake up", "wake up")]);
    }

    #[tokio::test]
    async fn test_rejoin_resets_progress() {
        let bot = TestBot::new();
        bot.storage.set_session(USER, Session::playing(2));
        bot.join(USER).await;
        assert_eq!(bot.session(USER), Some(Session::new_user()));
    }

    #[tokio::test]
    async fn test_leave_deletes_session() {
        let bot = TestBot::new();
        bot.join(USER).await;
        let replies = bot.runtime.on_user_left(USER).await.unwrap();
        assert!(replies.is_empty());
        assert_eq!(bot.session(USER), None);
    }

    #[tokio::test]
    async fn test_tutorial_first_stages() {
        let bot = TestBot::new();
        bot.join(USER).await;

        assert_eq!(bot.say(USER, "hello").await, vec![copy::FOLLOW_NEXT]);
        assert_eq!(bot.say(USER, "!next").await, vec![copy::EXAMPLE]);

        let replies = bot.runtime.on_message(USER, "!next").await.unwrap();
        assert_eq!(
            replies,
            vec![Outbound::with_attachment(copy::ICEBERG, copy::ICEBERG_ASSET)]
        );
        assert_eq!(bot.say(USER, "!next").await, vec![copy::FIRST_GUESS]);

        bot.classifier
            .answer(JUMPER_CONTEXT, "The person had a parachute", Label::Contradicts);
        assert_eq!(
            bot.say(USER, "The person had a parachute").await,
            vec!["No", copy::POSSIBILITY_TREE]
        );
        assert_eq!(
            bot.session(USER),
            Some(Session::tutorial(TutorialStep::PossibilityTree))
        );
    }

    #[tokio::test]
    async fn test_fuzzy_gate_consults_classifier() {
        let bot = TestBot::new();
        bot.storage
            .set_session(USER, Session::tutorial(TutorialStep::Irrelevant));

        bot.classifier
            .gate("Were they married?", "The person was married", Label::Neutral);
        assert_eq!(bot.say(USER, "Were they married?").await, vec![copy::TRY_MARRIED]);

        bot.classifier
            .gate("They had a wife", "The person was married", Label::Entails)
            .answer(JUMPER_CONTEXT, "They had a wife", Label::Neutral);
        assert_eq!(
            bot.say(USER, "They had a wife").await,
            vec!["Irrelevant", copy::SUBMIT]
        );
        assert_eq!(bot.session(USER), Some(Session::tutorial(TutorialStep::Submit)));
    }

    #[tokio::test]
    async fn test_commands_are_text_during_tutorial() {
        let bot = TestBot::new();
        bot.join(USER).await;
        assert_eq!(bot.say(USER, "!play 2").await, vec![copy::FOLLOW_NEXT]);
        assert_eq!(bot.session(USER), Some(Session::new_user()));
    }

    #[tokio::test]
    async fn test_tutorial_hint_and_privacy() {
        let bot = TestBot::new();
        bot.storage.set_session(USER, Session::tutorial(TutorialStep::Hints));
        assert_eq!(
            bot.say(USER, "!hint").await,
            vec![copy::hint("The person landed on something soft."), copy::PRIVACY.to_string()]
        );
        assert_eq!(bot.say(USER, "i agree!").await, vec![copy::NOW_SOLVE]);
    }

    #[tokio::test]
    async fn test_complete_tutorial() {
        let bot = TestBot::new();
        through_privacy(&bot).await;

        assert_eq!(bot.say(USER, "!hint").await, vec![copy::TUTORIAL_HINT_DISABLED]);

        let guess = "They landed on hay which broke the fall";
        bot.classifier
            .leaf(guess, "The person landed on hay", Label::Entails)
            .leaf(guess, "The hay broke the fall", Label::Entails)
            .leaf(guess, "The hay was soft", Label::Neutral);
        assert_eq!(
            bot.say(USER, &format!("!submit {guess}")).await,
            vec![copy::CORRECT, copy::TUTORIAL_COMPLETE]
        );
        assert_eq!(bot.session(USER), Some(Session::idle()));
    }

    #[tokio::test]
    async fn test_wrong_tutorial_solution_stays_put() {
        let bot = TestBot::new();
        through_privacy(&bot).await;

        let guess = "They had a parachute after all";
        bot.classifier
            .leaf(guess, "The person landed on hay", Label::Contradicts)
            .leaf(guess, "The hay broke the fall", Label::Neutral)
            .leaf(guess, "The hay was soft", Label::Neutral);
        assert_eq!(bot.say(USER, &format!("!submit {guess}")).await, vec![copy::INCORRECT]);
        assert_eq!(bot.session(USER), Some(Session::tutorial(TutorialStep::NowSolve)));
        // Every leaf was asked even though the first already failed
        let leaves = bot
            .classifier
            .recorded_prompts()
            .into_iter()
            .filter(|p| p.starts_with(guess))
            .count();
        assert_eq!(leaves, 3);
    }

    #[tokio::test]
    async fn test_play_hint_giveup_quit() {
        let bot = TestBot::new();
        let elevator = elevator_puzzle();
        bot.storage.set_session(USER, Session::idle());

        assert_eq!(
            bot.say(USER, "!play 2").await,
            vec![copy::puzzle_intro(&elevator.title, &elevator.problem)]
        );
        assert_eq!(bot.session(USER), Some(Session::playing(2)));
        assert_eq!(bot.say(USER, "!play 1").await, vec![copy::already_playing(2)]);

        assert_eq!(
            bot.say(USER, "!hint").await,
            vec![copy::hint("It has to do with his height.")]
        );
        // The second hint slot is counted but the puzzle has only one hint
        assert!(bot.say(USER, "!hint").await.is_empty());
        assert_eq!(bot.session(USER).map(|s| s.hints_given), Some(2));
        assert_eq!(bot.say(USER, "!hint").await, vec![copy::HINTS_EXHAUSTED]);

        assert_eq!(
            bot.say(USER, "!giveup").await,
            vec![copy::SOLUTION_INTRO, elevator.solution.as_str()]
        );
        assert!(bot.session(USER).is_some_and(|s| s.is_playing()));

        assert_eq!(bot.say(USER, "!quit").await, vec![copy::QUIT]);
        assert_eq!(bot.say(USER, "!quit").await, vec![copy::ALREADY_IDLE]);
    }

    #[tokio::test]
    async fn test_play_missing_or_out_of_range() {
        let bot = TestBot::new();
        bot.storage.set_session(USER, Session::idle());

        assert_eq!(bot.say(USER, "!play 0").await, vec![copy::NO_SUCH_PUZZLE]);
        assert_eq!(bot.say(USER, "!play 99").await, vec![copy::NO_SUCH_PUZZLE]);
        assert_eq!(bot.say(USER, "!play two").await, vec![copy::NO_SUCH_PUZZLE]);
        // In range but not in the catalog
        assert_eq!(bot.say(USER, "!play 5").await, vec![copy::NO_SUCH_PUZZLE]);
        assert_eq!(bot.session(USER), Some(Session::idle()));
    }

    #[tokio::test]
    async fn test_idle_submit_never_calls_classifier() {
        let bot = TestBot::new();
        bot.storage.set_session(USER, Session::idle());

        assert_eq!(bot.say(USER, "!submit the man is short").await, vec![copy::NOT_PLAYING]);
        assert_eq!(bot.classifier.call_count(), 0);
    }

    #[tokio::test]
    async fn test_correct_submit_returns_to_idle() {
        let bot = TestBot::new();
        bot.storage.set_session(USER, Session::playing(2));

        bot.classifier
            .leaf("he is short", "The man is short", Label::Entails)
            .leaf("he is tall", "The man is short", Label::Contradicts);
        assert_eq!(bot.say(USER, "!submit he is tall").await, vec![copy::INCORRECT]);
        assert_eq!(bot.session(USER), Some(Session::playing(2)));
        assert_eq!(bot.say(USER, "!submit he is short").await, vec![copy::CORRECT]);
        assert_eq!(bot.session(USER), Some(Session::idle()));
    }

    #[tokio::test]
    async fn test_questions_while_playing() {
        let bot = TestBot::new();
        bot.storage.set_session(USER, Session::playing(2));

        bot.classifier
            .answer(ELEVATOR_CONTEXT, "Is he short?", Label::Entails)
            .answer(ELEVATOR_CONTEXT, "Is he sad?", Label::Unrecognized("3".to_string()));
        assert_eq!(bot.say(USER, "Is he short?").await, vec!["Yes"]);
        assert_eq!(bot.say(USER, "Is he sad?").await, vec![copy::GENERIC_FAILURE]);
    }

    #[tokio::test]
    async fn test_question_while_idle() {
        let bot = TestBot::new();
        bot.storage.set_session(USER, Session::idle());
        assert_eq!(bot.say(USER, "is it raining").await, vec![copy::SELECT_PUZZLE_FIRST]);
        assert_eq!(bot.classifier.call_count(), 0);
    }

    #[tokio::test]
    async fn test_classifier_outage_gets_one_generic_reply() {
        let bot = TestBot::new();
        bot.storage.set_session(USER, Session::playing(2));

        // Q&A failure is answered inline
        assert_eq!(bot.say(USER, "Is he short?").await, vec![copy::GENERIC_FAILURE]);
        // Solution check failure aborts the turn without a verdict
        assert_eq!(bot.say(USER, "!submit he is short").await, vec![copy::GENERIC_FAILURE]);
        assert_eq!(bot.session(USER), Some(Session::playing(2)));
    }

    #[tokio::test]
    async fn test_unknown_state_is_dropped_silently() {
        let bot = TestBot::new();
        bot.join(USER).await;
        bot.storage.corrupt_session(USER);

        assert!(bot.say(USER, "!next").await.is_empty());
        // Nothing was written over the stored record
        assert_eq!(bot.session(USER), Some(Session::new_user()));
        assert_eq!(bot.storage.logged(USER).last().map(|(author, _)| *author), Some(Author::User));
    }

    #[tokio::test]
    async fn test_missing_session_gets_generic_reply() {
        let bot = TestBot::new();
        assert_eq!(bot.say("stranger", "!puzzles").await, vec![copy::GENERIC_FAILURE]);
        assert_eq!(bot.session("stranger"), None);
    }

    #[tokio::test]
    async fn test_puzzle_listing_skips_reserved() {
        let bot = TestBot::new();
        bot.storage.set_session(USER, Session::idle());

        let replies = bot.say(USER, "!puzzles").await;
        assert_eq!(
            replies,
            vec![copy::puzzle_list([(1, "🪂 Lucky jumper"), (2, "🛗 The elevator")])]
        );
        assert!(!replies[0].contains("Reserved"));
    }

    #[tokio::test]
    async fn test_feedback_and_help() {
        let bot = TestBot::new();
        bot.storage.set_session(USER, Session::playing(2));

        assert_eq!(bot.say(USER, "!feedback love it").await, vec![copy::FEEDBACK_THANKS]);
        assert_eq!(
            *bot.storage.feedback.lock().unwrap(),
            vec![(USER.to_string(), "love it".to_string())]
        );
        assert_eq!(bot.say(USER, "!help").await, vec![copy::HELP]);
        assert_eq!(bot.say(USER, "!dance").await, vec![copy::INVALID_COMMAND]);
    }

    #[tokio::test]
    async fn test_message_log_has_both_sides() {
        let bot = TestBot::new();
        bot.join(USER).await;
        bot.say(USER, "!next").await;
        bot.say(USER, "   ").await;

        assert_eq!(
            bot.storage.logged(USER),
            vec![
                (Author::Bot, copy::WELCOME.to_string()),
                (Author::User, "!next".to_string()),
                (Author::Bot, copy::EXAMPLE.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let bot = TestBot::new();
        bot.join("a").await;
        bot.storage.set_session("b", Session::idle());

        let (a, b) = tokio::join!(bot.say("a", "!next"), bot.say("b", "!play 2"));
        assert_eq!(a, vec![copy::EXAMPLE]);
        assert_eq!(b.len(), 1);
        assert_eq!(bot.session("a").map(|s| s.state), Some(SessionState::Tutorial(TutorialStep::Example)));
        assert_eq!(bot.session("b"), Some(Session::playing(2)));
    }

    #[tokio::test]
    async fn test_turns_for_one_user_are_serialized() {
        let bot = Arc::new(TestBot::new());
        bot.storage.set_session(USER, Session::playing(2));

        let mut tasks = Vec::new();
        for _ in 0..5 {
            let bot = bot.clone();
            tasks.push(tokio::spawn(async move { bot.say(USER, "!hint").await }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        // Two hints counted, three refusals; never more than the limit
        assert_eq!(bot.session(USER).map(|s| s.hints_given), Some(2));
        let exhausted = bot
            .storage
            .logged(USER)
            .into_iter()
            .filter(|(_, text)| text == copy::HINTS_EXHAUSTED)
            .count();
        assert_eq!(exhausted, 3);
    }

    fn unpaced() -> BotContext {
        BotContext {
            pacing: Pacing::none(),
            ..BotContext::default()
        }
    }

    struct PanickingClassifier;

    #[async_trait]
    impl Classifier for PanickingClassifier {
        async fn classify_raw(&self, _prompt: &str) -> Result<Label, ClassifierError> {
            panic!("classifier exploded")
        }

        fn model_id(&self) -> &str {
            "panicking"
        }
    }

    #[tokio::test]
    async fn test_panicking_turn_fails_once_and_runtime_survives() {
        let storage = Arc::new(InMemoryStorage::with_puzzles([elevator_puzzle()]));
        storage.set_session(USER, Session::playing(2));
        let runtime = BotRuntime::new(storage.clone(), Arc::new(PanickingClassifier), unpaced());

        let replies = runtime.on_message(USER, "is he short?").await.unwrap();
        assert_eq!(replies, vec![Outbound::text(copy::GENERIC_FAILURE)]);

        // The same runtime keeps serving the user
        let replies = runtime.on_message(USER, "!help").await.unwrap();
        assert_eq!(replies, vec![Outbound::text(copy::HELP)]);
        assert_eq!(storage.session(USER), Some(Session::playing(2)));
    }

    type GuardedRuntime = BotRuntime<Arc<InMemoryStorage>, GuardedClassifier>;

    fn guarded_bot(mock: &Arc<MockClassifier>) -> (GuardedRuntime, Arc<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::with_puzzles([elevator_puzzle()]));
        storage.set_session(USER, Session::playing(2));
        let inner: Arc<dyn Classifier> = mock.clone();
        let classifier = Arc::new(GuardedClassifier::new(inner, Duration::from_secs(5), 2));
        (BotRuntime::new(storage.clone(), classifier, unpaced()), storage)
    }

    #[tokio::test]
    async fn test_transient_leaf_failure_is_retried_before_verdict() {
        let mock = Arc::new(MockClassifier::new());
        mock.leaf("he is short", "The man is short", Label::Entails)
            .fail_first(leaf_prompt("he is short", "The man is short"), 1);
        let (runtime, storage) = guarded_bot(&mock);

        let replies = runtime.on_message(USER, "!submit he is short").await.unwrap();
        assert_eq!(replies, vec![Outbound::text(copy::CORRECT)]);
        assert_eq!(storage.session(USER), Some(Session::idle()));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_persistent_leaf_failure_gives_no_verdict() {
        let mock = Arc::new(MockClassifier::new());
        mock.leaf("he is short", "The man is short", Label::Entails)
            .fail_first(leaf_prompt("he is short", "The man is short"), 2);
        let (runtime, storage) = guarded_bot(&mock);

        let replies = runtime.on_message(USER, "!submit he is short").await.unwrap();
        assert_eq!(replies, vec![Outbound::text(copy::GENERIC_FAILURE)]);
        assert_eq!(storage.session(USER), Some(Session::playing(2)));
        // One retry, then the turn gives up
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_subscribers_see_turn_events() {
        let bot = TestBot::new();
        let mut rx = bot.runtime.subscribe(USER).await;
        bot.join(USER).await;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event {
                SseEvent::Reply { .. } => "reply",
                SseEvent::SessionChanged { .. } => "session",
                SseEvent::TurnDone => "done",
                SseEvent::Error { .. } => "error",
            });
        }
        assert_eq!(kinds, vec!["session", "reply", "done"]);
    }
}
