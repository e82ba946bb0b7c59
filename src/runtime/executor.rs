//! Per-user runtime executor
//!
//! Each user id owns one task that takes turns off a channel and runs them
//! to completion in arrival order, so no two turns for the same user ever
//! interleave their read-modify-write of the session.

use super::traits::{Storage, StoreError};
use super::{SseEvent, Turn, TurnError};

use crate::classifier::Classifier;
use crate::db::Author;
use crate::judge;
use crate::session::Session;
use crate::state_machine::copy;
use crate::state_machine::{transition, BotContext, Effect, Event, Outbound};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Runtime for one user's conversation, generic over storage and classifier
pub struct UserRuntime<S, C>
where
    S: Storage + 'static,
    C: Classifier + ?Sized + 'static,
{
    user_id: String,
    context: BotContext,
    storage: S,
    classifier: Arc<C>,
    turn_rx: mpsc::Receiver<Turn>,
    broadcast_tx: broadcast::Sender<SseEvent>,
}

impl<S, C> UserRuntime<S, C>
where
    S: Storage + 'static,
    C: Classifier + ?Sized + 'static,
{
    pub fn new(
        user_id: impl Into<String>,
        context: BotContext,
        storage: S,
        classifier: Arc<C>,
        turn_rx: mpsc::Receiver<Turn>,
        broadcast_tx: broadcast::Sender<SseEvent>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            context,
            storage,
            classifier,
            turn_rx,
            broadcast_tx,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(user_id = %self.user_id, "Starting user runtime");

        while let Some(Turn { event, reply_tx }) = self.turn_rx.recv().await {
            // A panicking turn fails like any other; the runtime keeps serving
            let replies = match AssertUnwindSafe(self.process_turn(event)).catch_unwind().await {
                Ok(replies) => replies,
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(user_id = %self.user_id, reason = %reason, "Turn panicked");
                    let mut replies = Vec::new();
                    self.fail_turn(format!("Turn panicked: {reason}"), &mut replies).await;
                    replies
                }
            };
            let _ = self.broadcast_tx.send(SseEvent::TurnDone);
            // The caller may have gone away; the replies are logged either way
            let _ = reply_tx.send(replies);
        }

        tracing::info!(user_id = %self.user_id, "User runtime stopped");
    }

    /// Run one turn and collect the replies it sent.
    ///
    /// Errors end the turn with at most one generic reply; an unknown
    /// persisted state drops the message silently.
    async fn process_turn(&self, event: Event) -> Vec<Outbound> {
        let mut replies = Vec::new();
        match self.run_turn(event, &mut replies).await {
            Ok(()) => {}
            Err(TurnError::UnknownState(state)) => {
                tracing::error!(
                    user_id = %self.user_id,
                    state = %state,
                    "Dropping message for session in unknown state"
                );
            }
            Err(e) => {
                match &e {
                    TurnError::MalformedExpression { puzzle_id, reason } => tracing::error!(
                        user_id = %self.user_id,
                        puzzle_id,
                        reason = %reason,
                        "Puzzle checks are malformed; verification aborted"
                    ),
                    other => tracing::error!(user_id = %self.user_id, error = %other, "Turn failed"),
                }
                self.fail_turn(e.to_string(), &mut replies).await;
            }
        }
        replies
    }

    /// Tell subscribers why the turn failed and send the one generic reply
    async fn fail_turn(&self, message: String, replies: &mut Vec<Outbound>) {
        let _ = self.broadcast_tx.send(SseEvent::Error { message });
        if let Err(log_err) = self
            .send_reply(Outbound::text(copy::GENERIC_FAILURE), replies)
            .await
        {
            tracing::error!(error = %log_err, "Failed to log failure reply");
        }
    }

    async fn run_turn(&self, event: Event, replies: &mut Vec<Outbound>) -> Result<(), TurnError> {
        let mut session = match &event {
            Event::Joined | Event::Left => Session::default(),
            Event::Message { text } if text.trim().is_empty() => {
                tracing::debug!(user_id = %self.user_id, "Ignoring empty message");
                return Ok(());
            }
            Event::Message { text } => {
                self.storage
                    .log_message(&self.user_id, text, Author::User)
                    .await?;
                self.storage.get_session(&self.user_id).await?
            }
            _ => self.storage.get_session(&self.user_id).await?,
        };

        // Effects may produce follow-up events; process them in a loop
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            tracing::debug!(
                user_id = %self.user_id,
                state = %session.state,
                event = current_event.kind(),
                "Processing event"
            );

            // Pure state transition
            let result = transition(&session, &self.context, current_event)?;
            session = result.session;

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect, &session, replies).await? {
                    events_to_process.push(generated_event);
                }
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    async fn execute_effect(
        &self,
        effect: Effect,
        session: &Session,
        replies: &mut Vec<Outbound>,
    ) -> Result<Option<Event>, TurnError> {
        match effect {
            Effect::Reply(outbound) => {
                self.send_reply(outbound, replies).await?;
                Ok(None)
            }

            Effect::Pause(delay) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(None)
            }

            Effect::PersistSession => {
                self.storage.put_session(&self.user_id, session).await?;
                tracing::info!(
                    user_id = %self.user_id,
                    state = %session.state,
                    puzzle_id = session.puzzle_id,
                    hints_given = session.hints_given,
                    "Session persisted"
                );
                let _ = self.broadcast_tx.send(SseEvent::SessionChanged {
                    session: session.clone(),
                });
                Ok(None)
            }

            Effect::DeleteSession => {
                self.storage.delete_session(&self.user_id).await?;
                tracing::info!(user_id = %self.user_id, "Session deleted");
                Ok(None)
            }

            Effect::WarmUpClassifier => {
                if let Err(e) = self.classifier.classify("wake up", "wake up").await {
                    tracing::warn!(error = %e, "Classifier warm-up failed");
                }
                Ok(None)
            }

            Effect::CheckGate { text, target } => {
                let passed = judge::is_message_close(&*self.classifier, &text, target).await?;
                tracing::debug!(user_id = %self.user_id, target, passed, "Checked tutorial gate");
                Ok(Some(Event::GateChecked { text, passed }))
            }

            Effect::AnswerQuestion {
                puzzle_id,
                question,
            } => {
                let puzzle = self.storage.get_puzzle(puzzle_id).await?;
                // A failed answer is reported and the turn goes on
                let text = match judge::answer_question(&*self.classifier, &puzzle.context, &question).await {
                    Ok(answer) => answer.reply_text(),
                    Err(e) => {
                        tracing::error!(user_id = %self.user_id, puzzle_id, error = %e, "Could not answer question");
                        copy::GENERIC_FAILURE
                    }
                };
                self.send_reply(Outbound::text(text), replies).await?;
                Ok(None)
            }

            Effect::CheckSolution { puzzle_id, guess } => {
                let puzzle = self.storage.get_puzzle(puzzle_id).await?;
                let correct = judge::check_solution(&*self.classifier, &puzzle, &guess).await?;
                Ok(Some(Event::SolutionChecked { correct }))
            }

            Effect::LoadPuzzle { puzzle_id } => match self.storage.get_puzzle(puzzle_id).await {
                Ok(puzzle) => Ok(Some(Event::PuzzleLoaded {
                    puzzle_id: puzzle.id,
                    title: puzzle.title,
                    problem: puzzle.problem,
                })),
                Err(StoreError::PuzzleNotFound(_)) => Ok(Some(Event::PuzzleMissing { puzzle_id })),
                Err(e) => Err(e.into()),
            },

            Effect::SendHint { puzzle_id, index } => {
                let puzzle = self.storage.get_puzzle(puzzle_id).await?;
                match puzzle.hint(index) {
                    Some(hint) => self.send_reply(Outbound::text(copy::hint(hint)), replies).await?,
                    None => tracing::warn!(
                        user_id = %self.user_id,
                        puzzle_id,
                        index,
                        available = puzzle.hints.len(),
                        "No hint at this index"
                    ),
                }
                Ok(None)
            }

            Effect::RevealSolution { puzzle_id } => {
                let puzzle = self.storage.get_puzzle(puzzle_id).await?;
                self.send_reply(Outbound::text(puzzle.solution), replies).await?;
                Ok(None)
            }

            Effect::ListPuzzles => {
                let puzzles = self.storage.list_puzzles().await?;
                let listing = copy::puzzle_list(
                    puzzles
                        .iter()
                        .filter(|p| p.is_listed(self.context.max_puzzle_id))
                        .map(|p| (p.id, p.title.as_str())),
                );
                self.send_reply(Outbound::text(listing), replies).await?;
                Ok(None)
            }

            Effect::RecordFeedback { text } => {
                self.storage.record_feedback(&self.user_id, &text).await?;
                tracing::info!(user_id = %self.user_id, "Feedback recorded");
                Ok(None)
            }
        }
    }

    /// Log, broadcast and collect one reply
    async fn send_reply(&self, outbound: Outbound, replies: &mut Vec<Outbound>) -> Result<(), StoreError> {
        self.storage
            .log_message(&self.user_id, &outbound.text, Author::Bot)
            .await?;
        let _ = self.broadcast_tx.send(SseEvent::Reply {
            reply: outbound.clone(),
        });
        replies.push(outbound);
        Ok(())
    }
}
