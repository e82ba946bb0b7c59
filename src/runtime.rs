//! Runtime for executing user turns
//!
//! One task per user id applies turns strictly in arrival order. Different
//! users run concurrently.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::UserRuntime;
pub use traits::*;

use crate::classifier::{Classifier, ClassifierError};
use crate::session::Session;
use crate::state_machine::{BotContext, Event, Outbound, TransitionError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime = BotRuntime<DatabaseStorage, dyn Classifier>;

/// Events sent to SSE clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SseEvent {
    Reply { reply: Outbound },
    SessionChanged { session: Session },
    TurnDone,
    Error { message: String },
}

/// Why a turn stopped early
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Session not found for user {0}")]
    SessionNotFound(String),
    #[error("Unknown session state: {0}")]
    UnknownState(String),
    #[error("Puzzle not found: {0}")]
    PuzzleNotFound(i64),
    #[error("Classifier unavailable: {0}")]
    ClassifierUnavailable(#[from] ClassifierError),
    #[error("Malformed checks for puzzle {puzzle_id}: {reason}")]
    MalformedExpression { puzzle_id: i64, reason: String },
    #[error("Storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl From<StoreError> for TurnError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SessionNotFound(user_id) => TurnError::SessionNotFound(user_id),
            StoreError::UnknownState(state) => TurnError::UnknownState(state),
            StoreError::PuzzleNotFound(id) => TurnError::PuzzleNotFound(id),
            StoreError::MalformedPuzzle { id, reason } => TurnError::MalformedExpression {
                puzzle_id: id,
                reason,
            },
            StoreError::Backend(message) => TurnError::Storage(message),
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Runtime for user {0} has stopped")]
    Stopped(String),
}

/// One inbound event plus the channel its replies go back on
#[derive(Debug)]
pub struct Turn {
    pub event: Event,
    pub reply_tx: oneshot::Sender<Vec<Outbound>>,
}

/// Handle to a running user runtime
#[derive(Clone)]
struct UserHandle {
    turn_tx: mpsc::Sender<Turn>,
    broadcast_tx: broadcast::Sender<SseEvent>,
}

/// Manager for all user runtimes
pub struct BotRuntime<S, C>
where
    S: Storage + Clone + 'static,
    C: Classifier + ?Sized + 'static,
{
    storage: S,
    classifier: Arc<C>,
    context: BotContext,
    users: RwLock<HashMap<String, UserHandle>>,
}

impl<S, C> BotRuntime<S, C>
where
    S: Storage + Clone + 'static,
    C: Classifier + ?Sized + 'static,
{
    pub fn new(storage: S, classifier: Arc<C>, context: BotContext) -> Self {
        Self {
            storage,
            classifier,
            context,
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Get or start the runtime for a user.
    ///
    /// A runtime whose task has ended is replaced; its broadcast sender is
    /// kept so open streams stay attached.
    async fn handle(&self, user_id: &str) -> UserHandle {
        if let Some(handle) = self.users.read().await.get(user_id) {
            if !handle.turn_tx.is_closed() {
                return handle.clone();
            }
        }

        let mut users = self.users.write().await;
        // Another request may have started it while we waited for the lock
        let broadcast_tx = match users.get(user_id) {
            Some(handle) if !handle.turn_tx.is_closed() => return handle.clone(),
            Some(stale) => {
                tracing::warn!(user_id = %user_id, "User runtime had stopped; restarting");
                stale.broadcast_tx.clone()
            }
            None => broadcast::channel(128).0,
        };

        let (turn_tx, turn_rx) = mpsc::channel(32);

        let runtime = UserRuntime::new(
            user_id,
            self.context.clone(),
            self.storage.clone(),
            self.classifier.clone(),
            turn_rx,
            broadcast_tx.clone(),
        );

        let uid = user_id.to_string();
        tokio::spawn(async move {
            runtime.run().await;
            tracing::debug!(user_id = %uid, "User runtime finished");
        });

        let handle = UserHandle {
            turn_tx,
            broadcast_tx,
        };
        users.insert(user_id.to_string(), handle.clone());
        handle
    }

    /// Queue an event behind any earlier turns for this user and wait for its replies
    pub async fn dispatch(&self, user_id: &str, event: Event) -> Result<Vec<Outbound>, DispatchError> {
        let handle = self.handle(user_id).await;
        let (reply_tx, reply_rx) = oneshot::channel();
        handle
            .turn_tx
            .send(Turn { event, reply_tx })
            .await
            .map_err(|_| DispatchError::Stopped(user_id.to_string()))?;
        reply_rx
            .await
            .map_err(|_| DispatchError::Stopped(user_id.to_string()))
    }

    /// A user entered the bot's space; they always start the tutorial fresh
    pub async fn on_user_joined(&self, user_id: &str) -> Result<Vec<Outbound>, DispatchError> {
        self.dispatch(user_id, Event::Joined).await
    }

    /// A user left; their session is deleted and their runtime wound down
    pub async fn on_user_left(&self, user_id: &str) -> Result<Vec<Outbound>, DispatchError> {
        let replies = self.dispatch(user_id, Event::Left).await?;
        // Dropping the last sender ends the task once its queue drains
        self.users.write().await.remove(user_id);
        Ok(replies)
    }

    pub async fn on_message(&self, user_id: &str, text: &str) -> Result<Vec<Outbound>, DispatchError> {
        self.dispatch(user_id, Event::message(text)).await
    }

    /// Subscribe to a user's live updates
    pub async fn subscribe(&self, user_id: &str) -> broadcast::Receiver<SseEvent> {
        self.handle(user_id).await.broadcast_tx.subscribe()
    }

    #[cfg(test)]
    pub async fn has_runtime(&self, user_id: &str) -> bool {
        self.users.read().await.contains_key(user_id)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn context(&self) -> &BotContext {
        &self.context
    }
}
