//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::db::{Author, Database, DbError};
use crate::puzzle::Puzzle;
use crate::session::Session;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Failure at the storage boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Unknown session state: {0}")]
    UnknownState(String),
    #[error("Puzzle not found: {0}")]
    PuzzleNotFound(i64),
    #[error("Malformed puzzle {id}: {reason}")]
    MalformedPuzzle { id: i64, reason: String },
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::SessionNotFound(user_id) => StoreError::SessionNotFound(user_id),
            DbError::UnknownState(state) => StoreError::UnknownState(state.0),
            DbError::PuzzleNotFound(id) => StoreError::PuzzleNotFound(id),
            DbError::MalformedPuzzle { id, reason } => StoreError::MalformedPuzzle { id, reason },
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Per-user session records
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_session(&self, user_id: &str) -> Result<Session, StoreError>;

    /// Create or overwrite (last write wins)
    async fn put_session(&self, user_id: &str, session: &Session) -> Result<(), StoreError>;

    /// Deleting a missing session is not an error
    async fn delete_session(&self, user_id: &str) -> Result<(), StoreError>;
}

/// Puzzle reference data
#[async_trait]
pub trait PuzzleStore: Send + Sync {
    /// Puzzles with id > 0, ordered by id
    async fn list_puzzles(&self) -> Result<Vec<Puzzle>, StoreError>;

    async fn get_puzzle(&self, id: i64) -> Result<Puzzle, StoreError>;
}

/// Append-only conversation log and feedback
#[async_trait]
pub trait MessageLog: Send + Sync {
    async fn log_message(&self, user_id: &str, text: &str, author: Author) -> Result<(), StoreError>;

    async fn record_feedback(&self, user_id: &str, text: &str) -> Result<(), StoreError>;
}

/// Combined storage trait for convenience
pub trait Storage: SessionStore + PuzzleStore + MessageLog {}
impl<T: SessionStore + PuzzleStore + MessageLog> Storage for T {}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn get_session(&self, user_id: &str) -> Result<Session, StoreError> {
        (**self).get_session(user_id).await
    }

    async fn put_session(&self, user_id: &str, session: &Session) -> Result<(), StoreError> {
        (**self).put_session(user_id, session).await
    }

    async fn delete_session(&self, user_id: &str) -> Result<(), StoreError> {
        (**self).delete_session(user_id).await
    }
}

#[async_trait]
impl<T: PuzzleStore + ?Sized> PuzzleStore for Arc<T> {
    async fn list_puzzles(&self) -> Result<Vec<Puzzle>, StoreError> {
        (**self).list_puzzles().await
    }

    async fn get_puzzle(&self, id: i64) -> Result<Puzzle, StoreError> {
        (**self).get_puzzle(id).await
    }
}

#[async_trait]
impl<T: MessageLog + ?Sized> MessageLog for Arc<T> {
    async fn log_message(&self, user_id: &str, text: &str, author: Author) -> Result<(), StoreError> {
        (**self).log_message(user_id, text, author).await
    }

    async fn record_feedback(&self, user_id: &str, text: &str) -> Result<(), StoreError> {
        (**self).record_feedback(user_id, text).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as Storage
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Underlying database, for reads outside the turn loop
    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl SessionStore for DatabaseStorage {
    async fn get_session(&self, user_id: &str) -> Result<Session, StoreError> {
        Ok(self.db.get_session(user_id)?)
    }

    async fn put_session(&self, user_id: &str, session: &Session) -> Result<(), StoreError> {
        Ok(self.db.put_session(user_id, session)?)
    }

    async fn delete_session(&self, user_id: &str) -> Result<(), StoreError> {
        self.db.delete_session(user_id)?;
        Ok(())
    }
}

#[async_trait]
impl PuzzleStore for DatabaseStorage {
    async fn list_puzzles(&self) -> Result<Vec<Puzzle>, StoreError> {
        Ok(self.db.list_puzzles()?)
    }

    async fn get_puzzle(&self, id: i64) -> Result<Puzzle, StoreError> {
        Ok(self.db.get_puzzle(id)?)
    }
}

#[async_trait]
impl MessageLog for DatabaseStorage {
    async fn log_message(&self, user_id: &str, text: &str, author: Author) -> Result<(), StoreError> {
        self.db.log_message(user_id, text, author)?;
        Ok(())
    }

    async fn record_feedback(&self, user_id: &str, text: &str) -> Result<(), StoreError> {
        self.db.add_feedback(user_id, text)?;
        Ok(())
    }
}
