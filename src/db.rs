//! Database module for the bot
//!
//! Provides persistence for sessions, puzzles, the message log and feedback.

mod schema;

pub use schema::*;

use crate::puzzle::{parse_catalog, Puzzle};
use crate::session::{Session, SessionState, UnknownState};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error(transparent)]
    UnknownState(#[from] UnknownState),
    #[error("Puzzle not found: {0}")]
    PuzzleNotFound(i64),
    #[error("Malformed puzzle {id}: {reason}")]
    MalformedPuzzle { id: i64, reason: String },
    #[error("Database connection lock poisoned")]
    Poisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Session Operations ====================

    /// Load a user's session
    pub fn get_session(&self, user_id: &str) -> DbResult<Session> {
        let conn = self.conn()?;
        let row: Option<(String, i64, u32)> = conn
            .query_row(
                "SELECT state, puzzle_id, hints_given FROM user_sessions WHERE user_id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((state, puzzle_id, hints_given)) = row else {
            return Err(DbError::SessionNotFound(user_id.to_string()));
        };
        Ok(Session {
            state: state.parse::<SessionState>()?,
            puzzle_id,
            hints_given,
        })
    }

    /// Create or overwrite a user's session (last write wins)
    pub fn put_session(&self, user_id: &str, session: &Session) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO user_sessions (user_id, state, puzzle_id, hints_given, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                state = excluded.state,
                puzzle_id = excluded.puzzle_id,
                hints_given = excluded.hints_given,
                updated_at = excluded.updated_at",
            params![
                user_id,
                session.state.name(),
                session.puzzle_id,
                session.hints_given,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Remove a user's session. Returns whether one existed.
    pub fn delete_session(&self, user_id: &str) -> DbResult<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM user_sessions WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(deleted > 0)
    }

    // ==================== Message Log ====================

    /// Append a message to a user's log
    pub fn log_message(&self, user_id: &str, text: &str, author: Author) -> DbResult<LoggedMessage> {
        let conn = self.conn()?;
        let now = Utc::now();
        let message_id = Uuid::new_v4().to_string();

        conn.execute(
            "INSERT INTO messages (message_id, user_id, author, text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![message_id, user_id, author.to_string(), text, now.to_rfc3339()],
        )?;

        Ok(LoggedMessage {
            message_id,
            user_id: user_id.to_string(),
            author,
            text: text.to_string(),
            created_at: now,
        })
    }

    /// A user's log, oldest first
    pub fn get_messages(&self, user_id: &str) -> DbResult<Vec<LoggedMessage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT message_id, user_id, author, text, created_at
             FROM messages WHERE user_id = ?1 ORDER BY rowid ASC",
        )?;

        let rows = stmt.query_map(params![user_id], |row| {
            let author: String = row.get(2)?;
            Ok(LoggedMessage {
                message_id: row.get(0)?,
                user_id: row.get(1)?,
                author: author.parse().unwrap_or(Author::Bot),
                text: row.get(3)?,
                created_at: parse_datetime(&row.get::<_, String>(4)?),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    // ==================== Feedback ====================

    pub fn add_feedback(&self, user_id: &str, text: &str) -> DbResult<Feedback> {
        let conn = self.conn()?;
        let now = Utc::now();
        let feedback_id = Uuid::new_v4().to_string();

        conn.execute(
            "INSERT INTO feedback (feedback_id, user_id, text, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![feedback_id, user_id, text, now.to_rfc3339()],
        )?;

        Ok(Feedback {
            feedback_id,
            user_id: user_id.to_string(),
            text: text.to_string(),
            created_at: now,
        })
    }

    #[allow(dead_code)] // Used in tests
    pub fn get_feedback(&self, user_id: &str) -> DbResult<Vec<Feedback>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT feedback_id, user_id, text, created_at
             FROM feedback WHERE user_id = ?1 ORDER BY rowid ASC",
        )?;

        let rows = stmt.query_map(params![user_id], |row| {
            Ok(Feedback {
                feedback_id: row.get(0)?,
                user_id: row.get(1)?,
                text: row.get(2)?,
                created_at: parse_datetime(&row.get::<_, String>(3)?),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    // ==================== Puzzle Operations ====================

    /// Insert or replace a puzzle
    pub fn upsert_puzzle(&self, puzzle: &Puzzle) -> DbResult<()> {
        let conn = self.conn()?;
        let data = serde_json::to_string(puzzle)?;
        conn.execute(
            "INSERT INTO puzzles (id, title, data, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                data = excluded.data,
                updated_at = excluded.updated_at",
            params![puzzle.id, puzzle.title, data, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Import a JSON array of puzzles. Malformed records are reported and
    /// skipped; a file that is not a JSON array fails as a whole.
    pub fn import_puzzles(&self, json: &str) -> DbResult<ImportReport> {
        let mut report = ImportReport::default();
        for record in parse_catalog(json)? {
            match record {
                Ok(puzzle) => {
                    self.upsert_puzzle(&puzzle)?;
                    report.imported += 1;
                }
                Err(reason) => {
                    tracing::error!(reason = %reason, "Rejected malformed puzzle record");
                    report.rejected.push(reason);
                }
            }
        }
        Ok(report)
    }

    /// Get a puzzle by id, re-validating its stored checks
    pub fn get_puzzle(&self, id: i64) -> DbResult<Puzzle> {
        let conn = self.conn()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM puzzles WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        let data = data.ok_or(DbError::PuzzleNotFound(id))?;
        decode_puzzle(id, &data)
    }

    /// All puzzles except the reserved id 0, ordered by id.
    ///
    /// Rows that no longer decode are logged and left out.
    pub fn list_puzzles(&self) -> DbResult<Vec<Puzzle>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, data FROM puzzles WHERE id != 0 ORDER BY id ASC")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, data)| match decode_puzzle(id, &data) {
                Ok(puzzle) => Some(puzzle),
                Err(e) => {
                    tracing::error!(puzzle_id = id, error = %e, "Skipping unreadable puzzle");
                    None
                }
            })
            .collect())
    }
}

fn decode_puzzle(id: i64, data: &str) -> DbResult<Puzzle> {
    serde_json::from_str(data).map_err(|e| DbError::MalformedPuzzle {
        id,
        reason: e.to_string(),
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
