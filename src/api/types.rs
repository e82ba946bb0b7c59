//! API request and response types

use crate::db::LoggedMessage;
use crate::session::Session;
use crate::state_machine::Outbound;
use serde::{Deserialize, Serialize};

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

/// Replies produced by one turn, in send order
#[derive(Debug, Serialize, Deserialize)]
pub struct RepliesResponse {
    pub replies: Vec<Outbound>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub session: Session,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<LoggedMessage>,
}

/// Listed puzzle, without its solution or checks
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PuzzleSummary {
    pub id: i64,
    pub title: String,
    pub problem: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PuzzleListResponse {
    pub puzzles: Vec<PuzzleSummary>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
