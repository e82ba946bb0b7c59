//! Puzzle reference data

pub mod expr;

#[cfg(test)]
mod proptests;

pub use expr::{evaluate, Expr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Puzzle id that is stored but never listed or playable
pub const RESERVED_PUZZLE_ID: i64 = 0;

/// A situation puzzle. Immutable once imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Puzzle {
    pub id: i64,
    pub title: String,
    pub problem: String,
    #[serde(default)]
    pub hints: Vec<String>,
    pub solution: String,
    /// Full story, used as the premise when answering questions
    pub context: String,
    /// Correctness predicate for submitted solutions
    pub checks: Expr,
}

impl Puzzle {
    /// Hint at `index`, if the puzzle has that many
    pub fn hint(&self, index: u32) -> Option<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.hints.get(i))
            .map(String::as_str)
    }

    pub fn is_listed(&self, max_id: i64) -> bool {
        self.id > RESERVED_PUZZLE_ID && self.id <= max_id
    }
}

/// Parse a catalog file (a JSON array of puzzles).
///
/// Each record is validated on its own; a malformed record is returned as an
/// error next to its position instead of failing the whole catalog.
pub fn parse_catalog(json: &str) -> Result<Vec<Result<Puzzle, String>>, serde_json::Error> {
    let records: Vec<Value> = serde_json::from_str(json)?;
    Ok(records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            serde_json::from_value::<Puzzle>(record)
                .map_err(|e| format!("record {index}: {e}"))
        })
        .collect())
}
