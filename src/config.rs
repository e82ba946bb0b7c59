//! Environment-driven configuration

use crate::classifier::ClassifierConfig;
use crate::state_machine::{BotContext, Pacing};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_PACING_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub db_path: PathBuf,
    pub port: u16,
    /// Catalog imported (upserted) at start
    pub puzzles_path: Option<PathBuf>,
    pub context: BotContext,
    pub classifier: ClassifierConfig,
}

impl BotConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparseable values fall back to defaults
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str| get(key).and_then(|v| v.trim().parse::<i64>().ok());
        let defaults = BotContext::default();

        let db_path = get("UM_DB_PATH").filter(|p| !p.is_empty()).map_or_else(
            || {
                let home = get("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".um-bot").join("um.db")
            },
            PathBuf::from,
        );

        let port = get("UM_PORT")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let pacing_ms = parsed("UM_PACING_MS")
            .and_then(|ms| u64::try_from(ms).ok())
            .unwrap_or(DEFAULT_PACING_MS);

        let context = BotContext {
            pacing: Pacing::from_beat(Duration::from_millis(pacing_ms)),
            max_hints: parsed("UM_MAX_HINTS")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.max_hints),
            max_puzzle_id: parsed("UM_MAX_PUZZLE_ID")
                .filter(|n| *n >= 1)
                .unwrap_or(defaults.max_puzzle_id),
        };

        Self {
            db_path,
            port,
            puzzles_path: get("UM_PUZZLES_PATH")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            context,
            classifier: ClassifierConfig::from_lookup(&get),
        }
    }
}
