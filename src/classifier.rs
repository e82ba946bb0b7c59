//! Classifier gateway
//!
//! Wraps the hosted text-classification model that judges guesses. The
//! model is a black box from a prompt to a discrete label; everything else
//! in the bot decides what a label means.

mod cohere;
mod error;

pub use cohere::CohereClassifier;
pub use error::{ClassifierError, ClassifierErrorKind};

use async_trait::async_trait;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_BASE_URL: &str = "https://api.cohere.ai";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_ATTEMPTS: u32 = 2;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
const RETRY_JITTER_MS: u64 = 250;
const MAX_RETRY_HINT: Duration = Duration::from_secs(10);

/// Label returned by the classifier, decoded from its raw string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    /// Premise supports the hypothesis (`0` or `entailment`)
    Entails,
    /// Premise says nothing either way (`1` or `neutral`)
    Neutral,
    /// Premise rules the hypothesis out (`2` or `contradiction`)
    Contradicts,
    /// Anything the model returned that we do not recognise
    Unrecognized(String),
}

impl Label {
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            "0" | "entailment" => Label::Entails,
            "1" | "neutral" => Label::Neutral,
            "2" | "contradiction" => Label::Contradicts,
            other => Label::Unrecognized(other.to_string()),
        }
    }

    pub fn is_entailment(&self) -> bool {
        matches!(self, Label::Entails)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Entails => f.write_str("entails"),
            Label::Neutral => f.write_str("neutral"),
            Label::Contradicts => f.write_str("contradicts"),
            Label::Unrecognized(raw) => write!(f, "unrecognized({raw})"),
        }
    }
}

/// Prompt for a hypothesis/premise pair.
pub fn pair_prompt(premise: &str, hypothesis: &str) -> String {
    format!("mnli hypothesis: {hypothesis} premise: {premise}")
}

/// Common interface for classifier backends
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify a single pre-built prompt
    async fn classify_raw(&self, prompt: &str) -> Result<Label, ClassifierError>;

    /// Classify whether `premise` entails `hypothesis`
    async fn classify(&self, premise: &str, hypothesis: &str) -> Result<Label, ClassifierError> {
        self.classify_raw(&pair_prompt(premise, hypothesis)).await
    }

    /// Get the model ID
    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: Classifier + ?Sized> Classifier for Arc<T> {
    async fn classify_raw(&self, prompt: &str) -> Result<Label, ClassifierError> {
        (**self).classify_raw(prompt).await
    }

    async fn classify(&self, premise: &str, hypothesis: &str) -> Result<Label, ClassifierError> {
        (**self).classify(premise, hypothesis).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// Configuration for the hosted classifier
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub api_key: Option<String>,
    pub model_id: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
    pub max_attempts: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model_id: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ClassifierConfig {
    /// Read `COHERE_*` and `CLASSIFIER_*` keys through `get`
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            api_key: get("COHERE_API_KEY").filter(|k| !k.is_empty()),
            model_id: get("COHERE_MODEL_ID").filter(|m| !m.is_empty()),
            base_url: get("COHERE_BASE_URL")
                .filter(|u| !u.is_empty())
                .unwrap_or(defaults.base_url),
            timeout: get("CLASSIFIER_TIMEOUT_SECS")
                .and_then(|s| s.trim().parse().ok())
                .filter(|secs| *secs >= 1)
                .map_or(defaults.timeout, Duration::from_secs),
            max_attempts: get("CLASSIFIER_MAX_ATTEMPTS")
                .and_then(|s| s.trim().parse().ok())
                .filter(|n| *n >= 1)
                .unwrap_or(defaults.max_attempts),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.model_id.is_some()
    }
}

/// Build the production classifier from configuration.
///
/// Without credentials the bot still runs; every call fails with
/// `Unavailable` so verification is refused rather than guessed.
pub fn from_config(config: &ClassifierConfig) -> Arc<dyn Classifier> {
    let inner: Arc<dyn Classifier> = match (&config.api_key, &config.model_id) {
        (Some(key), Some(model)) => match CohereClassifier::new(key, model, &config.base_url) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                tracing::error!(error = %e, "Failed to build classifier client");
                Arc::new(OfflineClassifier)
            }
        },
        _ => Arc::new(OfflineClassifier),
    };
    Arc::new(GuardedClassifier::new(inner, config.timeout, config.max_attempts))
}

/// Stand-in used when no classifier credentials are configured
pub struct OfflineClassifier;

#[async_trait]
impl Classifier for OfflineClassifier {
    async fn classify_raw(&self, _prompt: &str) -> Result<Label, ClassifierError> {
        Err(ClassifierError::unavailable(
            "No classifier configured. Set COHERE_API_KEY and COHERE_MODEL_ID.",
        ))
    }

    fn model_id(&self) -> &str {
        "offline"
    }
}

/// Deadline, retry and logging wrapper around a classifier backend
pub struct GuardedClassifier {
    inner: Arc<dyn Classifier>,
    model_id: String,
    timeout: Duration,
    max_attempts: u32,
}

impl GuardedClassifier {
    pub fn new(inner: Arc<dyn Classifier>, timeout: Duration, max_attempts: u32) -> Self {
        let model_id = inner.model_id().to_string();
        Self {
            inner,
            model_id,
            timeout,
            max_attempts: max_attempts.max(1),
        }
    }

    async fn attempt(&self, prompt: &str) -> Result<Label, ClassifierError> {
        match tokio::time::timeout(self.timeout, self.inner.classify_raw(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(ClassifierError::timeout(format!(
                "Classifier did not answer within {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl Classifier for GuardedClassifier {
    async fn classify_raw(&self, prompt: &str) -> Result<Label, ClassifierError> {
        let mut attempt = 1;
        loop {
            let start = Instant::now();
            let result = self.attempt(prompt).await;
            let duration = start.elapsed();

            match result {
                Ok(label) => {
                    tracing::info!(
                        model = %self.model_id,
                        duration_ms = %duration.as_millis(),
                        label = %label,
                        attempt,
                        "Classifier request completed"
                    );
                    return Ok(label);
                }
                Err(e) => {
                    let retryable = e.kind.is_retryable();
                    tracing::error!(
                        model = %self.model_id,
                        duration_ms = %duration.as_millis(),
                        error = %e.message,
                        retryable,
                        attempt,
                        "Classifier request failed"
                    );
                    if !retryable || attempt >= self.max_attempts {
                        return Err(e);
                    }
                    tokio::time::sleep(retry_delay(attempt, e.retry_after)).await;
                    attempt += 1;
                }
            }
        }
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Exponential backoff with jitter; a server-provided hint wins.
fn retry_delay(attempt: u32, retry_after: Option<Duration>) -> Duration {
    if let Some(hint) = retry_after {
        return hint.min(MAX_RETRY_HINT);
    }
    let exp = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt.saturating_sub(1));
    let jitter = rand::thread_rng().gen_range(0..=RETRY_JITTER_MS);
    exp + Duration::from_millis(jitter)
}
