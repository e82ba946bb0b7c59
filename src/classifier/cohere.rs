//! Cohere classify endpoint client

use super::{Classifier, ClassifierError, Label};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Hosted fine-tuned classification model
pub struct CohereClassifier {
    client: Client,
    api_key: String,
    model_id: String,
    endpoint: String,
}

impl CohereClassifier {
    pub fn new(api_key: &str, model_id: &str, base_url: &str) -> Result<Self, ClassifierError> {
        // Hard ceiling only; the per-call deadline lives in GuardedClassifier
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ClassifierError::unavailable(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model_id: model_id.to_string(),
            endpoint: format!("{}/v1/classify", base_url.trim_end_matches('/')),
        })
    }

    fn classify_error(status: reqwest::StatusCode, body: &str) -> ClassifierError {
        match status.as_u16() {
            401 | 403 => ClassifierError::auth(format!("Authentication failed: {body}")),
            429 => {
                let mut err = ClassifierError::rate_limit(format!("Rate limited: {body}"));
                // Negative, non-finite or oversized hints are ignored
                if let Some(delay) = serde_json::from_str::<serde_json::Value>(body)
                    .ok()
                    .and_then(|v| v.get("retry_after").and_then(serde_json::Value::as_f64))
                    .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                {
                    err = err.with_retry_after(delay);
                }
                err
            }
            400 => ClassifierError::invalid_request(format!("Invalid request: {body}")),
            500..=599 => ClassifierError::server_error(format!("Server error: {body}")),
            _ => ClassifierError::malformed_response(format!("HTTP {status}: {body}")),
        }
    }
}

/// Pick the most confident label from a classify response
fn most_likely_label(response: ClassifyResponse) -> Result<Label, ClassifierError> {
    let classification = response
        .classifications
        .into_iter()
        .next()
        .ok_or_else(|| ClassifierError::malformed_response("Response carried no classifications"))?;

    let best = classification
        .labels
        .into_iter()
        .filter(|(_, score)| score.confidence.is_finite())
        .max_by(|(_, a), (_, b)| a.confidence.total_cmp(&b.confidence))
        .map(|(label, _)| label)
        .or(classification.prediction)
        .filter(|label| !label.trim().is_empty())
        .ok_or_else(|| ClassifierError::malformed_response("Classification carried no labels"))?;

    Ok(Label::from_raw(&best))
}

#[async_trait]
impl Classifier for CohereClassifier {
    async fn classify_raw(&self, prompt: &str) -> Result<Label, ClassifierError> {
        let request = ClassifyRequest {
            model: &self.model_id,
            inputs: [prompt],
            examples: [],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::timeout(format!("Request timeout: {e}"))
                } else {
                    ClassifierError::network(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClassifierError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::classify_error(status, &body));
        }

        let parsed: ClassifyResponse = serde_json::from_str(&body).map_err(|e| {
            ClassifierError::malformed_response(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        most_likely_label(parsed)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// Cohere API types

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    model: &'a str,
    inputs: [&'a str; 1],
    examples: [(); 0],
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    #[serde(default)]
    classifications: Vec<Classification>,
}

#[derive(Debug, Deserialize)]
struct Classification {
    #[serde(default)]
    prediction: Option<String>,
    #[serde(default)]
    labels: HashMap<String, LabelScore>,
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    confidence: f64,
}
