//! Classifier gateway.
//!
//! A [`Classifier`] turns raw user input plus the candidate handlers into a
//! [`RoutingDecision`].  The production implementation,
//! [`CompletionClassifier`], is a thin text-to-id mapper over an external
//! text-completion service ([`CompletionBackend`]):
//!
//! 1. build one prompt enumerating every candidate as `id: description`,
//! 2. call the backend exactly once (no retries here),
//! 3. extract the `id` field from the completion.
//!
//! Registry membership of the returned id is deliberately *not* checked
//! here; the router owns that policy.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::ClassifierError;
use crate::registry::HandlerSummary;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Unvalidated classifier output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// The handler id named by the classifier.
    pub candidate_id: String,
}

/// A single request to the completion backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    /// The full natural-language prompt.
    pub prompt: String,
    /// JSON schema the completion is expected to satisfy.
    pub expected_schema: Value,
}

/// Picks a handler id for an input.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        input: &str,
        candidates: &[HandlerSummary],
    ) -> Result<RoutingDecision, ClassifierError>;
}

/// The external text-completion call behind [`CompletionClassifier`].
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Return the raw completion text for `request`.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ClassifierError>;
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// Schema of the structured answer: `{"id": "<handler id>"}`.
pub fn decision_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": {
                "type": "string",
                "description": "id of the handler to route the request to"
            }
        },
        "required": ["id"]
    })
}

/// Build the classification prompt.
///
/// The output depends only on the candidate order and the input text.
pub fn build_prompt(input: &str, candidates: &[HandlerSummary]) -> String {
    let listing = candidates
        .iter()
        .map(|c| format!("{}: {}", c.id, c.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Route this request to the right handler.\n\
         Available handlers:\n\
         {listing}\n\
         \n\
         Respond with a JSON object of the form {{\"id\": \"<handler id>\"}}.\n\
         Only return the id value of the handler that best matches the request.\n\
         Do not include any other text in your response.\n\
         \n\
         Input: {input}"
    )
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Extract a [`RoutingDecision`] from a raw completion.
///
/// Accepted shapes, after stripping optional markdown code fences:
///
/// - a JSON object with a non-blank string `id` field;
/// - a single bare identifier (letters, digits, `_`, `-`), which some models
///   emit despite being asked for JSON.
pub fn parse_decision(completion: &str) -> Result<RoutingDecision, ClassifierError> {
    let cleaned = strip_code_fence(completion);
    if cleaned.is_empty() {
        return Err(ClassifierError::EmptyCompletion);
    }

    match serde_json::from_str::<Value>(cleaned) {
        Ok(Value::Object(fields)) => {
            let id = fields
                .get("id")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| ClassifierError::Malformed {
                    reason: "missing string field `id`".into(),
                })?;
            Ok(RoutingDecision {
                candidate_id: id.to_owned(),
            })
        }
        Ok(other) => Err(ClassifierError::Malformed {
            reason: format!("expected a JSON object, got `{other}`"),
        }),
        Err(_) if is_bare_identifier(cleaned) => Ok(RoutingDecision {
            candidate_id: cleaned.to_owned(),
        }),
        Err(e) => Err(ClassifierError::Malformed {
            reason: format!("invalid JSON: {e}"),
        }),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let cleaned = text.trim();
    let cleaned = cleaned.strip_prefix("```json").unwrap_or(cleaned);
    let cleaned = cleaned.strip_prefix("```").unwrap_or(cleaned);
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned);
    cleaned.trim()
}

fn is_bare_identifier(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

// ---------------------------------------------------------------------------
// CompletionClassifier
// ---------------------------------------------------------------------------

/// [`Classifier`] backed by a single text-completion call.
#[derive(Clone)]
pub struct CompletionClassifier {
    backend: Arc<dyn CompletionBackend>,
}

impl CompletionClassifier {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Classifier for CompletionClassifier {
    async fn classify(
        &self,
        input: &str,
        candidates: &[HandlerSummary],
    ) -> Result<RoutingDecision, ClassifierError> {
        let request = CompletionRequest {
            prompt: build_prompt(input, candidates),
            expected_schema: decision_schema(),
        };
        tracing::debug!(prompt = %request.prompt, "classification prompt");

        let completion = self.backend.complete(&request).await?;
        tracing::debug!(completion = %completion, "classification completion");

        parse_decision(&completion)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
