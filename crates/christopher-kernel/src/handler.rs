//! The handler capability contract.
//!
//! Every capability provider (math, weather, chat models, ...) implements
//! [`Handler`].  The routing core only depends on this trait: the registry
//! stores `Arc<dyn Handler>` and the dispatcher calls [`Handler::run`].

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HandlerError;

/// Auxiliary key/value context passed to a handler alongside the input.
pub type HandlerContext = HashMap<String, String>;

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// What a handler produced, before normalization to text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum HandlerOutput {
    /// Plain text, returned unchanged.
    Text(String),
    /// A sequence of text fragments (e.g. model content blocks).
    Fragments(Vec<String>),
    /// Structured output.
    Json(Value),
}

/// Separator placed between [`HandlerOutput::Fragments`] entries.
pub const FRAGMENT_SEPARATOR: &str = " ";

impl HandlerOutput {
    /// Normalize the output to a single string.
    ///
    /// | Variant | Result |
    /// |---------|--------|
    /// | `Text(s)` | `s` |
    /// | `Fragments(v)` | `v` joined with [`FRAGMENT_SEPARATOR`] |
    /// | `Json(String(s))` | `s` |
    /// | `Json(Null)` | empty string |
    /// | `Json(other)` | compact JSON rendering |
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Fragments(fragments) => fragments.join(FRAGMENT_SEPARATOR),
            Self::Json(Value::String(s)) => s,
            Self::Json(Value::Null) => String::new(),
            Self::Json(other) => other.to_string(),
        }
    }
}

impl From<String> for HandlerOutput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for HandlerOutput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Vec<String>> for HandlerOutput {
    fn from(fragments: Vec<String>) -> Self {
        Self::Fragments(fragments)
    }
}

impl From<Value> for HandlerOutput {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A capability provider registered under a unique id.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Unique identifier (e.g. `"math"`).
    fn id(&self) -> &str;

    /// Human-readable capability summary, shown to the classifier.
    fn description(&self) -> &str;

    /// Produce a response for `input`.
    async fn run(
        &self,
        input: &str,
        context: &HandlerContext,
    ) -> std::result::Result<HandlerOutput, HandlerError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
