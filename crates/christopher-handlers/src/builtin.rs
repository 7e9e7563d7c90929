//! Startup registration of the built-in handlers.
//!
//! [`register_builtins`] walks a static table of known handlers and calls
//! [`HandlerRegistry::register_with`] for each one that is enabled.  The
//! `default` handler is always registered and its failure aborts startup;
//! any other handler that fails to construct (typically a missing API key)
//! is logged and skipped.

use std::sync::Arc;

use christopher_kernel::{DEFAULT_HANDLER_ID, Handler, HandlerRegistry, KernelError, Result};
use christopher_llm::{LlmClient, LlmClientConfig, LlmError};
use serde::Serialize;

use crate::chat::{
    ChatHandler, DEFAULT_DESCRIPTION, PROGRAMMING_DESCRIPTION, PROGRAMMING_ID,
    WRITING_DESCRIPTION, WRITING_ID,
};
use crate::math::{MATH_DESCRIPTION, MATH_ID, MathHandler};
use crate::weather::{WEATHER_DESCRIPTION, WEATHER_ID, WeatherHandler};

/// Optional handlers enabled when nothing else is configured.
pub const DEFAULT_ENABLED: [&str; 4] = [WEATHER_ID, MATH_ID, WRITING_ID, PROGRAMMING_ID];

// ---------------------------------------------------------------------------
// Options and report
// ---------------------------------------------------------------------------

/// What to register and how to reach the chat models.
#[derive(Debug, Clone)]
pub struct BuiltinOptions {
    /// Optional handler ids to register, in order.  `default` is implied.
    pub enabled: Vec<String>,
    pub default_llm: LlmClientConfig,
    pub writing_llm: LlmClientConfig,
    pub programming_llm: LlmClientConfig,
}

impl Default for BuiltinOptions {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_ENABLED.iter().map(|id| (*id).to_owned()).collect(),
            default_llm: LlmClientConfig::ollama("llama3"),
            writing_llm: LlmClientConfig::openai("", "gpt-4"),
            programming_llm: LlmClientConfig::anthropic("", "claude-3-opus-20240229"),
        }
    }
}

/// A handler that was left out at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedHandler {
    pub id: String,
    pub reason: String,
}

/// Outcome of [`register_builtins`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationReport {
    pub registered: Vec<String>,
    pub skipped: Vec<SkippedHandler>,
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

fn chat_handler(
    config: &LlmClientConfig,
    make: fn(LlmClient) -> ChatHandler,
) -> std::result::Result<Arc<dyn Handler>, LlmError> {
    let client = LlmClient::new(config.clone())?;
    Ok(Arc::new(make(client)))
}

/// Register `default` plus every enabled built-in handler.
///
/// Returns an error only when the `default` handler cannot be built.
pub fn register_builtins(
    registry: &mut HandlerRegistry,
    options: &BuiltinOptions,
) -> Result<RegistrationReport> {
    let mut report = RegistrationReport::default();

    registry.register_with(DEFAULT_HANDLER_ID, DEFAULT_DESCRIPTION, || {
        chat_handler(&options.default_llm, ChatHandler::general)
    })?;
    report.registered.push(DEFAULT_HANDLER_ID.to_owned());

    for id in &options.enabled {
        let outcome = match id.as_str() {
            DEFAULT_HANDLER_ID => continue,
            MATH_ID => registry.register(MATH_ID, MATH_DESCRIPTION, Arc::new(MathHandler)),
            WEATHER_ID => {
                registry.register(WEATHER_ID, WEATHER_DESCRIPTION, Arc::new(WeatherHandler))
            }
            WRITING_ID => registry.register_with(WRITING_ID, WRITING_DESCRIPTION, || {
                chat_handler(&options.writing_llm, ChatHandler::writing)
            }),
            PROGRAMMING_ID => {
                registry.register_with(PROGRAMMING_ID, PROGRAMMING_DESCRIPTION, || {
                    chat_handler(&options.programming_llm, ChatHandler::programming)
                })
            }
            unknown => Err(KernelError::InvalidHandler {
                handler_id: unknown.to_owned(),
                reason: "no built-in handler with this id".into(),
            }),
        };

        match outcome {
            Ok(()) => report.registered.push(id.clone()),
            Err(e) => {
                tracing::warn!(handler_id = %id, error = %e, "handler skipped");
                report.skipped.push(SkippedHandler {
                    id: id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        registered = ?report.registered,
        skipped = report.skipped.len(),
        "built-in handlers registered"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed() -> BuiltinOptions {
        BuiltinOptions {
            writing_llm: LlmClientConfig::openai("sk-test", "gpt-4"),
            programming_llm: LlmClientConfig::anthropic("ak-test", "claude-3-opus-20240229"),
            ..BuiltinOptions::default()
        }
    }

    #[test]
    fn registers_everything_with_keys() {
        let mut registry = HandlerRegistry::new();
        let report = register_builtins(&mut registry, &keyed()).unwrap();

        assert!(report.skipped.is_empty());
        assert_eq!(
            registry.ids(),
            vec!["default", "weather", "math", "writing", "programming"]
        );
        registry.ensure_default().unwrap();
    }

    #[test]
    fn missing_keys_skip_only_those_handlers() {
        let mut registry = HandlerRegistry::new();
        let report = register_builtins(&mut registry, &BuiltinOptions::default()).unwrap();

        assert_eq!(report.registered, vec!["default", "weather", "math"]);
        let skipped: Vec<_> = report.skipped.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(skipped, vec!["writing", "programming"]);
        assert!(report.skipped[0].reason.contains("api key"));
        assert!(!registry.contains("writing"));
    }

    #[test]
    fn enabled_list_filters_and_orders() {
        let options = BuiltinOptions {
            enabled: vec!["math".into(), "default".into(), "astrology".into()],
            ..keyed()
        };
        let mut registry = HandlerRegistry::new();
        let report = register_builtins(&mut registry, &options).unwrap();

        assert_eq!(registry.ids(), vec!["default", "math"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].id, "astrology");
    }

    #[test]
    fn broken_default_aborts() {
        let options = BuiltinOptions {
            default_llm: LlmClientConfig::openai("", "gpt-4o-mini"),
            ..keyed()
        };
        let mut registry = HandlerRegistry::new();
        let err = register_builtins(&mut registry, &options).unwrap_err();

        assert!(matches!(err, KernelError::HandlerInit { .. }));
        assert!(registry.is_empty());
    }
}
