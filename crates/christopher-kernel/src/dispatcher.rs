//! Handler dispatch.
//!
//! The [`Dispatcher`] invokes a resolved handler and turns whatever happens
//! into a [`DispatchResult`].  Handler errors and panics are caught here and
//! reported as `failed = true` with a safe message; a lookup miss (which the
//! router makes impossible in correct operation) is logged as an internal
//! consistency fault and answered with a generic apology.  Nothing escapes
//! [`Dispatcher::dispatch`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::error::{HandlerError, KernelError, Result, panic_message};
use crate::handler::HandlerContext;
use crate::registry::HandlerRegistry;

/// Text returned when the dispatcher cannot even reach a handler.
pub const GENERIC_FAILURE_TEXT: &str =
    "Sorry, something went wrong while handling your request. Please try again.";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Dispatcher options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Include the handler's raw error text in failure replies.
    ///
    /// Off by default: error text can carry upstream URLs, status bodies or
    /// other details that should not reach the caller.
    pub expose_errors: bool,
}

/// The text produced for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub text: String,
    pub failed: bool,
}

impl DispatchResult {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            failed: false,
        }
    }

    pub fn failed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            failed: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Invokes registered handlers and contains their failures.
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>, config: DispatcherConfig) -> Self {
        Self { registry, config }
    }

    /// Run `handler_id` on `input` and return its normalized text.
    ///
    /// Never fails: every error is converted into a failed
    /// [`DispatchResult`] with non-empty text.
    pub async fn dispatch(
        &self,
        handler_id: &str,
        input: &str,
        context: &HandlerContext,
    ) -> DispatchResult {
        match self.try_dispatch(handler_id, input, context).await {
            Ok(text) => DispatchResult::ok(text),
            Err(err) => self.contain(err),
        }
    }

    /// Run the handler and surface failures as typed errors.
    ///
    /// Returns [`KernelError::InternalConsistency`] on a lookup miss and
    /// [`KernelError::HandlerRuntime`] when the handler errors or panics.
    pub async fn try_dispatch(
        &self,
        handler_id: &str,
        input: &str,
        context: &HandlerContext,
    ) -> Result<String> {
        let record =
            self.registry
                .lookup(handler_id)
                .ok_or_else(|| KernelError::InternalConsistency {
                    handler_id: handler_id.to_owned(),
                })?;

        tracing::debug!(handler_id = %handler_id, "dispatching");

        let outcome = AssertUnwindSafe(record.handler.run(input, context))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(HandlerError::Panicked(panic_message(payload))));

        match outcome {
            Ok(output) => Ok(output.into_text()),
            Err(source) => Err(KernelError::HandlerRuntime {
                handler_id: handler_id.to_owned(),
                source,
            }),
        }
    }

    fn contain(&self, err: KernelError) -> DispatchResult {
        match err {
            KernelError::HandlerRuntime { handler_id, source } => {
                tracing::error!(handler_id = %handler_id, error = %source, "handler failed");
                let text = if self.config.expose_errors {
                    format!("Error: {source}")
                } else {
                    format!("The {handler_id} handler could not complete this request.")
                };
                DispatchResult::failed(text)
            }
            other => {
                tracing::error!(error = %other, "dispatch invariant violated");
                DispatchResult::failed(GENERIC_FAILURE_TEXT)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
