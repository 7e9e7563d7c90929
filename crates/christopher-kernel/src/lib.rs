//! Christopher routing core.
//!
//! This crate turns a free-text message into a reply by picking one handler
//! out of a registry and running it:
//!
//! - **[`registry`]** -- Named handlers in registration order, with the
//!   reserved `default` id used as the universal fallback.
//! - **[`classifier`]** -- Prompt construction and response parsing around a
//!   single external text-completion call.
//! - **[`router`]** -- Resolves an input to a registered handler id and never
//!   fails; every anomaly collapses to `default`.
//! - **[`dispatcher`]** -- Runs the resolved handler, normalizes its output
//!   and contains its errors and panics.
//! - **[`pipeline`]** -- Route-then-dispatch in one call.
//! - **[`error`]** -- Kernel error types via [`thiserror`].
//!
//! The registry is populated mutably at startup and then shared read-only
//! behind an [`Arc`](std::sync::Arc), so concurrent requests never contend.

pub mod classifier;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod pipeline;
pub mod registry;
pub mod router;

// Re-export the most commonly used types at the crate root for convenience.
pub use classifier::{
    Classifier, CompletionBackend, CompletionClassifier, CompletionRequest, RoutingDecision,
};
pub use dispatcher::{DispatchResult, Dispatcher, DispatcherConfig};
pub use error::{ClassifierError, HandlerError, KernelError, Result};
pub use handler::{Handler, HandlerContext, HandlerOutput};
pub use pipeline::{Pipeline, Reply};
pub use registry::{DEFAULT_HANDLER_ID, HandlerRecord, HandlerRegistry, HandlerSummary};
pub use router::{FallbackReason, Resolution, Router, RouterConfig};
