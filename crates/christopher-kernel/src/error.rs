//! Kernel error types.
//!
//! Every routing-core subsystem surfaces errors through [`KernelError`].  Only
//! the registration variants ever reach a caller: classifier, consistency and
//! handler-runtime failures are contained by the router and dispatcher and are
//! logged, never propagated.

/// Unified error type for the Christopher routing core.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    // -- Registry errors ----------------------------------------------------
    /// A handler was registered without an id or without a description.
    #[error("invalid handler `{handler_id}`: {reason}")]
    InvalidHandler { handler_id: String, reason: String },

    /// Constructing the handler instance failed at registration time.
    #[error("failed to initialise handler `{handler_id}`: {reason}")]
    HandlerInit { handler_id: String, reason: String },

    /// The reserved fallback handler is not registered.
    #[error("reserved handler `{handler_id}` is not registered")]
    MissingDefaultHandler { handler_id: String },

    // -- Routing errors -----------------------------------------------------
    /// The classifier call failed or returned unusable output.
    #[error("classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    // -- Dispatch errors ----------------------------------------------------
    /// A resolved handler id is not present in the registry at dispatch time.
    #[error("resolved handler `{handler_id}` is not registered")]
    InternalConsistency { handler_id: String },

    /// The invoked handler failed while producing a response.
    #[error("handler `{handler_id}` failed: {source}")]
    HandlerRuntime {
        handler_id: String,
        #[source]
        source: HandlerError,
    },
}

/// Failure of the external classification call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifierError {
    /// The completion backend could not be reached or returned an error.
    #[error("completion request failed: {reason}")]
    Backend { reason: String },

    /// The completion was empty or whitespace only.
    #[error("empty completion")]
    EmptyCompletion,

    /// The completion could not be parsed into a decision.
    #[error("malformed completion: {reason}")]
    Malformed { reason: String },
}

/// Error returned by a handler's `run` contract.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HandlerError {
    /// The handler could not reach its upstream service.
    #[error("upstream call failed: {0}")]
    Upstream(String),

    /// The input cannot be processed by this handler.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The handler panicked while running.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the kernel crate.
pub type Result<T> = std::result::Result<T, KernelError>;

/// Render a caught panic payload as text.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
