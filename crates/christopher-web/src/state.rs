//! Shared application state for the web server.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all request
//! handlers.  The pipeline's registry is frozen at startup, so no handler
//! needs a lock to read it.

use std::sync::Arc;

use christopher_kernel::Pipeline;
use christopher_store::ThreadStore;

/// Shared state accessible from every Axum handler.
#[derive(Clone)]
pub struct AppState {
    /// Routes and dispatches chat messages.
    pub pipeline: Arc<Pipeline>,

    /// Conversation threads.
    pub threads: ThreadStore,
}
