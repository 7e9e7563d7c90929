//! Route-then-dispatch pipeline.
//!
//! [`Pipeline`] glues a [`Router`] and a [`Dispatcher`] that share one
//! registry.  It is the single entry point the CLI and the HTTP server use
//! for a user message.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::classifier::Classifier;
use crate::dispatcher::{DispatchResult, Dispatcher, DispatcherConfig};
use crate::error::Result;
use crate::handler::HandlerContext;
use crate::registry::HandlerRegistry;
use crate::router::{FallbackReason, Router, RouterConfig};

/// Everything known about one handled message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// The handler that produced `result`.
    pub handler_id: String,
    /// Set when routing fell back to the default handler.
    pub fallback: Option<FallbackReason>,
    pub result: DispatchResult,
}

/// Routes a message and runs the chosen handler.
pub struct Pipeline {
    router: Router,
    dispatcher: Dispatcher,
}

impl Pipeline {
    /// Build a pipeline over a fully populated registry.
    pub fn new(
        registry: Arc<HandlerRegistry>,
        classifier: Arc<dyn Classifier>,
        router_config: RouterConfig,
        dispatcher_config: DispatcherConfig,
    ) -> Result<Self> {
        let router = Router::new(Arc::clone(&registry), classifier, router_config)?;
        let dispatcher = Dispatcher::new(registry, dispatcher_config);
        Ok(Self { router, dispatcher })
    }

    /// Route `input`, dispatch it and return the outcome.  Never fails.
    pub async fn run(&self, input: &str, context: &HandlerContext) -> Reply {
        let resolution = self.router.route(input).await;
        let result = self
            .dispatcher
            .dispatch(&resolution.handler_id, input, context)
            .await;

        tracing::info!(
            handler_id = %resolution.handler_id,
            fallback = resolution.is_fallback(),
            failed = result.failed,
            "message handled"
        );

        Reply {
            handler_id: resolution.handler_id,
            fallback: resolution.fallback,
            result,
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        self.router.registry()
    }
}
