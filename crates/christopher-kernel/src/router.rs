//! Classification-based intent router.
//!
//! The router resolves an input string to exactly one registered handler id
//! and never fails outward.  Each call walks the same short state machine:
//!
//! ```text
//! START -> BUILD_PROMPT -> CLASSIFY -> VALIDATE -> RESOLVED(id)
//!                              │           │
//!                              └─────┬─────┘
//!                                    └──> RESOLVED(default)
//! ```
//!
//! | Anomaly | [`FallbackReason`] |
//! |---------|--------------------|
//! | no candidate besides `default` | `NoCandidates` |
//! | classifier returned an error | `ClassifierFailed` |
//! | classifier exceeded the timeout | `TimedOut` |
//! | classifier panicked | `Panicked` |
//! | returned id is not registered | `UnknownHandler` |
//!
//! Every reason is logged separately but resolves identically to
//! [`DEFAULT_HANDLER_ID`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::classifier::Classifier;
use crate::error::{Result, panic_message};
use crate::registry::{DEFAULT_HANDLER_ID, HandlerRegistry, HandlerSummary};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Router tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// Upper bound on a single classification call.
    pub classify_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            classify_timeout: Duration::from_secs(30),
        }
    }
}

/// Why a routing call fell back to the default handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    NoCandidates,
    ClassifierFailed,
    TimedOut,
    Panicked,
    UnknownHandler,
}

/// The outcome of routing one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// The handler that should serve the request.  Always registered.
    pub handler_id: String,
    /// Set when the router fell back to the default handler.
    pub fallback: Option<FallbackReason>,
}

impl Resolution {
    fn resolved(handler_id: impl Into<String>) -> Self {
        Self {
            handler_id: handler_id.into(),
            fallback: None,
        }
    }

    fn fallback(reason: FallbackReason) -> Self {
        Self {
            handler_id: DEFAULT_HANDLER_ID.to_owned(),
            fallback: Some(reason),
        }
    }

    /// Whether this resolution is a fallback.
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Resolves inputs to handler ids using a [`Classifier`].
pub struct Router {
    registry: Arc<HandlerRegistry>,
    classifier: Arc<dyn Classifier>,
    config: RouterConfig,
}

impl Router {
    /// Create a router over a fully populated registry.
    ///
    /// Fails with [`crate::KernelError::MissingDefaultHandler`] when the
    /// reserved default handler is not registered.
    pub fn new(
        registry: Arc<HandlerRegistry>,
        classifier: Arc<dyn Classifier>,
        config: RouterConfig,
    ) -> Result<Self> {
        registry.ensure_default()?;
        Ok(Self {
            registry,
            classifier,
            config,
        })
    }

    /// The handlers offered to the classifier: every registered handler
    /// except the default one, in registration order.
    pub fn candidates(&self) -> Vec<HandlerSummary> {
        self.registry
            .list()
            .into_iter()
            .filter(|summary| summary.id != DEFAULT_HANDLER_ID)
            .collect()
    }

    /// Resolve `input` to a registered handler id.
    pub async fn route(&self, input: &str) -> Resolution {
        let candidates = self.candidates();
        if candidates.is_empty() {
            return self.fall_back(FallbackReason::NoCandidates);
        }

        let call = AssertUnwindSafe(self.classifier.classify(input, &candidates)).catch_unwind();

        let decision = match tokio::time::timeout(self.config.classify_timeout, call).await {
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.classify_timeout.as_millis() as u64,
                    "classifier timed out"
                );
                return self.fall_back(FallbackReason::TimedOut);
            }
            Ok(Err(payload)) => {
                tracing::error!(panic = %panic_message(payload), "classifier panicked");
                return self.fall_back(FallbackReason::Panicked);
            }
            Ok(Ok(Err(e))) => {
                tracing::warn!(error = %e, "classification failed");
                return self.fall_back(FallbackReason::ClassifierFailed);
            }
            Ok(Ok(Ok(decision))) => decision,
        };

        if !self.registry.contains(&decision.candidate_id) {
            tracing::warn!(candidate_id = %decision.candidate_id, "classifier named an unknown handler");
            return self.fall_back(FallbackReason::UnknownHandler);
        }

        tracing::info!(handler_id = %decision.candidate_id, "request routed");
        Resolution::resolved(decision.candidate_id)
    }

    /// The registry this router validates against.
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    fn fall_back(&self, reason: FallbackReason) -> Resolution {
        tracing::info!(
            handler_id = DEFAULT_HANDLER_ID,
            reason = ?reason,
            "routing fell back to default handler"
        );
        Resolution::fallback(reason)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::classifier::RoutingDecision;
    use crate::error::{ClassifierError, HandlerError, KernelError};
    use crate::handler::{Handler, HandlerContext, HandlerOutput};

    struct Noop;

    #[async_trait]
    impl Handler for Noop {
        fn id(&self) -> &str {
            "noop"
        }

        fn description(&self) -> &str {
            "Does nothing"
        }

        async fn run(
            &self,
            _input: &str,
            _context: &HandlerContext,
        ) -> std::result::Result<HandlerOutput, HandlerError> {
            Ok("".into())
        }
    }

    enum Behaviour {
        Reply(&'static str),
        Fail,
        Hang,
        Panic,
    }

    struct FakeClassifier {
        behaviour: Behaviour,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl FakeClassifier {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Classifier for FakeClassifier {
        async fn classify(
            &self,
            _input: &str,
            candidates: &[HandlerSummary],
        ) -> std::result::Result<RoutingDecision, ClassifierError> {
            self.seen
                .lock()
                .unwrap()
                .push(candidates.iter().map(|c| c.id.clone()).collect());
            match self.behaviour {
                Behaviour::Reply(id) => Ok(RoutingDecision {
                    candidate_id: id.into(),
                }),
                Behaviour::Fail => Err(ClassifierError::EmptyCompletion),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!()
                }
                Behaviour::Panic => panic!("classifier exploded"),
            }
        }
    }

    fn registry(ids: &[&str]) -> Arc<HandlerRegistry> {
        let mut registry = HandlerRegistry::new();
        for id in ids {
            registry
                .register(*id, format!("{id} handler"), Arc::new(Noop))
                .unwrap();
        }
        Arc::new(registry)
    }

    fn router(classifier: Arc<FakeClassifier>) -> Router {
        Router::new(
            registry(&["default", "math", "weather"]),
            classifier,
            RouterConfig {
                classify_timeout: Duration::from_millis(50),
            },
        )
        .unwrap()
    }

    #[test]
    fn new_requires_default_handler() {
        let result = Router::new(
            registry(&["math"]),
            FakeClassifier::new(Behaviour::Reply("math")),
            RouterConfig::default(),
        );
        assert!(matches!(
            result,
            Err(KernelError::MissingDefaultHandler { .. })
        ));
    }

    #[test]
    fn candidates_exclude_default() {
        let router = router(FakeClassifier::new(Behaviour::Fail));
        let ids: Vec<_> = router.candidates().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["math", "weather"]);
    }

    #[tokio::test]
    async fn routes_to_registered_id() {
        let router = router(FakeClassifier::new(Behaviour::Reply("math")));
        let resolution = router.route("2+2").await;
        assert_eq!(resolution.handler_id, "math");
        assert!(!resolution.is_fallback());
    }

    #[tokio::test]
    async fn unknown_id_falls_back() {
        let router = router(FakeClassifier::new(Behaviour::Reply("finance")));
        let resolution = router.route("stock prices").await;
        assert_eq!(resolution.handler_id, "default");
        assert_eq!(resolution.fallback, Some(FallbackReason::UnknownHandler));
    }

    #[tokio::test]
    async fn classifier_error_falls_back() {
        let router = router(FakeClassifier::new(Behaviour::Fail));
        let resolution = router.route("hello").await;
        assert_eq!(resolution.handler_id, "default");
        assert_eq!(resolution.fallback, Some(FallbackReason::ClassifierFailed));
    }

    #[tokio::test]
    async fn classifier_timeout_falls_back() {
        let router = router(FakeClassifier::new(Behaviour::Hang));
        let resolution = router.route("hello").await;
        assert_eq!(resolution.handler_id, "default");
        assert_eq!(resolution.fallback, Some(FallbackReason::TimedOut));
    }

    #[tokio::test]
    async fn classifier_panic_falls_back() {
        let router = router(FakeClassifier::new(Behaviour::Panic));
        let resolution = router.route("hello").await;
        assert_eq!(resolution.handler_id, "default");
        assert_eq!(resolution.fallback, Some(FallbackReason::Panicked));
    }

    #[tokio::test]
    async fn default_only_registry_skips_classifier() {
        let classifier = FakeClassifier::new(Behaviour::Reply("math"));
        let router = Router::new(
            registry(&["default"]),
            classifier.clone(),
            RouterConfig::default(),
        )
        .unwrap();

        let resolution = router.route("anything").await;
        assert_eq!(resolution.fallback, Some(FallbackReason::NoCandidates));
        assert!(classifier.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn explicit_default_choice_is_accepted() {
        let router = router(FakeClassifier::new(Behaviour::Reply("default")));
        let resolution = router.route("hello").await;
        assert_eq!(resolution.handler_id, "default");
        assert!(!resolution.is_fallback());
    }
}
