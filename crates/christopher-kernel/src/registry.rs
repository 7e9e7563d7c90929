//! Handler registry.
//!
//! The registry maps a handler id to its [`HandlerRecord`].  It is populated
//! once at startup through `&mut self` methods and then frozen behind an
//! [`Arc`]: the router and dispatcher only ever hold `Arc<HandlerRegistry>`,
//! so request handling reads it concurrently without any locking and can
//! never observe a partially built table.
//!
//! Enumeration order is registration order.  Re-registering an id replaces
//! the record in place (last writer wins) and keeps the original position, so
//! the classification prompt built from [`HandlerRegistry::list`] is
//! reproducible for a given registration sequence.
//!
//! # Example
//!
//! ```rust
//! # use std::sync::Arc;
//! # use christopher_kernel::{Handler, HandlerContext, HandlerError, HandlerOutput};
//! # use christopher_kernel::registry::HandlerRegistry;
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl Handler for Echo {
//!     fn id(&self) -> &str { "echo" }
//!     fn description(&self) -> &str { "Repeats the input" }
//!     async fn run(&self, input: &str, _: &HandlerContext) -> Result<HandlerOutput, HandlerError> {
//!         Ok(input.into())
//!     }
//! }
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register("echo", "Repeats the input", Arc::new(Echo)).unwrap();
//!
//! assert!(registry.lookup("echo").is_some());
//! assert_eq!(registry.list()[0].id, "echo");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};
use crate::handler::Handler;

/// Reserved id of the fallback handler.
///
/// It must always be registered, is never offered to the classifier, and is
/// the resolution of every routing anomaly.
pub const DEFAULT_HANDLER_ID: &str = "default";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A registered handler together with its metadata.
#[derive(Clone)]
pub struct HandlerRecord {
    /// Unique identifier the handler is registered under.
    pub id: String,
    /// Capability summary offered to the classifier.
    pub description: String,
    /// The handler instance.
    pub handler: Arc<dyn Handler>,
    /// When the record was created.
    pub registered_at: DateTime<Utc>,
}

impl fmt::Debug for HandlerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRecord")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("registered_at", &self.registered_at)
            .finish_non_exhaustive()
    }
}

impl PartialEq for HandlerRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.description == other.description
            && self.registered_at == other.registered_at
            && Arc::ptr_eq(&self.handler, &other.handler)
    }
}

/// The `(id, description)` view of a record used for prompt construction
/// and listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerSummary {
    pub id: String,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Table of registered handlers, in registration order.
#[derive(Default)]
pub struct HandlerRegistry {
    records: HashMap<String, HandlerRecord>,
    order: Vec<String>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pre-constructed handler under `id`.
    ///
    /// Fails with [`KernelError::InvalidHandler`] when `id` or `description`
    /// is blank; the registry is left untouched in that case.  An existing
    /// record with the same id is replaced.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) -> Result<()> {
        let id = id.into();
        let description = description.into();
        validate(&id, &description)?;
        self.insert(id, description, handler);
        Ok(())
    }

    /// Register a handler using its own [`Handler::id`] and
    /// [`Handler::description`].
    pub fn register_handler(&mut self, handler: Arc<dyn Handler>) -> Result<()> {
        let id = handler.id().to_owned();
        let description = handler.description().to_owned();
        self.register(id, description, handler)
    }

    /// Construct a handler with `build` and register it under `id`.
    ///
    /// Metadata is validated before `build` runs.  A construction failure is
    /// returned as [`KernelError::HandlerInit`] and leaves no record behind
    /// (a previous record under the same id, if any, is kept).
    pub fn register_with<F, E>(
        &mut self,
        id: impl Into<String>,
        description: impl Into<String>,
        build: F,
    ) -> Result<()>
    where
        F: FnOnce() -> std::result::Result<Arc<dyn Handler>, E>,
        E: fmt::Display,
    {
        let id = id.into();
        let description = description.into();
        validate(&id, &description)?;

        let handler = build().map_err(|e| {
            tracing::warn!(handler_id = %id, error = %e, "handler construction failed");
            KernelError::HandlerInit {
                handler_id: id.clone(),
                reason: e.to_string(),
            }
        })?;

        self.insert(id, description, handler);
        Ok(())
    }

    /// Look up a record by id.  Pure read.
    pub fn lookup(&self, id: &str) -> Option<&HandlerRecord> {
        self.records.get(id)
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Every registered `(id, description)` pair in registration order.
    pub fn list(&self) -> Vec<HandlerSummary> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .map(|record| HandlerSummary {
                id: record.id.clone(),
                description: record.description.clone(),
            })
            .collect()
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check that the reserved [`DEFAULT_HANDLER_ID`] is registered.
    pub fn ensure_default(&self) -> Result<()> {
        if self.contains(DEFAULT_HANDLER_ID) {
            Ok(())
        } else {
            Err(KernelError::MissingDefaultHandler {
                handler_id: DEFAULT_HANDLER_ID.to_owned(),
            })
        }
    }

    // -- Private helpers ----------------------------------------------------

    fn insert(&mut self, id: String, description: String, handler: Arc<dyn Handler>) {
        let record = HandlerRecord {
            id: id.clone(),
            description,
            handler,
            registered_at: Utc::now(),
        };

        if self.records.insert(id.clone(), record).is_some() {
            tracing::info!(handler_id = %id, "handler replaced");
        } else {
            tracing::info!(handler_id = %id, "handler registered");
            self.order.push(id);
        }
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.order)
            .finish()
    }
}

fn validate(id: &str, description: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(KernelError::InvalidHandler {
            handler_id: id.to_owned(),
            reason: "id must not be empty".into(),
        });
    }
    if description.trim().is_empty() {
        return Err(KernelError::InvalidHandler {
            handler_id: id.to_owned(),
            reason: "description must not be empty".into(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
