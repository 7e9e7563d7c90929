//! # christopher-store
//!
//! Conversation threads for Christopher, kept in memory for the lifetime of
//! the process.
//!
//! ```
//! use christopher_store::ThreadStore;
//!
//! let store = ThreadStore::new();
//! store.record_exchange("t1", "2+2", "math", "Result: 4.0").unwrap();
//!
//! let thread = store.get_thread("t1");
//! assert_eq!(thread[0].sender, "user");
//! assert_eq!(thread[1].sender, "math");
//! assert_eq!(store.list_threads(), vec!["t1"]);
//! ```

pub mod error;
pub mod thread;

// ── re-exports ───────────────────────────────────────────────────────

pub use error::{StoreError, StoreResult};
pub use thread::{ThreadMessage, ThreadStore, USER_SENDER};
