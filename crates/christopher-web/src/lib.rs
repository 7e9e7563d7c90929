//! HTTP API for Christopher.
//!
//! Exposes the route-then-dispatch pipeline and the conversation store as a
//! small JSON API:
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `POST` | `/chat` | Route and answer one message, optionally recording it in a thread |
//! | `GET` | `/threads` | List thread ids |
//! | `GET` | `/thread/{id}` | Messages of one thread |
//! | `GET` | `/handlers` | Registered handlers |
//! | `GET` | `/health` | Liveness and handler count |

pub mod api;
pub mod server;
pub mod state;

pub use server::WebServer;
pub use state::AppState;

/// Web server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 8000,
        }
    }
}
