//! Web server setup and startup.
//!
//! [`WebServer`] composes the Axum router, registers all routes, and starts
//! the HTTP listener.

use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use axum::routing::{get, post};
use christopher_kernel::Pipeline;
use christopher_store::ThreadStore;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::WebConfig;
use crate::api;
use crate::state::AppState;

/// The Christopher web server.
pub struct WebServer {
    config: WebConfig,
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a new web server over a ready pipeline and thread store.
    pub fn new(config: WebConfig, pipeline: Arc<Pipeline>, threads: ThreadStore) -> Self {
        let state = Arc::new(AppState { pipeline, threads });
        Self { config, state }
    }

    /// Return the `host:port` string this server will bind to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.bind_addr, self.config.port)
    }

    /// Build the Axum router with all routes registered.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any);

        Router::new()
            .route("/chat", post(api::chat))
            .route("/threads", get(api::list_threads))
            .route("/thread/{id}", get(api::get_thread))
            .route("/handlers", get(api::handlers))
            .route("/health", get(api::health))
            .layer(cors)
            .with_state(Arc::clone(&self.state))
    }

    /// Serve on an already bound listener until the server stops.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        let router = self.router();
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(addr = %addr, handlers = self.state.pipeline.registry().len(), "starting web server");
        }
        axum::serve(listener, router).await
    }

    /// Bind the configured address and serve until the server stops.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound.
    pub async fn start(self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.addr()).await?;
        self.serve(listener).await
    }
}
