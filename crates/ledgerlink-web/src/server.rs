//! Main web server setup and startup.
//!
//! [`router`] composes the Axum router: correlation ids on every request,
//! a permissive CORS layer, and the session guard on protected routes.
//! [`WebServer`] binds the listener and serves until shutdown.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::http::HeaderName;
use axum::middleware;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::WebConfig;
use crate::api;
use crate::guard;
use crate::state::AppState;
use crate::telemetry;

/// Build the Axum router with all routes registered.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(telemetry::CORRELATION_ID_HEADER)]);

    let protected = Router::new()
        .route("/session/protected-resource", get(api::transactions))
        .route("/api/transactions", get(api::transactions))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            guard::require_session,
        ));

    Router::new()
        .route("/health", get(api::health))
        .route("/session/exchange", post(api::exchange))
        .route("/api/exchange_public_token", post(api::exchange))
        .route("/api/create_link_token", post(api::create_link_token))
        .merge(protected)
        .layer(middleware::from_fn(telemetry::correlation_layer))
        .layer(cors)
        .with_state(state)
}

/// The Ledgerlink HTTP server.
pub struct WebServer {
    config: WebConfig,
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: WebConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Return the `host:port` string this server will bind to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.bind_addr, self.config.port)
    }

    /// Start the server and serve until `shutdown` resolves.
    ///
    /// In-flight requests are allowed to finish before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound.
    pub async fn start<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.addr();
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(addr = %addr, "starting web server");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("web server stopped");
        Ok(())
    }
}
