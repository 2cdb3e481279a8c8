//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID, authentication, session)
//! - Bind server to listener
//! - Dispatch endpoint calls through the access checker

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GuardConfig;
use crate::endpoint::EndpointRegistry;
use crate::http::dispatch::{connect_handler, end_session_handler, session_handler};
use crate::http::middleware::{authentication_middleware, session_middleware, UserDirectory};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::security::checker::AccessChecker;
use crate::session::SessionStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<EndpointRegistry>,
    pub checker: Arc<AccessChecker>,
    pub users: Arc<UserDirectory>,
    pub sessions: SessionStore,
    pub session_cookie: Arc<str>,
}

impl AppState {
    pub fn new(config: &GuardConfig, registry: EndpointRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            checker: Arc::new(AccessChecker::new(config.security.checker_config())),
            users: Arc::new(UserDirectory::from_config(&config.users)),
            sessions: SessionStore::with_idle_timeout(config.security.session_idle_timeout()),
            session_cookie: Arc::from(config.security.session_cookie.as_str()),
        }
    }
}

/// HTTP server guarding endpoint calls.
pub struct GuardServer {
    router: Router,
    state: AppState,
    config: GuardConfig,
}

impl GuardServer {
    /// Create a new server serving the endpoints of `registry`.
    pub fn new(config: GuardConfig, registry: EndpointRegistry) -> Self {
        let state = AppState::new(&config, registry);
        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            state,
            config,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GuardConfig, state: AppState) -> Router {
        Router::new()
            .route("/connect/{endpoint}/{method}", post(connect_handler))
            .route("/session", get(session_handler).delete(end_session_handler))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                session_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                authentication_middleware,
            ))
            .with_state(state)
            .layer(propagate_request_id_layer())
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// The router, for embedding or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Shared state (sessions, checker, registry).
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Run the server until Ctrl+C.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        self.run_until(listener, shutdown_signal()).await
    }

    /// Run the server until `shutdown` completes.
    pub async fn run_until<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            endpoints = self.state.registry.len(),
            csrf_enabled = self.state.checker.config().csrf_enabled,
            mode = ?self.state.checker.config().mode,
            session_idle_secs = self.state.sessions.idle_timeout().as_secs(),
            "HTTP server starting"
        );

        let sweeper = self
            .state
            .sessions
            .spawn_sweeper(self.state.sessions.idle_timeout());

        let served = axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await;
        sweeper.abort();
        served?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
