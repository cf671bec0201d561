//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the session endpoints and the relay catch-all
//! - Wire up middleware (tracing, request ID)
//! - Bind server to listener
//! - Stop supervisors before draining connections on shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, routing::any, Router};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{LimitsConfig, LivenessConfig, RelayConfig};
use crate::http::{dispatch, request::mark_sender_request_id, upgrade};
use crate::lifecycle::Shutdown;
use crate::session::Registry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub liveness: LivenessConfig,
    pub limits: LimitsConfig,
    pub shutdown: Shutdown,
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    config: RelayConfig,
    registry: Arc<Registry>,
    shutdown: Shutdown,
}

impl HttpServer {
    /// Create a new HTTP server. Member supervisors stop when `shutdown` fires.
    pub fn new(config: RelayConfig, shutdown: Shutdown) -> Self {
        let registry = Arc::new(
            Registry::new(config.identity.clone())
                .with_delivery_timeout(config.liveness.window()),
        );

        let state = AppState {
            registry: registry.clone(),
            liveness: config.liveness.clone(),
            limits: config.limits.clone(),
            shutdown: shutdown.clone(),
        };

        let router = Self::build_router(state);
        Self {
            router,
            config,
            registry,
            shutdown,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/connect", any(upgrade::connect))
            .route("/connect-group", any(upgrade::connect_group))
            .fallback(dispatch::relay)
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(middleware::map_request(mark_sender_request_id))
    }

    /// Run the server until the shutdown coordinator fires.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            domain = %self.config.identity.domain,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let mut stop = self.shutdown.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { stop.recv().await })
            .await?;

        tracing::info!(groups = self.registry.group_count(), "HTTP server stopped");
        Ok(())
    }

    /// The router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Shared registry of live groups.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}
