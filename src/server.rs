//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared state holding the routing
//! table, health checker, and metrics handle), [`build_router`] for
//! constructing the Axum router with middleware layers,
//! [`build_http_client`] for the TLS-capable client used by the `health`
//! subcommand, and [`shutdown_signal`] for SIGTERM / Ctrl+C handling.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::model::ProxyConfig;
use crate::config::validation::validate;
use crate::error::FrontgateError;
use crate::health::HealthChecker;
use crate::proxy;
use crate::proxy::table::RoutingTable;

pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_millis(5000);

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;
pub type HttpClient = Client<HttpsConnector, http_body_util::Full<bytes::Bytes>>;

pub struct AppState {
    pub table: RoutingTable,
    pub health: Arc<dyn HealthChecker>,
    pub backend_timeout: Duration,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Validate `config` and build the routing table from it.
    ///
    /// Every validation error is returned; nothing is built when any exist.
    pub fn from_config(
        config: ProxyConfig,
        health: Arc<dyn HealthChecker>,
    ) -> Result<Self, FrontgateError> {
        if let Err(errors) = validate(&config) {
            return Err(FrontgateError::ConfigValidation { errors });
        }
        let table = RoutingTable::from_config(&config);
        Ok(Self {
            table,
            health,
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
            metrics: None,
        })
    }

    #[must_use]
    pub const fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

#[must_use]
pub fn build_http_client() -> HttpClient {
    // When multiple rustls crypto providers are compiled in, rustls cannot
    // auto-detect which one to use. Explicitly install `ring`.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(30))
        .build(https)
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

pub fn build_router(state: Arc<AppState>, max_body: usize) -> Router {
    let mut router = Router::new();
    if state.metrics.is_some() {
        router = router.route("/metrics", get(metrics_handler));
    }
    router
        .fallback(proxy::forward_handler)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body)),
        )
        .with_state(state)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
